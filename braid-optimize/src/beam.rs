//! Beam search over pipeline candidates.

use crate::{Candidate, OptimizationResult, OptimizeError, OptimizeOptions, now_ms, validate_trainset};
use braid_core::dataset::{Example, Metric};
use braid_core::event::{EventKind, emit};
use braid_core::storage::{MetricRow, Storage as _};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Beam-search parameters.
#[derive(Debug, Clone, Copy)]
pub struct BeamOptions {
    /// Candidates retained between iterations.
    pub beam_width: usize,
    /// Iteration cap.
    pub max_iterations: u64,
    /// Concurrent candidate evaluations.
    pub concurrency: usize,
    /// Persist a metric row every this many iterations (the final row of
    /// a run is always persisted).
    pub checkpoint_interval: u64,
    /// Global deadline for the search, in milliseconds. On expiry the
    /// current iteration completes and the search returns unconverged.
    pub timeout_ms: u64,
    /// Minimum improvement that counts as progress.
    pub convergence_epsilon: f64,
    /// Stagnant iterations tolerated before declaring convergence.
    pub convergence_patience: u64,
}

impl Default for BeamOptions {
    fn default() -> Self {
        Self {
            beam_width: 4,
            max_iterations: 10,
            concurrency: 8,
            checkpoint_interval: 5,
            timeout_ms: 300_000,
            convergence_epsilon: 1e-6,
            convergence_patience: 3,
        }
    }
}

fn validate_options(beam: &BeamOptions) -> Result<(), OptimizeError> {
    if beam.beam_width == 0 {
        return Err(OptimizeError::InvalidOptions("beam_width must be > 0".into()));
    }
    if beam.checkpoint_interval == 0 {
        return Err(OptimizeError::InvalidOptions(
            "checkpoint_interval must be > 0".into(),
        ));
    }
    if beam.concurrency == 0 {
        return Err(OptimizeError::InvalidOptions("concurrency must be > 0".into()));
    }
    Ok(())
}

/// One beam-search run.
///
/// Each iteration: apply every mutator to every beam member, score the
/// resulting candidate set (beam members included) over the trainset,
/// sort by score — stable, so ties keep insertion order — and keep the
/// top `beam_width`. A candidate whose evaluation fails scores `0.0`
/// and is logged, never fatal.
pub(crate) async fn run(
    seed: Candidate,
    trainset: Vec<Example>,
    metric: Metric,
    options: OptimizeOptions,
) -> Result<OptimizationResult, OptimizeError> {
    validate_options(&options.beam)?;
    validate_trainset(&trainset)?;
    let started = Instant::now();
    let trainset = Arc::new(trainset);

    let mut history: Vec<MetricRow> = Vec::new();
    let mut start_iter: u64 = 0;
    let run_id: Option<String> = match (&options.storage, &options.resume_run_id) {
        (Some(storage), Some(resume_id)) => {
            if storage.load_run(resume_id).await?.is_none() {
                return Err(OptimizeError::InvalidOptions(format!(
                    "cannot resume unknown run: {resume_id}"
                )));
            }
            history = storage.load_history(resume_id).await?;
            if let Some(last) = history.last() {
                start_iter = last.iter + 1;
            }
            tracing::info!(run_id = %resume_id, start_iter, "resuming beam search");
            Some(resume_id.clone())
        }
        (Some(storage), None) => Some(storage.create_run(seed.snapshot.clone()).await?),
        (None, Some(_)) => {
            return Err(OptimizeError::InvalidOptions(
                "resume_run_id requires storage".into(),
            ));
        }
        (None, None) => None,
    };

    let mut beam: Vec<Candidate> = vec![seed.clone()];
    let mut best: Option<(Candidate, f64)> = None;
    let mut best_so_far: f64 = history
        .iter()
        .map(|row| row.score)
        .fold(f64::NEG_INFINITY, f64::max);
    let mut stagnant: u64 = 0;
    let mut converged = false;

    for iter in start_iter..options.beam.max_iterations {
        if started.elapsed().as_millis() as u64 >= options.beam.timeout_ms {
            tracing::warn!(iter, "optimization deadline reached");
            break;
        }

        // a. Candidate generation: beam members plus their mutations.
        let mut candidates: Vec<Candidate> = Vec::new();
        for member in &beam {
            candidates.push(member.clone());
            for mutator in &options.mutators {
                candidates.extend(mutator(member));
            }
        }

        // b. Concurrent scoring; failures degrade to 0.0.
        let indexed: Vec<(usize, Candidate)> = candidates.into_iter().enumerate().collect();
        let mut scored: Vec<(usize, Candidate, f64)> = braid_runtime::parallel_map(
            options.beam.concurrency,
            indexed,
            |(index, candidate)| {
                let trainset = Arc::clone(&trainset);
                let metric = Arc::clone(&metric);
                let eval_options = options.eval;
                let module = Arc::clone(&candidate.module);
                async move {
                    let score =
                        match braid_eval::evaluate(module, &trainset, metric, &eval_options).await
                        {
                            Ok(evaluation) => evaluation.score,
                            Err(error) => {
                                tracing::warn!(index, error = %error, "candidate evaluation failed");
                                0.0
                            }
                        };
                    Ok::<_, OptimizeError>((index, candidate, score))
                }
            },
        )
        .await?;

        // c. Stable sort: equal scores keep insertion order.
        scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
        beam = scored
            .iter()
            .take(options.beam.beam_width)
            .map(|(_, candidate, _)| candidate.clone())
            .collect();

        // d. Record the iteration best.
        let (iteration_best, iteration_score) = match scored.first() {
            Some((_, candidate, score)) => (candidate.clone(), *score),
            None => break, // unreachable: the beam is never empty
        };
        let row = MetricRow {
            iter,
            score: iteration_score,
            payload: json!({
                "best_snapshot": iteration_best.snapshot,
                "at_ms": now_ms(),
                "strategy": "beam",
                "candidates": scored.len(),
                "beam_scores": scored
                    .iter()
                    .take(options.beam.beam_width)
                    .map(|(_, _, score)| *score)
                    .collect::<Vec<_>>(),
            }),
        };
        history.push(row.clone());

        let improved = match best {
            Some((_, score)) => iteration_score > score,
            None => true,
        };
        if improved {
            best = Some((iteration_best, iteration_score));
        }

        // e. Instrumentation.
        emit(
            EventKind::OptimizationIteration,
            json!({
                "iter": iter,
                "best_score": iteration_score,
                "candidates": row.payload["candidates"],
                "elapsed_ms": started.elapsed().as_millis() as u64,
            }),
        );

        // f. Convergence: no improvement beyond epsilon for `patience`
        // consecutive iterations.
        if best_so_far.is_finite()
            && iteration_score <= best_so_far + options.beam.convergence_epsilon
        {
            stagnant += 1;
            if stagnant >= options.beam.convergence_patience {
                converged = true;
            }
        } else {
            stagnant = 0;
        }
        best_so_far = best_so_far.max(iteration_score);

        let deadline_hit = started.elapsed().as_millis() as u64 >= options.beam.timeout_ms;
        let stopping = converged || deadline_hit || iter + 1 == options.beam.max_iterations;
        if let (Some(storage), Some(run_id)) = (&options.storage, &run_id) {
            if iter % options.beam.checkpoint_interval == 0 || stopping {
                storage
                    .append_metric(run_id, row.iter, row.score, row.payload.clone())
                    .await?;
            }
        }

        if converged || deadline_hit {
            break;
        }
    }

    let (best, best_score) = match best {
        Some((candidate, score)) => (candidate, score),
        None => (seed, 0.0),
    };
    Ok(OptimizationResult {
        best,
        best_score,
        total_iterations: history.len() as u64,
        history,
        total_time_ms: started.elapsed().as_millis() as u64,
        converged,
        run_id,
    })
}
