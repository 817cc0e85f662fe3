#![deny(missing_docs)]
//! Evaluation engine for braid.
//!
//! Scores a program (any [`braid_core::Module`]) against a labeled
//! dataset with a metric. One failing example never fails the run: its
//! result degrades to a zero score and the error is recorded in the
//! detail list. The sequential path is a plain async fold; the parallel
//! path rides [`braid_runtime::parallel_map`] with a bounded in-flight
//! count.

pub mod metrics;

pub use braid_core::dataset::{Example, Metric, normalize_dataset, normalize_example};
pub use metrics::{builtin, exact_match, passage_match, semantic_f1};

use braid_core::error::EvalError;
use braid_core::event::{EventKind, emit};
use braid_core::io::IoMap;
use braid_core::module::Module;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

/// Options for [`evaluate`].
#[derive(Debug, Clone, Copy)]
pub struct EvalOptions {
    /// Score examples concurrently.
    pub parallel: bool,
    /// In-flight cap for the parallel path.
    pub concurrency: usize,
    /// Per-example deadline in milliseconds.
    pub timeout_ms: u64,
}

impl Default for EvalOptions {
    fn default() -> Self {
        Self {
            parallel: false,
            concurrency: braid_runtime::default_parallelism(),
            timeout_ms: 30_000,
        }
    }
}

/// The outcome of scoring one example.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExampleResult {
    /// Position of the example in the dataset.
    pub index: usize,
    /// Whether the program call completed.
    pub success: bool,
    /// The metric score; `0.0` for failed examples.
    pub score: f64,
    /// The failure, when `success` is false.
    pub error: Option<String>,
    /// The program's output, when it completed.
    pub actual: Option<IoMap>,
}

/// The outcome of scoring a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evaluation {
    /// Mean score over the dataset.
    pub score: f64,
    /// Per-example outcomes, in dataset order.
    pub results: Vec<ExampleResult>,
}

async fn evaluate_single(
    program: Arc<dyn Module>,
    index: usize,
    example: Example,
    metric: Metric,
    timeout_ms: u64,
) -> ExampleResult {
    match braid_runtime::timeout(timeout_ms, program.call(example.input)).await {
        Err(_) => ExampleResult {
            index,
            success: false,
            score: 0.0,
            error: Some(format!("timed out after {timeout_ms} ms")),
            actual: None,
        },
        Ok(Err(error)) => ExampleResult {
            index,
            success: false,
            score: 0.0,
            error: Some(error.to_string()),
            actual: None,
        },
        Ok(Ok(actual)) => {
            let score = metric(&actual, &example.expected);
            ExampleResult {
                index,
                success: true,
                score,
                error: None,
                actual: Some(actual),
            }
        }
    }
}

/// Score `program` over `dataset` with `metric`.
///
/// The overall score is the mean of the per-example scores (failed
/// examples contribute `0.0`); scores that are not finite numbers are
/// excluded from the mean. Empty datasets are rejected before any
/// program call.
pub async fn evaluate(
    program: Arc<dyn Module>,
    dataset: &[Example],
    metric: Metric,
    options: &EvalOptions,
) -> Result<Evaluation, EvalError> {
    if dataset.is_empty() {
        return Err(EvalError::InvalidTrainset("dataset is empty".into()));
    }

    let started = Instant::now();
    let mut results = if options.parallel {
        let items: Vec<(usize, Example)> = dataset.iter().cloned().enumerate().collect();
        let outcome: Result<Vec<ExampleResult>, EvalError> =
            braid_runtime::parallel_map(options.concurrency.max(1), items, |(index, example)| {
                let program = Arc::clone(&program);
                let metric = Arc::clone(&metric);
                let timeout_ms = options.timeout_ms;
                async move { Ok(evaluate_single(program, index, example, metric, timeout_ms).await) }
            })
            .await;
        // The per-example future is infallible, so the error arm is unreachable.
        outcome?
    } else {
        let mut sequential = Vec::with_capacity(dataset.len());
        for (index, example) in dataset.iter().cloned().enumerate() {
            sequential.push(
                evaluate_single(
                    Arc::clone(&program),
                    index,
                    example,
                    Arc::clone(&metric),
                    options.timeout_ms,
                )
                .await,
            );
        }
        sequential
    };
    results.sort_by_key(|r| r.index);

    for result in results.iter().filter(|r| !r.success) {
        tracing::warn!(
            index = result.index,
            error = result.error.as_deref().unwrap_or("unknown"),
            "example evaluation failed"
        );
    }

    let numeric: Vec<f64> = results
        .iter()
        .map(|r| r.score)
        .filter(|s| s.is_finite())
        .collect();
    let score = if numeric.is_empty() {
        0.0
    } else {
        numeric.iter().sum::<f64>() / numeric.len() as f64
    };

    emit(
        EventKind::PerformanceMetric,
        json!({
            "what": "evaluation",
            "examples": results.len(),
            "score": score,
            "elapsed_ms": started.elapsed().as_millis() as u64,
        }),
    );

    Ok(Evaluation { score, results })
}
