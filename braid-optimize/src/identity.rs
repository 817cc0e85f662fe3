//! The identity strategy — evaluate the seed, change nothing.
//!
//! Exists so callers can exercise the full optimize-persist-resume path
//! with a predictable outcome.

use crate::{Candidate, OptimizationResult, OptimizeOptions, now_ms, validate_trainset};
use braid_core::dataset::{Example, Metric};
use braid_core::error::OptimizeError;
use braid_core::storage::{MetricRow, Storage as _};
use serde_json::json;
use std::sync::Arc;
use std::time::Instant;

pub(crate) async fn run(
    seed: Candidate,
    trainset: Vec<Example>,
    metric: Metric,
    options: OptimizeOptions,
) -> Result<OptimizationResult, OptimizeError> {
    validate_trainset(&trainset)?;
    let started = Instant::now();

    let run_id = match &options.storage {
        Some(storage) => Some(storage.create_run(seed.snapshot.clone()).await?),
        None => None,
    };

    let evaluation = braid_eval::evaluate(
        Arc::clone(&seed.module),
        &trainset,
        metric,
        &options.eval,
    )
    .await?;

    let row = MetricRow {
        iter: 0,
        score: evaluation.score,
        payload: json!({
            "best_snapshot": seed.snapshot,
            "at_ms": now_ms(),
            "strategy": "identity",
        }),
    };
    if let (Some(storage), Some(run_id)) = (&options.storage, &run_id) {
        storage
            .append_metric(run_id, row.iter, row.score, row.payload.clone())
            .await?;
    }

    Ok(OptimizationResult {
        best_score: evaluation.score,
        best: seed,
        history: vec![row],
        total_iterations: 1,
        total_time_ms: started.elapsed().as_millis() as u64,
        converged: true,
        run_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::Storage;
    use braid_core::io::IoMap;
    use braid_eval::Example;
    use braid_pipeline::FnModule;
    use serde_json::json;

    fn passthrough_candidate() -> Candidate {
        let module = FnModule::new("passthrough", |input| {
            let mut out = IoMap::new();
            if let Some(question) = input.get("question") {
                out.insert("answer".into(), question.clone());
            }
            out
        });
        Candidate::new(Arc::new(module), json!({"name": "passthrough"}))
    }

    #[tokio::test]
    async fn scores_seed_with_single_row_history() {
        let trainset = vec![Example::qa("4", "4"), Example::qa("paris", "paris")];
        let result = run(
            passthrough_candidate(),
            trainset,
            Arc::new(braid_eval::exact_match),
            OptimizeOptions::default(),
        )
        .await
        .unwrap();

        assert_eq!(result.best_score, 1.0);
        assert_eq!(result.history.len(), 1);
        assert_eq!(result.history[0].iter, 0);
        assert!(result.converged);
        assert!(result.run_id.is_none());
    }

    #[tokio::test]
    async fn empty_trainset_rejected_without_storage_write() {
        let storage: Arc<dyn braid_core::Storage> = Arc::new(braid_storage::MemoryStorage::new());
        let err = run(
            passthrough_candidate(),
            vec![],
            Arc::new(braid_eval::exact_match),
            OptimizeOptions {
                storage: Some(Arc::clone(&storage)),
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, OptimizeError::InvalidTrainset(_)));
    }

    #[tokio::test]
    async fn persists_run_and_row_when_storage_configured() {
        let storage: Arc<dyn braid_core::Storage> = Arc::new(braid_storage::MemoryStorage::new());
        let result = run(
            passthrough_candidate(),
            vec![Example::qa("x", "x")],
            Arc::new(braid_eval::exact_match),
            OptimizeOptions {
                storage: Some(Arc::clone(&storage)),
                ..OptimizeOptions::default()
            },
        )
        .await
        .unwrap();

        let run_id = result.run_id.unwrap();
        let snapshot = storage.load_run(&run_id).await.unwrap();
        assert_eq!(snapshot, Some(json!({"name": "passthrough"})));
        let history = storage.load_history(&run_id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].score, 1.0);
    }
}
