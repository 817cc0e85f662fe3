//! The Storage protocol — how optimization runs persist.

use crate::error::StorageError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One per-iteration metric record appended to a run's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRow {
    /// Iteration index. `(run_id, iter)` pairs are unique per store.
    pub iter: u64,
    /// Best score observed at this iteration, in `[0, 1]`.
    pub score: f64,
    /// Strategy state: best pipeline snapshot, timestamp, anything else.
    pub payload: Value,
}

/// How optimization runs and their metric histories persist.
///
/// Implementations:
/// - MemoryStorage: HashMap (testing, ephemeral)
/// - FsStorage: file tree with atomic-rename history updates
/// - SqliteStorage: embedded database, single-writer-safe
///
/// The trait is deliberately minimal — create, append, and the two loads.
/// Pruning and schema evolution are not part of this trait; stores that
/// support them expose additional methods.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a new run with its pipeline snapshot. Returns the run id
    /// (an opaque string, UUIDv4 in the shipped backends).
    async fn create_run(&self, pipeline_snapshot: Value) -> Result<String, StorageError>;

    /// Append one metric row. Atomic per row; rewriting the same
    /// `(run_id, iter)` replaces the earlier row.
    async fn append_metric(
        &self,
        run_id: &str,
        iter: u64,
        score: f64,
        payload: Value,
    ) -> Result<(), StorageError>;

    /// Load a run's pipeline snapshot. `None` if the run doesn't exist.
    async fn load_run(&self, run_id: &str) -> Result<Option<Value>, StorageError>;

    /// Load a run's metric history, sorted by `iter` ascending.
    /// Empty if the run doesn't exist or has no rows yet.
    async fn load_history(&self, run_id: &str) -> Result<Vec<MetricRow>, StorageError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[test]
    fn storage_is_object_safe() {
        fn _assert_send_sync<T: Send + Sync>() {}
        _assert_send_sync::<Arc<dyn Storage>>();
    }

    #[test]
    fn metric_row_round_trips_through_json() {
        let row = MetricRow {
            iter: 3,
            score: 0.75,
            payload: json!({"best": {"stages": []}, "at_ms": 12}),
        };
        let text = serde_json::to_string(&row).unwrap();
        let back: MetricRow = serde_json::from_str(&text).unwrap();
        assert_eq!(back, row);
    }
}
