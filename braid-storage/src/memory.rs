//! In-memory storage. Testing and ephemeral runs.

use async_trait::async_trait;
use braid_core::error::StorageError;
use braid_core::storage::{MetricRow, Storage};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

struct RunEntry {
    snapshot: Value,
    history: BTreeMap<u64, MetricRow>,
}

/// HashMap-backed storage. Everything is lost when the process exits.
#[derive(Default)]
pub struct MemoryStorage {
    runs: Mutex<HashMap<String, RunEntry>>,
}

impl MemoryStorage {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn create_run(&self, pipeline_snapshot: Value) -> Result<String, StorageError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        self.runs.lock().expect("memory storage poisoned").insert(
            run_id.clone(),
            RunEntry {
                snapshot: pipeline_snapshot,
                history: BTreeMap::new(),
            },
        );
        Ok(run_id)
    }

    async fn append_metric(
        &self,
        run_id: &str,
        iter: u64,
        score: f64,
        payload: Value,
    ) -> Result<(), StorageError> {
        let mut runs = self.runs.lock().expect("memory storage poisoned");
        let entry = runs
            .get_mut(run_id)
            .ok_or_else(|| StorageError::Io(format!("no such run: {run_id}")))?;
        entry.history.insert(
            iter,
            MetricRow {
                iter,
                score,
                payload,
            },
        );
        Ok(())
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<Value>, StorageError> {
        Ok(self
            .runs
            .lock()
            .expect("memory storage poisoned")
            .get(run_id)
            .map(|entry| entry.snapshot.clone()))
    }

    async fn load_history(&self, run_id: &str) -> Result<Vec<MetricRow>, StorageError> {
        Ok(self
            .runs
            .lock()
            .expect("memory storage poisoned")
            .get(run_id)
            .map(|entry| entry.history.values().cloned().collect())
            .unwrap_or_default())
    }
}
