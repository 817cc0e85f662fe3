//! Filesystem-backed storage.
//!
//! Directory layout:
//! ```text
//! root/
//!   <run_id>/
//!     pipeline.json
//!     history.json
//! ```
//!
//! `history.json` holds the whole ordered history and is rewritten on
//! each append via write-to-temp + rename, so readers never observe a
//! torn file. The store assumes a single writer per run, which is the
//! optimizer's usage.

use async_trait::async_trait;
use braid_core::error::StorageError;
use braid_core::storage::{MetricRow, Storage};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// File-tree storage rooted at a directory.
///
/// The root is created lazily on first write. Suitable for development
/// and single-machine runs that must survive process restarts without a
/// database.
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    /// A store rooted at `root`.
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(run_id)
    }

    async fn write_atomic(path: &Path, contents: String) -> Result<(), StorageError> {
        let tmp = path.with_extension(format!("tmp-{}", uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;
        tokio::fs::rename(&tmp, path)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))
    }

    async fn read_json(path: &Path) -> Result<Option<Value>, StorageError> {
        match tokio::fs::read_to_string(path).await {
            Ok(contents) => serde_json::from_str(&contents)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e.to_string())),
        }
    }
}

#[async_trait]
impl Storage for FsStorage {
    async fn create_run(&self, pipeline_snapshot: Value) -> Result<String, StorageError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let dir = self.run_dir(&run_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StorageError::Io(e.to_string()))?;

        let blob = serde_json::to_string_pretty(&pipeline_snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Self::write_atomic(&dir.join("pipeline.json"), blob).await?;
        Ok(run_id)
    }

    async fn append_metric(
        &self,
        run_id: &str,
        iter: u64,
        score: f64,
        payload: Value,
    ) -> Result<(), StorageError> {
        let dir = self.run_dir(run_id);
        if !dir.is_dir() {
            return Err(StorageError::Io(format!("no such run: {run_id}")));
        }
        let path = dir.join("history.json");

        let mut history: Vec<MetricRow> = match Self::read_json(&path).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StorageError::Serialization(e.to_string()))?,
            None => Vec::new(),
        };
        history.retain(|row| row.iter != iter);
        history.push(MetricRow {
            iter,
            score,
            payload,
        });
        history.sort_by_key(|row| row.iter);

        let blob = serde_json::to_string_pretty(&history)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Self::write_atomic(&path, blob).await
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<Value>, StorageError> {
        Self::read_json(&self.run_dir(run_id).join("pipeline.json")).await
    }

    async fn load_history(&self, run_id: &str) -> Result<Vec<MetricRow>, StorageError> {
        match Self::read_json(&self.run_dir(run_id).join("history.json")).await? {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(Vec::new()),
        }
    }
}
