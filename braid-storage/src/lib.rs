#![deny(missing_docs)]
//! Run storage backends for braid.
//!
//! Three interchangeable implementations of [`braid_core::Storage`]:
//!
//! - [`SqliteStorage`] — embedded SQL, single-writer-safe, durable
//! - [`FsStorage`] — a file tree with atomic-rename history updates
//! - [`MemoryStorage`] — a HashMap, for tests and ephemeral runs
//!
//! [`make_storage`] picks a backend from a URL: `sqlite://<path>` (or
//! `sqlite://:memory:`), `file://<dir>`, `memory://`. With no URL it
//! consults the `STORAGE` environment variable and finally defaults to
//! `file://./runs`.
//!
//! Every persisted blob — pipeline snapshots and metric payloads — is
//! canonical `serde_json` text, so stored runs round-trip and remain
//! readable across backends.

pub mod fs;
pub mod memory;
pub mod sqlite;

pub use fs::FsStorage;
pub use memory::MemoryStorage;
pub use sqlite::SqliteStorage;

use braid_core::error::StorageError;
use braid_core::storage::Storage;
use std::sync::Arc;

const DEFAULT_URL: &str = "file://./runs";

/// Build a storage backend from a URL.
///
/// Resolution order: the `url` argument, the `STORAGE` environment
/// variable, then `file://./runs`. Unknown schemes fail with
/// [`StorageError::Unavailable`].
pub fn make_storage(url: Option<&str>) -> Result<Arc<dyn Storage>, StorageError> {
    let resolved = match url {
        Some(url) => url.to_string(),
        None => std::env::var("STORAGE").unwrap_or_else(|_| DEFAULT_URL.to_string()),
    };

    if let Some(path) = resolved.strip_prefix("sqlite://") {
        return Ok(Arc::new(SqliteStorage::open(path)?));
    }
    if let Some(dir) = resolved.strip_prefix("file://") {
        return Ok(Arc::new(FsStorage::new(dir)));
    }
    if resolved.strip_prefix("memory://").is_some() {
        return Ok(Arc::new(MemoryStorage::new()));
    }
    Err(StorageError::Unavailable(format!(
        "unknown storage url scheme: {resolved}"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn dispatches_on_scheme() {
        let sqlite = make_storage(Some("sqlite://:memory:")).unwrap();
        let run_id = sqlite.create_run(json!({"s": 1})).await.unwrap();
        assert!(sqlite.load_run(&run_id).await.unwrap().is_some());

        let dir = tempfile::tempdir().unwrap();
        let url = format!("file://{}", dir.path().display());
        let fs = make_storage(Some(&url)).unwrap();
        let run_id = fs.create_run(json!({"s": 2})).await.unwrap();
        assert!(fs.load_run(&run_id).await.unwrap().is_some());

        assert!(make_storage(Some("memory://")).is_ok());
    }

    #[test]
    fn unknown_scheme_is_unavailable() {
        let result = make_storage(Some("redis://localhost"));
        assert!(matches!(result, Err(StorageError::Unavailable(_))));
    }

    #[tokio::test]
    async fn cross_backend_round_trip_shape() {
        // The same snapshot and rows read back identically from every backend.
        let dir = tempfile::tempdir().unwrap();
        let backends: Vec<Arc<dyn Storage>> = vec![
            Arc::new(MemoryStorage::new()),
            Arc::new(FsStorage::new(dir.path())),
            Arc::new(SqliteStorage::open(":memory:").unwrap()),
        ];
        let snapshot = json!({"stages": [{"id": "a", "deps": []}], "name": "p"});

        for storage in backends {
            let run_id = storage.create_run(snapshot.clone()).await.unwrap();
            storage
                .append_metric(&run_id, 0, 0.5, json!({"note": "first"}))
                .await
                .unwrap();
            storage
                .append_metric(&run_id, 1, 0.75, json!({"note": "second"}))
                .await
                .unwrap();

            assert_eq!(storage.load_run(&run_id).await.unwrap(), Some(snapshot.clone()));
            let history = storage.load_history(&run_id).await.unwrap();
            assert_eq!(history.len(), 2);
            assert_eq!(history[0].iter, 0);
            assert_eq!(history[1].iter, 1);
            assert_eq!(history[1].payload, json!({"note": "second"}));
        }
    }
}
