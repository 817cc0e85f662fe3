//! Embedded SQLite storage.
//!
//! Schema:
//! ```sql
//! runs(id TEXT PRIMARY KEY, created_at INTEGER, pipeline_blob TEXT)
//! metrics(run_id TEXT, iter INTEGER, score REAL, payload TEXT,
//!         PRIMARY KEY (run_id, iter))
//! ```
//!
//! The connection sits behind a mutex, so the store is single-writer-safe
//! and every append is one atomic upsert. rusqlite calls run on the
//! blocking thread pool — never on an async worker.

use async_trait::async_trait;
use braid_core::error::StorageError;
use braid_core::storage::{MetricRow, Storage};
use rusqlite::{Connection, OptionalExtension, params};
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

const MIGRATION: &str = "
CREATE TABLE IF NOT EXISTS runs (
    id TEXT PRIMARY KEY,
    created_at INTEGER NOT NULL,
    pipeline_blob TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS metrics (
    run_id TEXT NOT NULL,
    iter INTEGER NOT NULL,
    score REAL NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (run_id, iter)
);
";

/// SQLite-backed storage.
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStorage {
    /// Open (or create) a database at `path`; `:memory:` for an
    /// in-process database. The migration runs on every open and is
    /// idempotent.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            Connection::open(path)
        }
        .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        Self::migrate(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Apply the schema. Safe to call repeatedly.
    pub fn migrate(conn: &Connection) -> Result<(), StorageError> {
        conn.execute_batch(MIGRATION)
            .map_err(|e| StorageError::Unavailable(e.to_string()))
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, StorageError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StorageError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().expect("sqlite connection poisoned");
            work(&conn)
        })
        .await
        .map_err(|e| StorageError::Other(Box::new(e)))?
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_run(&self, pipeline_snapshot: Value) -> Result<String, StorageError> {
        let run_id = uuid::Uuid::new_v4().to_string();
        let blob = serde_json::to_string(&pipeline_snapshot)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let created_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);

        let id = run_id.clone();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT INTO runs (id, created_at, pipeline_blob) VALUES (?1, ?2, ?3)",
                params![id, created_at, blob],
            )
            .map_err(|e| StorageError::Io(e.to_string()))?;
            Ok(())
        })
        .await?;
        Ok(run_id)
    }

    async fn append_metric(
        &self,
        run_id: &str,
        iter: u64,
        score: f64,
        payload: Value,
    ) -> Result<(), StorageError> {
        let payload_text = serde_json::to_string(&payload)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        let run_id = run_id.to_string();
        self.blocking(move |conn| {
            conn.execute(
                "INSERT OR REPLACE INTO metrics (run_id, iter, score, payload)
                 VALUES (?1, ?2, ?3, ?4)",
                params![run_id, iter as i64, score, payload_text],
            )
            .map_err(|e| StorageError::Io(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn load_run(&self, run_id: &str) -> Result<Option<Value>, StorageError> {
        let run_id = run_id.to_string();
        let blob: Option<String> = self
            .blocking(move |conn| {
                conn.query_row(
                    "SELECT pipeline_blob FROM runs WHERE id = ?1",
                    params![run_id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(|e| StorageError::Io(e.to_string()))
            })
            .await?;
        match blob {
            Some(text) => serde_json::from_str(&text)
                .map(Some)
                .map_err(|e| StorageError::Serialization(e.to_string())),
            None => Ok(None),
        }
    }

    async fn load_history(&self, run_id: &str) -> Result<Vec<MetricRow>, StorageError> {
        let run_id = run_id.to_string();
        let raw_rows: Vec<(u64, f64, String)> = self
            .blocking(move |conn| {
                let mut statement = conn
                    .prepare(
                        "SELECT iter, score, payload FROM metrics
                         WHERE run_id = ?1 ORDER BY iter ASC",
                    )
                    .map_err(|e| StorageError::Io(e.to_string()))?;
                let rows = statement
                    .query_map(params![run_id], |row| {
                        Ok((
                            row.get::<_, i64>(0)? as u64,
                            row.get::<_, f64>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })
                    .map_err(|e| StorageError::Io(e.to_string()))?;
                rows.collect::<Result<Vec<_>, _>>()
                    .map_err(|e| StorageError::Io(e.to_string()))
            })
            .await?;

        raw_rows
            .into_iter()
            .map(|(iter, score, payload_text)| {
                serde_json::from_str(&payload_text)
                    .map(|payload| MetricRow {
                        iter,
                        score,
                        payload,
                    })
                    .map_err(|e| StorageError::Serialization(e.to_string()))
            })
            .collect()
    }
}
