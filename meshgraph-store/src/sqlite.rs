//! SQLite backend.
//!
//! Snapshots live in a single table with one row per persisted model:
//!
//! ```text
//! DependencyModelTable (MODEL_TIME INTEGER, RUNTIME TEXT, NODES TEXT, EDGES TEXT)
//! ```
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meshgraph_store::{ModelStore, SqliteBackend};
//! use meshgraph_types::SystemClock;
//!
//! let backend = SqliteBackend::open("dependency-model.db")?;
//! let store = ModelStore::new(Arc::new(backend), Arc::new(SystemClock));
//! assert!(store.is_available());
//! # Ok::<(), meshgraph_store::StoreError>(())
//! ```

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::{SnapshotBackend, SnapshotRow, StoreError};

const TABLE_NAME: &str = "DependencyModelTable";

/// A [`SnapshotBackend`] on top of a SQLite connection.
#[derive(Debug)]
pub struct SqliteBackend {
    conn: Mutex<Connection>,
    db_path: Option<PathBuf>,
}

impl SqliteBackend {
    /// Open (or create) a database file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let conn = Connection::open(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: Some(path.to_path_buf()),
        })
    }

    /// Open a private in-memory database.
    pub fn in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            db_path: None,
        })
    }

    /// The database file, or `None` for an in-memory database.
    pub fn path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRow> {
        let timestamp: i64 = row.get(0)?;
        Ok(SnapshotRow {
            timestamp_ms: timestamp.max(0) as u64,
            runtime: row.get(1)?,
            nodes: row.get(2)?,
            edges: row.get(3)?,
        })
    }
}

impl SnapshotBackend for SqliteBackend {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute_batch(&format!(
            "CREATE TABLE IF NOT EXISTS {TABLE_NAME} (
                 MODEL_TIME INTEGER NOT NULL,
                 RUNTIME TEXT NOT NULL,
                 NODES TEXT NOT NULL,
                 EDGES TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS IDX_{TABLE_NAME}_RUNTIME_TIME
                 ON {TABLE_NAME} (RUNTIME, MODEL_TIME);"
        ))
        .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    fn insert(&self, row: &SnapshotRow) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            &format!(
                "INSERT INTO {TABLE_NAME} (MODEL_TIME, RUNTIME, NODES, EDGES) VALUES (?1, ?2, ?3, ?4)"
            ),
            params![row.timestamp_ms as i64, row.runtime, row.nodes, row.edges],
        )?;
        Ok(())
    }

    fn latest(&self, runtime: &str) -> Result<Option<SnapshotRow>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT MODEL_TIME, RUNTIME, NODES, EDGES FROM {TABLE_NAME}
                     WHERE RUNTIME = ?1
                     ORDER BY MODEL_TIME DESC, rowid DESC LIMIT 1"
                ),
                params![runtime],
                Self::read_row,
            )
            .optional()?;
        Ok(row)
    }

    fn latest_before(
        &self,
        runtime: &str,
        before_ms: u64,
    ) -> Result<Option<SnapshotRow>, StoreError> {
        let conn = self.conn.lock();
        let row = conn
            .query_row(
                &format!(
                    "SELECT MODEL_TIME, RUNTIME, NODES, EDGES FROM {TABLE_NAME}
                     WHERE RUNTIME = ?1 AND MODEL_TIME < ?2
                     ORDER BY MODEL_TIME DESC, rowid DESC LIMIT 1"
                ),
                params![runtime, before_ms.min(i64::MAX as u64) as i64],
                Self::read_row,
            )
            .optional()?;
        Ok(row)
    }

    fn latest_per_runtime(&self) -> Result<Vec<SnapshotRow>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT t.MODEL_TIME, t.RUNTIME, t.NODES, t.EDGES FROM {TABLE_NAME} t
             WHERE t.rowid = (
                 SELECT s.rowid FROM {TABLE_NAME} s
                 WHERE s.RUNTIME = t.RUNTIME
                 ORDER BY s.MODEL_TIME DESC, s.rowid DESC LIMIT 1
             )
             ORDER BY t.RUNTIME"
        ))?;
        let rows = stmt
            .query_map([], Self::read_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn range(
        &self,
        runtime: &str,
        from_ms: u64,
        to_ms: u64,
    ) -> Result<Vec<SnapshotRow>, StoreError> {
        // Stored timestamps never exceed i64::MAX
        let Ok(from_ms) = i64::try_from(from_ms) else {
            return Ok(Vec::new());
        };
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT MODEL_TIME, RUNTIME, NODES, EDGES FROM {TABLE_NAME}
             WHERE RUNTIME = ?1 AND MODEL_TIME >= ?2 AND MODEL_TIME <= ?3
             ORDER BY MODEL_TIME, rowid"
        ))?;
        let rows = stmt
            .query_map(
                params![runtime, from_ms, to_ms.min(i64::MAX as u64) as i64],
                Self::read_row,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn clear(&self) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(&format!("DELETE FROM {TABLE_NAME}"), [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryBackend;

    fn row(timestamp_ms: u64, runtime: &str, tag: &str) -> SnapshotRow {
        SnapshotRow {
            timestamp_ms,
            runtime: runtime.to_string(),
            nodes: tag.to_string(),
            edges: "[]".to_string(),
        }
    }

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.ensure_schema().unwrap();
        backend
    }

    #[test]
    fn ensure_schema_is_idempotent() {
        let backend = backend();
        backend.ensure_schema().unwrap();
        backend.ensure_schema().unwrap();
    }

    #[test]
    fn insert_then_latest() {
        let backend = backend();
        backend.insert(&row(100, "rt", "first")).unwrap();
        backend.insert(&row(200, "rt", "second")).unwrap();
        backend.insert(&row(150, "rt", "middle")).unwrap();

        let latest = backend.latest("rt").unwrap().unwrap();
        assert_eq!(latest, row(200, "rt", "second"));
        assert!(backend.latest("missing").unwrap().is_none());
    }

    #[test]
    fn latest_prefers_last_insert_on_tie() {
        let backend = backend();
        backend.insert(&row(100, "rt", "first")).unwrap();
        backend.insert(&row(100, "rt", "second")).unwrap();
        assert_eq!(backend.latest("rt").unwrap().unwrap().nodes, "second");
    }

    #[test]
    fn range_filters_by_runtime_and_time() {
        let backend = backend();
        backend.insert(&row(300, "rt", "c")).unwrap();
        backend.insert(&row(100, "rt", "a")).unwrap();
        backend.insert(&row(200, "other", "x")).unwrap();
        backend.insert(&row(200, "rt", "b")).unwrap();
        backend.insert(&row(400, "rt", "d")).unwrap();

        let rows = backend.range("rt", 100, 300).unwrap();
        let tags: Vec<_> = rows.iter().map(|r| r.nodes.as_str()).collect();
        assert_eq!(tags, vec!["a", "b", "c"]);
    }

    #[test]
    fn range_starting_past_i64_max_is_empty() {
        let backend = backend();
        backend.insert(&row(100, "rt", "a")).unwrap();

        let start = i64::MAX as u64 + 1;
        assert!(backend.range("rt", start, u64::MAX).unwrap().is_empty());

        let memory = MemoryBackend::new();
        memory.insert(&row(100, "rt", "a")).unwrap();
        assert!(memory.range("rt", start, u64::MAX).unwrap().is_empty());
    }

    #[test]
    fn latest_before_excludes_the_boundary() {
        let backend = backend();
        backend.insert(&row(100, "rt", "a")).unwrap();
        backend.insert(&row(200, "rt", "b")).unwrap();

        assert_eq!(backend.latest_before("rt", 200).unwrap().unwrap().nodes, "a");
        assert!(backend.latest_before("rt", 100).unwrap().is_none());
    }

    #[test]
    fn latest_per_runtime_returns_one_row_each() {
        let backend = backend();
        backend.insert(&row(1, "b", "b1")).unwrap();
        backend.insert(&row(2, "a", "a2")).unwrap();
        backend.insert(&row(1, "a", "a1")).unwrap();
        backend.insert(&row(5, "b", "b5")).unwrap();

        let rows = backend.latest_per_runtime().unwrap();
        let tags: Vec<_> = rows.iter().map(|r| r.nodes.as_str()).collect();
        assert_eq!(tags, vec!["a2", "b5"]);
    }

    #[test]
    fn clear_deletes_rows() {
        let backend = backend();
        backend.insert(&row(1, "rt", "a")).unwrap();
        backend.clear().unwrap();
        assert!(backend.latest("rt").unwrap().is_none());
    }

    #[test]
    fn insert_without_schema_is_an_io_error() {
        let backend = SqliteBackend::in_memory().unwrap();
        let err = backend.insert(&row(1, "rt", "a")).unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }

    #[test]
    fn file_database_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.db");

        {
            let backend = SqliteBackend::open(&path).unwrap();
            backend.ensure_schema().unwrap();
            backend.insert(&row(42, "rt", "persisted")).unwrap();
        }

        let reopened = SqliteBackend::open(&path).unwrap();
        reopened.ensure_schema().unwrap();
        assert_eq!(reopened.path(), Some(path.as_path()));
        assert_eq!(reopened.latest("rt").unwrap().unwrap().nodes, "persisted");
    }
}
