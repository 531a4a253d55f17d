//! Storage backends for snapshot rows.
//!
//! A backend only deals in rows: a timestamp, a runtime and two opaque text
//! columns holding the serialized node and edge sets. Encoding, decoding and
//! change detection live in [`ModelStore`](crate::ModelStore).

use std::fmt::Debug;

use parking_lot::RwLock;

use crate::StoreError;

/// One persisted snapshot, as stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotRow {
    /// Unix timestamp in milliseconds.
    pub timestamp_ms: u64,
    /// The runtime the snapshot belongs to.
    pub runtime: String,
    /// Serialized node set.
    pub nodes: String,
    /// Serialized edge set.
    pub edges: String,
}

/// A place snapshot rows can be written to and read back from.
///
/// Implementations must return rows ordered by timestamp. Rows sharing a
/// timestamp keep insertion order.
pub trait SnapshotBackend: Send + Sync + Debug {
    /// Create the backing table if it does not exist. Must be idempotent.
    fn ensure_schema(&self) -> Result<(), StoreError>;

    /// Append a row.
    fn insert(&self, row: &SnapshotRow) -> Result<(), StoreError>;

    /// The most recent row for a runtime.
    fn latest(&self, runtime: &str) -> Result<Option<SnapshotRow>, StoreError>;

    /// The most recent row of every runtime that has one.
    fn latest_per_runtime(&self) -> Result<Vec<SnapshotRow>, StoreError>;

    /// The most recent row for a runtime with `timestamp < before_ms`.
    fn latest_before(&self, runtime: &str, before_ms: u64)
        -> Result<Option<SnapshotRow>, StoreError>;

    /// All rows for a runtime with `from_ms <= timestamp <= to_ms`, ascending.
    fn range(&self, runtime: &str, from_ms: u64, to_ms: u64)
        -> Result<Vec<SnapshotRow>, StoreError>;

    /// Delete every row.
    fn clear(&self) -> Result<(), StoreError>;
}

/// An in-process backend that keeps rows in a vector.
///
/// # Example
///
/// ```rust
/// use meshgraph_store::{MemoryBackend, SnapshotBackend, SnapshotRow};
///
/// let backend = MemoryBackend::new();
/// backend.insert(&SnapshotRow {
///     timestamp_ms: 10,
///     runtime: "prod".into(),
///     nodes: "[]".into(),
///     edges: "[]".into(),
/// }).unwrap();
///
/// assert_eq!(backend.latest("prod").unwrap().unwrap().timestamp_ms, 10);
/// ```
#[derive(Debug, Default)]
pub struct MemoryBackend {
    rows: RwLock<Vec<SnapshotRow>>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored rows across all runtimes.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    /// Check if no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

impl SnapshotBackend for MemoryBackend {
    fn ensure_schema(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn insert(&self, row: &SnapshotRow) -> Result<(), StoreError> {
        self.rows.write().push(row.clone());
        Ok(())
    }

    fn latest(&self, runtime: &str) -> Result<Option<SnapshotRow>, StoreError> {
        let rows = self.rows.read();
        // max_by_key returns the last maximum, which keeps insertion order on ties
        Ok(rows
            .iter()
            .filter(|row| row.runtime == runtime)
            .max_by_key(|row| row.timestamp_ms)
            .cloned())
    }

    fn latest_before(
        &self,
        runtime: &str,
        before_ms: u64,
    ) -> Result<Option<SnapshotRow>, StoreError> {
        let rows = self.rows.read();
        Ok(rows
            .iter()
            .filter(|row| row.runtime == runtime && row.timestamp_ms < before_ms)
            .max_by_key(|row| row.timestamp_ms)
            .cloned())
    }

    fn latest_per_runtime(&self) -> Result<Vec<SnapshotRow>, StoreError> {
        let mut runtimes: Vec<String> = self
            .rows
            .read()
            .iter()
            .map(|row| row.runtime.clone())
            .collect();
        runtimes.sort();
        runtimes.dedup();

        let mut latest = Vec::with_capacity(runtimes.len());
        for runtime in runtimes {
            if let Some(row) = self.latest(&runtime)? {
                latest.push(row);
            }
        }
        Ok(latest)
    }

    fn range(
        &self,
        runtime: &str,
        from_ms: u64,
        to_ms: u64,
    ) -> Result<Vec<SnapshotRow>, StoreError> {
        let mut rows: Vec<SnapshotRow> = self
            .rows
            .read()
            .iter()
            .filter(|row| {
                row.runtime == runtime && row.timestamp_ms >= from_ms && row.timestamp_ms <= to_ms
            })
            .cloned()
            .collect();
        rows.sort_by_key(|row| row.timestamp_ms);
        Ok(rows)
    }

    fn clear(&self) -> Result<(), StoreError> {
        self.rows.write().clear();
        Ok(())
    }
}
