//! Error types for snapshot storage.

use meshgraph_types::DanglingEdge;
use thiserror::Error;

/// Errors that can occur when loading or persisting snapshots.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backend could not be initialised; the store is not functional.
    #[error("Snapshot store is unavailable: {0}")]
    Unavailable(String),

    /// A query or statement failed.
    #[error("Storage I/O failed: {0}")]
    Io(String),

    /// A stored node or edge set could not be encoded or decoded.
    #[error("Failed to serialize snapshot: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored snapshot has an edge referencing a node it does not contain.
    #[error("Inconsistent snapshot for runtime '{runtime}' at {timestamp_ms}: {source}")]
    Consistency {
        runtime: String,
        timestamp_ms: u64,
        #[source]
        source: DanglingEdge,
    },
}

impl StoreError {
    /// Whether this error means the store never became functional.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match err {
            rusqlite::Error::SqliteFailure(code, _)
                if code.code == rusqlite::ErrorCode::CannotOpen =>
            {
                StoreError::Unavailable(err.to_string())
            }
            _ => StoreError::Io(err.to_string()),
        }
    }
}
