//! Error types for the engine.

use meshgraph_store::StoreError;
use thiserror::Error;

use crate::dedup::ConfigError;

/// Errors raised by the model manager and the deduplication window.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Loading or persisting snapshots failed.
    #[error(transparent)]
    Store(StoreError),

    /// Persisted state references a node that does not exist.
    ///
    /// Not retried: it means stored snapshots are corrupt.
    #[error("Dependency model is inconsistent: {0}")]
    Consistency(StoreError),

    /// The deduplication window was configured incorrectly.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Consistency { .. } => EngineError::Consistency(err),
            other => EngineError::Store(other),
        }
    }
}

impl EngineError {
    /// Whether the underlying store never became functional.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, EngineError::Store(err) if err.is_unavailable())
    }
}
