//! Snapshot - a persisted, timestamped model for one runtime.

use crate::clock::current_timestamp_ms;
use crate::Model;

/// A model captured at a point in time for a single runtime.
///
/// Snapshots are append-only: once written they are never modified, and
/// historical views are reconstructed by merging the snapshots that fall in
/// a requested time range.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Snapshot {
    /// Unix timestamp in milliseconds when this snapshot was taken.
    pub timestamp_ms: u64,

    /// The runtime the model belongs to.
    pub runtime: String,

    /// The captured model.
    pub model: Model,
}

impl Snapshot {
    /// Create a snapshot with the current timestamp.
    pub fn new(runtime: impl Into<String>, model: Model) -> Self {
        Self::with_timestamp(current_timestamp_ms(), runtime, model)
    }

    /// Create a snapshot with a specific timestamp.
    pub fn with_timestamp(timestamp_ms: u64, runtime: impl Into<String>, model: Model) -> Self {
        Self {
            timestamp_ms,
            runtime: runtime.into(),
            model,
        }
    }
}
