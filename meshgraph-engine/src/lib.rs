//! # meshgraph-engine
//!
//! Live service dependency graphs and the telemetry deduplication that
//! feeds them.
//!
//! The engine keeps one directed graph of component calls per runtime,
//! persists it through a [`ModelStore`](meshgraph_store::ModelStore) when it
//! changes, and answers historical questions ("what did this instance call
//! last week?") from the stored snapshots.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use meshgraph_engine::{CallObservation, ComponentObservation, ModelManager};
//! use meshgraph_store::{MemoryBackend, ModelStore};
//! use meshgraph_types::ManualClock;
//!
//! let clock = Arc::new(ManualClock::new(1_000));
//! let store = Arc::new(ModelStore::new(Arc::new(MemoryBackend::new()), clock));
//! let manager = ModelManager::new(store).unwrap();
//!
//! // Record what the telemetry pipeline saw
//! manager.observe_call(&CallObservation::new(
//!     ComponentObservation::new("prod", "default", "hr", "gateway"),
//!     ComponentObservation::new("prod", "default", "hr", "backend"),
//! ));
//! manager.flush().unwrap();
//!
//! // Ask what the instance depended on
//! let model = manager
//!     .get_instance_dependency_model(0, 2_000, "prod", "default", "hr")
//!     .unwrap();
//! assert_eq!(model.nodes.len(), 2);
//! assert_eq!(model.edges.len(), 1);
//! ```
//!
//! ## Features
//!
//! - `tokio` (default): [`dedup::spawn_window`] and [`PersistenceScheduler`]

pub mod dedup;
mod error;
mod ingest;
mod manager;
#[cfg(feature = "tokio")]
mod persistence;
mod query;

pub use dedup::{DedupConfig, DedupedRecord, DeduplicationWindow};
pub use error::EngineError;
pub use ingest::{CallObservation, ComponentObservation};
pub use manager::ModelManager;
#[cfg(feature = "tokio")]
pub use persistence::{PersistenceHandle, PersistenceScheduler, MIN_FLUSH_INTERVAL};
pub use query::{extract_scope, Scope};

// Re-export types for convenience
pub use meshgraph_types::{Edge, EdgeNode, Model, Node};
