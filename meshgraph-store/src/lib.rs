//! # meshgraph-store
//!
//! Durable snapshot storage for service dependency models.
//!
//! A [`ModelStore`] writes append-only, per-runtime snapshots of a
//! [`Model`](meshgraph_types::Model) and reads them back for historical
//! queries. Rows go through a [`SnapshotBackend`], so the storage engine can
//! be swapped out in tests or embedded setups.
//!
//! ## Backends
//!
//! - **SQLite** (`sqlite` feature, on by default) - [`SqliteBackend`]
//! - **Memory** - [`MemoryBackend`], always available
//!
//! ## Quick Start
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//! use meshgraph_store::{MemoryBackend, ModelStore};
//! use meshgraph_types::{Model, Node, SystemClock};
//!
//! let store = ModelStore::new(Arc::new(MemoryBackend::new()), Arc::new(SystemClock));
//!
//! let mut model = Model::empty();
//! model.nodes.insert(Node::new("prod", "default", "hr", "gateway"));
//! let models = HashMap::from([("prod".to_string(), model)]);
//!
//! // Only the first call writes; the model has not changed since.
//! assert_eq!(store.store_current_model(&models).unwrap(), 1);
//! assert_eq!(store.store_current_model(&models).unwrap(), 0);
//! ```

mod backend;
pub mod error;
mod store;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use backend::{MemoryBackend, SnapshotBackend, SnapshotRow};
pub use error::StoreError;
pub use store::ModelStore;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteBackend;

// Re-export types for convenience
pub use meshgraph_types::{Edge, Model, Node, Snapshot};
