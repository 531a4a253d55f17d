//! # meshgraph-types
//!
//! Core types for service dependency models. This crate defines the shapes
//! shared by the model store, the model manager and the telemetry
//! deduplication window.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: Core types work without any serialization framework
//! - **Optional serialization**: Enable the `serde` feature for JSON and friends
//! - **Identity first**: Node equality is defined by identity, not by metadata
//!
//! ## Features
//!
//! - `serde`: serialization via serde
//!
//! ## Example
//!
//! ```rust
//! use meshgraph_types::{Edge, Model, Node};
//!
//! let gateway = Node::new("prod", "default", "hr", "gateway").with_instance_kind("Cell");
//! let backend = Node::new("prod", "default", "hr", "backend").with_instance_kind("Cell");
//!
//! let model = Model::new(
//!     [gateway.clone(), backend.clone()].into_iter().collect(),
//!     [Edge::between(&gateway, &backend)].into_iter().collect(),
//! );
//!
//! assert_eq!(model.edges.len(), 1);
//! assert_eq!(Model::node_fqn("default", "hr", "gateway"), gateway.fqn());
//! ```

mod clock;
mod edge;
mod model;
mod node;
mod snapshot;
mod telemetry;

pub use clock::*;
pub use edge::*;
pub use model::*;
pub use node::*;
pub use snapshot::*;
pub use telemetry::*;
