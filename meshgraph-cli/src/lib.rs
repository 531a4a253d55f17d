//! # meshgraph-cli
//!
//! The `meshgraph` binary and the pieces it is built from.
//!
//! ```text
//!  NDJSON ──► source ──► pipeline ──► ModelManager ──► SQLite
//!                                          │
//!                                       export ──► JSON
//! ```
//!
//! - **[`settings`]**: layered configuration (defaults, file, `MESHGRAPH_*`, flags)
//! - **[`source`]**: newline-delimited JSON telemetry input
//! - **[`pipeline`]**: replays input through the deduplication window into the manager
//! - **[`export`]**: scoped dependency models as JSON

pub mod duration;
pub mod export;
pub mod pipeline;
pub mod settings;
pub mod source;

pub use export::{build_export, export_to_file, ExportRequest};
pub use pipeline::{Pipeline, RunSummary};
pub use settings::{Overrides, Settings};
