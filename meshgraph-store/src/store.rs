//! The model store.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use meshgraph_types::{Clock, Edge, Model, Node, Snapshot};
use parking_lot::Mutex;

use crate::{SnapshotBackend, SnapshotRow, StoreError};

/// Durable, per-runtime snapshot persistence for dependency models.
///
/// Snapshots are append-only. [`store_current_model`](Self::store_current_model)
/// only writes a runtime's model when it differs from the last snapshot
/// written for that runtime.
///
/// If the backend cannot be initialised the store is created anyway, in a
/// degraded state where every operation fails with
/// [`StoreError::Unavailable`]. Callers can keep serving live data.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use meshgraph_store::{MemoryBackend, ModelStore};
/// use meshgraph_types::{ManualClock, Node};
///
/// let store = ModelStore::new(Arc::new(MemoryBackend::new()), Arc::new(ManualClock::new(1_000)));
///
/// let nodes = [Node::new("prod", "default", "hr", "gateway")].into_iter().collect();
/// store.persist("prod", nodes, Default::default()).unwrap();
///
/// let last = store.load_last("prod").unwrap().unwrap();
/// assert_eq!(last.timestamp_ms, 1_000);
/// assert_eq!(last.model.nodes.len(), 1);
/// ```
#[derive(Debug)]
pub struct ModelStore {
    backend: Option<Arc<dyn SnapshotBackend>>,
    unavailable_reason: Option<String>,
    clock: Arc<dyn Clock>,
    /// Last model written per runtime, for change detection.
    last_persisted: Mutex<HashMap<String, Model>>,
}

impl ModelStore {
    /// Create a store on top of a backend, creating its schema.
    pub fn new(backend: Arc<dyn SnapshotBackend>, clock: Arc<dyn Clock>) -> Self {
        match backend.ensure_schema() {
            Ok(()) => Self {
                backend: Some(backend),
                unavailable_reason: None,
                clock,
                last_persisted: Mutex::new(HashMap::new()),
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to create snapshot table, store is unavailable");
                Self::unavailable(e.to_string(), clock)
            }
        }
    }

    /// Create a store with no working backend.
    ///
    /// Used when the backend itself could not be opened.
    pub fn unavailable(reason: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend: None,
            unavailable_reason: Some(reason.into()),
            clock,
            last_persisted: Mutex::new(HashMap::new()),
        }
    }

    /// Whether the backend was initialised successfully.
    pub fn is_available(&self) -> bool {
        self.backend.is_some()
    }

    fn backend(&self) -> Result<&dyn SnapshotBackend, StoreError> {
        match &self.backend {
            Some(backend) => Ok(backend.as_ref()),
            None => Err(StoreError::Unavailable(
                self.unavailable_reason
                    .clone()
                    .unwrap_or_else(|| "no backend".to_string()),
            )),
        }
    }

    /// The most recent snapshot of a runtime.
    pub fn load_last(&self, runtime: &str) -> Result<Option<Snapshot>, StoreError> {
        self.backend()?
            .latest(runtime)?
            .map(decode)
            .transpose()
    }

    /// The most recent snapshot of every runtime.
    pub fn load_last_all(&self) -> Result<Vec<Snapshot>, StoreError> {
        self.backend()?
            .latest_per_runtime()?
            .into_iter()
            .map(decode)
            .collect()
    }

    /// All snapshots of a runtime taken within `[start_ms, end_ms]`, oldest first.
    ///
    /// When the range holds no snapshot, the most recent snapshot taken
    /// strictly before `start_ms` is returned instead, if there is one. The
    /// model was in that state when the range began.
    pub fn load(
        &self,
        runtime: &str,
        start_ms: u64,
        end_ms: u64,
    ) -> Result<Vec<Snapshot>, StoreError> {
        let backend = self.backend()?;
        let rows = backend.range(runtime, start_ms, end_ms)?;
        if !rows.is_empty() {
            return rows.into_iter().map(decode).collect();
        }

        match backend.latest_before(runtime, start_ms)? {
            Some(row) => {
                tracing::debug!(
                    runtime,
                    start_ms,
                    end_ms,
                    fallback_ms = row.timestamp_ms,
                    "No snapshot in range, using the previous one"
                );
                Ok(vec![decode(row)?])
            }
            None => Ok(Vec::new()),
        }
    }

    /// Write a snapshot of a runtime at the current time.
    pub fn persist(
        &self,
        runtime: &str,
        nodes: HashSet<Node>,
        edges: HashSet<Edge>,
    ) -> Result<Snapshot, StoreError> {
        let now = self.clock.now_ms();
        self.persist_at(now, runtime, nodes, edges)
    }

    /// Write a snapshot of a runtime with an explicit timestamp.
    pub fn persist_at(
        &self,
        timestamp_ms: u64,
        runtime: &str,
        nodes: HashSet<Node>,
        edges: HashSet<Edge>,
    ) -> Result<Snapshot, StoreError> {
        let backend = self.backend()?;
        let snapshot = Snapshot::with_timestamp(timestamp_ms, runtime, Model::new(nodes, edges));
        backend.insert(&encode(&snapshot)?)?;

        self.last_persisted
            .lock()
            .insert(runtime.to_string(), snapshot.model.clone());
        tracing::info!(
            runtime,
            timestamp_ms,
            nodes = snapshot.model.nodes.len(),
            edges = snapshot.model.edges.len(),
            "Persisted dependency model"
        );
        Ok(snapshot)
    }

    /// Persist every runtime model that changed since its last snapshot.
    ///
    /// A runtime whose model is empty and that has never been persisted is
    /// skipped. Returns the number of snapshots written.
    pub fn store_current_model(&self, models: &HashMap<String, Model>) -> Result<usize, StoreError> {
        let backend = self.backend()?;
        let mut runtimes: Vec<&String> = models.keys().collect();
        runtimes.sort();

        let mut written = 0;
        for runtime in runtimes {
            let current = &models[runtime];
            let cached = self.last_persisted.lock().get(runtime.as_str()).cloned();
            let last = match cached {
                Some(model) => Some(model),
                None => backend
                    .latest(runtime)?
                    .map(decode)
                    .transpose()?
                    .map(|snapshot| snapshot.model),
            };

            let changed = match &last {
                Some(last) => last != current,
                None => !current.is_empty(),
            };
            if !changed {
                tracing::debug!(runtime = runtime.as_str(), "Dependency model unchanged");
                if let Some(last) = last {
                    self.last_persisted.lock().insert(runtime.clone(), last);
                }
                continue;
            }

            self.persist(runtime, current.nodes.clone(), current.edges.clone())?;
            written += 1;
        }
        Ok(written)
    }

    /// Delete every snapshot.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.backend()?.clear()?;
        self.last_persisted.lock().clear();
        tracing::info!("Cleared all dependency model snapshots");
        Ok(())
    }
}

fn encode(snapshot: &Snapshot) -> Result<SnapshotRow, StoreError> {
    Ok(SnapshotRow {
        timestamp_ms: snapshot.timestamp_ms,
        runtime: snapshot.runtime.clone(),
        nodes: serde_json::to_string(&snapshot.model.nodes)?,
        edges: serde_json::to_string(&snapshot.model.edges)?,
    })
}

fn decode(row: SnapshotRow) -> Result<Snapshot, StoreError> {
    let nodes: HashSet<Node> = serde_json::from_str(&row.nodes)?;
    let edges: HashSet<Edge> = serde_json::from_str(&row.edges)?;
    let model = Model::new(nodes, edges);

    model.validate().map_err(|source| StoreError::Consistency {
        runtime: row.runtime.clone(),
        timestamp_ms: row.timestamp_ms,
        source,
    })?;
    Ok(Snapshot::with_timestamp(row.timestamp_ms, row.runtime, model))
}
