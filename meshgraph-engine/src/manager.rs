//! The live dependency graphs.

use std::collections::HashMap;
use std::sync::Arc;

use meshgraph_store::{ModelStore, StoreError};
use meshgraph_types::{Edge, Model, Node, Snapshot};
use parking_lot::RwLock;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};

use crate::EngineError;

/// The graph of one runtime plus its FQN lookup cache.
///
/// Both live under the manager's single lock so a reader never sees one
/// updated without the other.
#[derive(Debug, Default)]
struct RuntimeGraph {
    graph: StableDiGraph<Node, Edge>,
    cache: HashMap<String, NodeIndex>,
}

impl RuntimeGraph {
    fn from_snapshot(snapshot: Snapshot) -> Self {
        let mut runtime_graph = Self::default();
        for node in snapshot.model.nodes {
            runtime_graph.upsert(node);
        }
        for edge in snapshot.model.edges {
            let source = runtime_graph.index_of(&edge.source.fqn());
            let target = runtime_graph.index_of(&edge.target.fqn());
            // Snapshots are validated on load, both endpoints exist
            if let (Some(source), Some(target)) = (source, target) {
                runtime_graph.connect(source, target);
            }
        }
        runtime_graph
    }

    fn cached(&self, fqn: &str) -> Option<NodeIndex> {
        self.cache
            .get(fqn)
            .copied()
            .filter(|index| self.graph.contains_node(*index))
    }

    fn scan(&self, fqn: &str) -> Option<NodeIndex> {
        self.graph
            .node_indices()
            .find(|index| self.graph[*index].fqn() == fqn)
    }

    fn index_of(&self, fqn: &str) -> Option<NodeIndex> {
        self.cached(fqn).or_else(|| self.scan(fqn))
    }

    /// Insert a node, or overwrite the stored copy of an equal node.
    fn upsert(&mut self, node: Node) -> NodeIndex {
        let fqn = node.fqn();
        match self.index_of(&fqn) {
            Some(index) => {
                self.graph[index] = node;
                self.cache.insert(fqn, index);
                index
            }
            None => {
                let index = self.graph.add_node(node);
                self.cache.insert(fqn, index);
                index
            }
        }
    }

    /// Insert a node only if no equal node exists.
    fn ensure(&mut self, node: &Node) -> NodeIndex {
        match self.index_of(&node.fqn()) {
            Some(index) => index,
            None => self.upsert(node.clone()),
        }
    }

    fn connect(&mut self, source: NodeIndex, target: NodeIndex) -> bool {
        // Edges are fully determined by their endpoints, one per ordered pair
        if self.graph.find_edge(source, target).is_some() {
            return false;
        }
        let edge = Edge::between(&self.graph[source], &self.graph[target]);
        self.graph.add_edge(source, target, edge);
        true
    }

    fn remove(&mut self, fqn: &str) -> bool {
        let index = self.index_of(fqn);
        self.cache.remove(fqn);
        match index {
            Some(index) => self.graph.remove_node(index).is_some(),
            None => false,
        }
    }

    fn model(&self) -> Model {
        Model::new(
            self.graph
                .node_indices()
                .map(|index| self.graph[index].clone())
                .collect(),
            self.graph
                .edge_indices()
                .map(|index| self.graph[index].clone())
                .collect(),
        )
    }
}

/// The authoritative live view of service dependencies.
///
/// Holds one directed graph per runtime. Node identity within a runtime is
/// the FQN (`namespace#instance#component`); the graph never holds two nodes
/// with the same FQN. Adding the same call twice keeps a single edge.
///
/// All graphs and caches share one reader/writer lock. Queries run
/// concurrently with each other; mutations are exclusive.
///
/// Historical and scoped queries are answered from the [`ModelStore`], see
/// the `get_*_dependency_model` methods.
///
/// # Example
///
/// ```rust
/// use std::sync::Arc;
/// use meshgraph_engine::ModelManager;
/// use meshgraph_store::{MemoryBackend, ModelStore};
/// use meshgraph_types::SystemClock;
///
/// let store = Arc::new(ModelStore::new(Arc::new(MemoryBackend::new()), Arc::new(SystemClock)));
/// let manager = ModelManager::new(store).unwrap();
///
/// let gateway = manager.get_or_generate_node("prod", "default", "hr", "gateway");
/// let backend = manager.get_or_generate_node("prod", "default", "hr", "backend");
/// manager.add_edge("prod", &gateway, &backend);
/// manager.add_edge("prod", &gateway, &backend);
///
/// let models = manager.current_runtime_models();
/// assert_eq!(models["prod"].edges.len(), 1);
/// ```
#[derive(Debug)]
pub struct ModelManager {
    graphs: RwLock<HashMap<String, RuntimeGraph>>,
    store: Arc<ModelStore>,
}

impl ModelManager {
    /// Create a manager, rebuilding each runtime from its latest snapshot.
    ///
    /// An unavailable store is tolerated: the manager starts empty and keeps
    /// serving live data. A snapshot whose edges reference missing nodes is
    /// fatal.
    pub fn new(store: Arc<ModelStore>) -> Result<Self, EngineError> {
        let snapshots = match store.load_last_all() {
            Ok(snapshots) => snapshots,
            Err(StoreError::Unavailable(reason)) => {
                tracing::warn!(%reason, "Snapshot store unavailable, starting with an empty model");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };

        let mut graphs = HashMap::with_capacity(snapshots.len());
        for snapshot in snapshots {
            tracing::info!(
                runtime = snapshot.runtime.as_str(),
                timestamp_ms = snapshot.timestamp_ms,
                nodes = snapshot.model.nodes.len(),
                edges = snapshot.model.edges.len(),
                "Restored dependency model"
            );
            let runtime = snapshot.runtime.clone();
            graphs.insert(runtime, RuntimeGraph::from_snapshot(snapshot));
        }

        Ok(Self {
            graphs: RwLock::new(graphs),
            store,
        })
    }

    /// The store backing historical queries and flushes.
    pub fn store(&self) -> &Arc<ModelStore> {
        &self.store
    }

    /// Look up a node by identity.
    pub fn get_node(
        &self,
        runtime: &str,
        namespace: &str,
        instance: &str,
        component: &str,
    ) -> Option<Node> {
        let fqn = Model::node_fqn(namespace, instance, component);
        let (node, cache_miss) = {
            let graphs = self.graphs.read();
            let runtime_graph = graphs.get(runtime)?;
            match runtime_graph.cached(&fqn) {
                Some(index) => (runtime_graph.graph[index].clone(), None),
                None => {
                    let index = runtime_graph.scan(&fqn)?;
                    (runtime_graph.graph[index].clone(), Some(index))
                }
            }
        };

        if let Some(index) = cache_miss {
            let mut graphs = self.graphs.write();
            if let Some(runtime_graph) = graphs.get_mut(runtime) {
                let still_there = runtime_graph
                    .graph
                    .node_weight(index)
                    .is_some_and(|stored| stored.fqn() == fqn);
                if still_there {
                    runtime_graph.cache.insert(fqn, index);
                }
            }
        }
        Some(node)
    }

    /// Return the node with this identity, creating it if needed.
    pub fn get_or_generate_node(
        &self,
        runtime: &str,
        namespace: &str,
        instance: &str,
        component: &str,
    ) -> Node {
        self.get_or_generate_node_with_kind(runtime, namespace, instance, component, None)
    }

    /// Like [`get_or_generate_node`](Self::get_or_generate_node), also
    /// overwriting the instance kind when one is given. Lookup, creation and
    /// the kind update happen under one write lock.
    pub(crate) fn get_or_generate_node_with_kind(
        &self,
        runtime: &str,
        namespace: &str,
        instance: &str,
        component: &str,
        kind: Option<&str>,
    ) -> Node {
        let mut graphs = self.graphs.write();
        let runtime_graph = graphs.entry(runtime.to_string()).or_default();
        let fqn = Model::node_fqn(namespace, instance, component);
        let index = match runtime_graph.index_of(&fqn) {
            Some(index) => index,
            None => {
                tracing::debug!(runtime, %fqn, "Generated node");
                runtime_graph.upsert(Node::new(runtime, namespace, instance, component))
            }
        };

        let node = &mut runtime_graph.graph[index];
        if let Some(kind) = kind {
            if node.instance_kind.as_deref() != Some(kind) {
                node.set_instance_kind(kind);
            }
        }
        node.clone()
    }

    /// Insert a node, replacing the stored copy if one exists.
    ///
    /// Replacing keeps identity and updates metadata such as the instance
    /// kind.
    pub fn add_node(&self, runtime: &str, node: Node) {
        let mut graphs = self.graphs.write();
        graphs.entry(runtime.to_string()).or_default().upsert(node);
    }

    /// Record that `source` calls `target`.
    ///
    /// Endpoints missing from the graph are added. Returns whether a new
    /// edge was created.
    pub fn add_edge(&self, runtime: &str, source: &Node, target: &Node) -> bool {
        let mut graphs = self.graphs.write();
        let runtime_graph = graphs.entry(runtime.to_string()).or_default();
        let source = runtime_graph.ensure(source);
        let target = runtime_graph.ensure(target);
        runtime_graph.connect(source, target)
    }

    /// Remove a node and every edge touching it.
    ///
    /// Returns whether the graph changed.
    pub fn remove_node(
        &self,
        runtime: &str,
        namespace: &str,
        instance: &str,
        component: &str,
    ) -> bool {
        let mut graphs = self.graphs.write();
        let Some(runtime_graph) = graphs.get_mut(runtime) else {
            return false;
        };
        runtime_graph.remove(&Model::node_fqn(namespace, instance, component))
    }

    /// Snapshot every live graph.
    pub fn current_runtime_models(&self) -> HashMap<String, Model> {
        self.graphs
            .read()
            .iter()
            .map(|(runtime, runtime_graph)| (runtime.clone(), runtime_graph.model()))
            .collect()
    }

    /// Snapshot the live graph of one runtime.
    pub fn current_model(&self, runtime: &str) -> Option<Model> {
        self.graphs.read().get(runtime).map(RuntimeGraph::model)
    }

    /// Runtimes that have a live graph, sorted.
    pub fn runtimes(&self) -> Vec<String> {
        let mut runtimes: Vec<String> = self.graphs.read().keys().cloned().collect();
        runtimes.sort();
        runtimes
    }

    /// Persist every runtime whose model changed since the last flush.
    ///
    /// Returns the number of snapshots written.
    pub fn flush(&self) -> Result<usize, EngineError> {
        let models = self.current_runtime_models();
        Ok(self.store.store_current_model(&models)?)
    }
}
