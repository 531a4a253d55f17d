//! Scoped historical queries.
//!
//! Every query loads the snapshots of one runtime for a time range, merges
//! them into a single model and then walks it forward from the nodes in
//! scope. An edge is followed only when its source is in scope, so the walk
//! never leaves the scope except to record what the scope calls.

use std::collections::{HashMap, HashSet};

use meshgraph_types::{Edge, EdgeNode, Model, Node};

use crate::{EngineError, ModelManager};

/// Which part of a runtime's model a query asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// Everything in the runtime.
    Runtime,
    /// One namespace.
    Namespace { namespace: &'a str },
    /// One instance in a namespace.
    Instance { namespace: &'a str, instance: &'a str },
    /// One component of an instance.
    Component {
        namespace: &'a str,
        instance: &'a str,
        component: &'a str,
    },
}

impl Scope<'_> {
    fn contains(&self, runtime: &str, endpoint: &EdgeNode) -> bool {
        if endpoint.runtime != runtime {
            return false;
        }
        match *self {
            Scope::Runtime => true,
            Scope::Namespace { namespace } => endpoint.namespace == namespace,
            Scope::Instance {
                namespace,
                instance,
            } => endpoint.namespace == namespace && endpoint.instance == instance,
            Scope::Component {
                namespace,
                instance,
                component,
            } => {
                endpoint.namespace == namespace
                    && endpoint.instance == instance
                    && endpoint.component == component
            }
        }
    }
}

/// Extract the part of `complete` reachable from `scope`.
///
/// Starts a depth-first walk at every node in scope and follows outgoing
/// edges whose source is in scope. A node is visited at most once, which
/// bounds the walk on cyclic graphs.
pub fn extract_scope(complete: &Model, runtime: &str, scope: Scope<'_>) -> Model {
    let nodes: HashMap<EdgeNode, &Node> = complete
        .nodes
        .iter()
        .map(|node| (node.edge_node(), node))
        .collect();
    let mut outgoing: HashMap<&EdgeNode, Vec<&Edge>> = HashMap::new();
    for edge in &complete.edges {
        outgoing.entry(&edge.source).or_default().push(edge);
    }

    let mut partial = Model::empty();
    let mut visited: HashSet<&EdgeNode> = HashSet::new();
    let mut stack: Vec<&EdgeNode> = nodes
        .keys()
        .filter(|endpoint| scope.contains(runtime, endpoint))
        .collect();

    while let Some(endpoint) = stack.pop() {
        let Some(node) = nodes.get(endpoint) else {
            continue;
        };
        if !visited.insert(endpoint) {
            continue;
        }
        partial.nodes.insert((*node).clone());

        if !scope.contains(runtime, endpoint) {
            continue;
        }
        for edge in outgoing.get(endpoint).into_iter().flatten() {
            partial.edges.insert((*edge).clone());
            if !visited.contains(&edge.target) {
                stack.push(&edge.target);
            }
        }
    }
    partial
}

impl ModelManager {
    /// The union of every snapshot of `runtime` in `[start_ms, end_ms]`.
    ///
    /// Falls back to the last snapshot before the range when the range is
    /// empty.
    pub fn get_dependency_model(
        &self,
        start_ms: u64,
        end_ms: u64,
        runtime: &str,
    ) -> Result<Model, EngineError> {
        let snapshots = self.store().load(runtime, start_ms, end_ms)?;
        Ok(Model::merge(snapshots.iter().map(|snapshot| &snapshot.model)))
    }

    /// The part of the historical model selected by `scope`.
    pub fn get_scoped_dependency_model(
        &self,
        start_ms: u64,
        end_ms: u64,
        runtime: &str,
        scope: Scope<'_>,
    ) -> Result<Model, EngineError> {
        let complete = self.get_dependency_model(start_ms, end_ms, runtime)?;
        Ok(extract_scope(&complete, runtime, scope))
    }

    /// Everything a runtime looked like over a time range.
    pub fn get_runtime_dependency_model(
        &self,
        start_ms: u64,
        end_ms: u64,
        runtime: &str,
    ) -> Result<Model, EngineError> {
        self.get_scoped_dependency_model(start_ms, end_ms, runtime, Scope::Runtime)
    }

    /// A namespace and everything it calls.
    pub fn get_namespace_dependency_model(
        &self,
        start_ms: u64,
        end_ms: u64,
        runtime: &str,
        namespace: &str,
    ) -> Result<Model, EngineError> {
        self.get_scoped_dependency_model(start_ms, end_ms, runtime, Scope::Namespace { namespace })
    }

    /// An instance and everything it calls.
    pub fn get_instance_dependency_model(
        &self,
        start_ms: u64,
        end_ms: u64,
        runtime: &str,
        namespace: &str,
        instance: &str,
    ) -> Result<Model, EngineError> {
        self.get_scoped_dependency_model(
            start_ms,
            end_ms,
            runtime,
            Scope::Instance {
                namespace,
                instance,
            },
        )
    }

    /// A component and the components it calls directly.
    pub fn get_component_dependency_model(
        &self,
        start_ms: u64,
        end_ms: u64,
        runtime: &str,
        namespace: &str,
        instance: &str,
        component: &str,
    ) -> Result<Model, EngineError> {
        self.get_scoped_dependency_model(
            start_ms,
            end_ms,
            runtime,
            Scope::Component {
                namespace,
                instance,
                component,
            },
        )
    }
}
