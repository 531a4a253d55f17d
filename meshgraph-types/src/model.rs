//! Model - a point-in-time dependency graph.

use core::fmt;
use std::collections::HashSet;

use crate::{Edge, EdgeNode, Node};

const NODE_FQN_SEPARATOR: &str = "#";

/// A set of components and the calls between them.
///
/// Two models are equal when their node sets and edge sets are equal.
///
/// # Example
///
/// ```rust
/// use meshgraph_types::{Edge, Model, Node};
///
/// let gateway = Node::new("prod", "default", "hr", "gateway");
/// let backend = Node::new("prod", "default", "hr", "backend");
///
/// let model = Model::new(
///     [gateway.clone(), backend.clone()].into_iter().collect(),
///     [Edge::between(&gateway, &backend)].into_iter().collect(),
/// );
///
/// assert!(model.validate().is_ok());
/// assert_eq!(model.nodes.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Model {
    /// Components in the model.
    pub nodes: HashSet<Node>,

    /// Calls between components in the model.
    pub edges: HashSet<Edge>,
}

impl Model {
    /// Create a model from its parts.
    pub fn new(nodes: HashSet<Node>, edges: HashSet<Edge>) -> Self {
        Self { nodes, edges }
    }

    /// Create an empty model.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The fully qualified name used as graph identity.
    ///
    /// Runtime is not part of the name; graphs are partitioned by runtime
    /// separately.
    pub fn node_fqn(namespace: &str, instance: &str, component: &str) -> String {
        let mut fqn = String::with_capacity(
            namespace.len() + instance.len() + component.len() + 2 * NODE_FQN_SEPARATOR.len(),
        );
        fqn.push_str(namespace);
        fqn.push_str(NODE_FQN_SEPARATOR);
        fqn.push_str(instance);
        fqn.push_str(NODE_FQN_SEPARATOR);
        fqn.push_str(component);
        fqn
    }

    /// Check if the model has no nodes and no edges.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Find the node an edge endpoint refers to.
    pub fn find_node(&self, endpoint: &EdgeNode) -> Option<&Node> {
        self.nodes.iter().find(|node| *node == endpoint)
    }

    /// Check that every edge refers to nodes present in this model.
    pub fn validate(&self) -> Result<(), DanglingEdge> {
        for edge in &self.edges {
            let missing_source = self.find_node(&edge.source).is_none();
            let missing_target = self.find_node(&edge.target).is_none();
            if missing_source || missing_target {
                return Err(DanglingEdge {
                    edge: edge.clone(),
                    missing_source,
                    missing_target,
                });
            }
        }
        Ok(())
    }

    /// Union of several models.
    ///
    /// Models are applied in order, so a node present in more than one model
    /// keeps the instance kind from the last model that contains it.
    pub fn merge<'a>(models: impl IntoIterator<Item = &'a Model>) -> Model {
        let mut merged = Model::empty();
        for model in models {
            for node in &model.nodes {
                merged.nodes.replace(node.clone());
            }
            merged.edges.extend(model.edges.iter().cloned());
        }
        merged
    }
}

/// An edge whose source or target is not part of the model holding it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DanglingEdge {
    /// The offending edge.
    pub edge: Edge,

    /// The source node is missing.
    pub missing_source: bool,

    /// The target node is missing.
    pub missing_target: bool,
}

impl fmt::Display for DanglingEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.missing_source, self.missing_target) {
            (true, true) => write!(
                f,
                "Source and target nodes don't exist in the model for edge: {}",
                self.edge
            ),
            (true, false) => write!(
                f,
                "Source node doesn't exist in the model for edge: {}",
                self.edge
            ),
            _ => write!(
                f,
                "Target node doesn't exist in the model for edge: {}",
                self.edge
            ),
        }
    }
}

impl std::error::Error for DanglingEdge {}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(instance: &str, component: &str) -> Node {
        Node::new("rt", "ns", instance, component)
    }

    fn model(nodes: &[&Node], edges: &[Edge]) -> Model {
        Model::new(
            nodes.iter().map(|n| (*n).clone()).collect(),
            edges.iter().cloned().collect(),
        )
    }

    #[test]
    fn model_equality_is_set_equality() {
        let a = node("a", "gw");
        let b = node("b", "svc");
        let edge = Edge::between(&a, &b);

        let left = model(&[&a, &b], &[edge.clone()]);
        let right = model(&[&b, &a], &[edge]);
        assert_eq!(left, right);
    }

    #[test]
    fn model_equality_ignores_instance_kind() {
        let a = node("a", "gw").with_instance_kind("Cell");
        let a2 = node("a", "gw").with_instance_kind("Composite");
        assert_eq!(model(&[&a], &[]), model(&[&a2], &[]));
    }

    #[test]
    fn validate_accepts_consistent_model() {
        let a = node("a", "gw");
        let b = node("b", "svc");
        let m = model(&[&a, &b], &[Edge::between(&a, &b)]);
        assert!(m.validate().is_ok());
    }

    #[test]
    fn validate_reports_missing_source() {
        let a = node("a", "gw");
        let b = node("b", "svc");
        let m = model(&[&b], &[Edge::between(&a, &b)]);

        let err = m.validate().unwrap_err();
        assert!(err.missing_source);
        assert!(!err.missing_target);
        assert!(err.to_string().starts_with("Source node doesn't exist"));
    }

    #[test]
    fn validate_reports_missing_target() {
        let a = node("a", "gw");
        let b = node("b", "svc");
        let m = model(&[&a], &[Edge::between(&a, &b)]);

        let err = m.validate().unwrap_err();
        assert!(!err.missing_source);
        assert!(err.missing_target);
    }

    #[test]
    fn validate_reports_both_missing() {
        let a = node("a", "gw");
        let b = node("b", "svc");
        let m = model(&[], &[Edge::between(&a, &b)]);

        let err = m.validate().unwrap_err();
        assert!(err.missing_source && err.missing_target);
    }

    #[test]
    fn merge_is_union() {
        let a = node("a", "gw");
        let b = node("b", "svc");
        let c = node("c", "svc");
        let d = node("d", "svc");

        let first = model(&[&a, &b, &c], &[Edge::between(&a, &b), Edge::between(&a, &c)]);
        let second = model(&[&c, &d], &[Edge::between(&c, &d)]);

        let merged = Model::merge([&first, &second]);
        assert_eq!(merged.nodes.len(), 4);
        assert_eq!(merged.edges.len(), 3);
    }

    #[test]
    fn merge_keeps_latest_instance_kind() {
        let old = node("a", "gw").with_instance_kind("Cell");
        let new = node("a", "gw").with_instance_kind("Composite");

        let merged = Model::merge([&model(&[&old], &[]), &model(&[&new], &[])]);
        let kept = merged.nodes.iter().next().unwrap();
        assert_eq!(kept.instance_kind.as_deref(), Some("Composite"));
    }

    #[test]
    fn empty_model() {
        assert!(Model::empty().is_empty());
        assert!(Model::merge(std::iter::empty()).is_empty());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serde_preserves_equality() {
        let a = node("a", "gw").with_instance_kind("Cell");
        let b = node("b", "svc");
        let m = model(&[&a, &b], &[Edge::between(&a, &b)]);

        let json = serde_json::to_string(&m).unwrap();
        let parsed: Model = serde_json::from_str(&json).unwrap();
        assert_eq!(m, parsed);
    }
}
