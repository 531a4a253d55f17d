//! Directed calls between components.

use core::fmt;

use crate::{EdgeNode, Node};

/// A directed dependency: `source` calls `target`.
///
/// Equality is structural over both endpoints. Whether repeated edges are
/// retained is up to the graph that stores them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Edge {
    /// The calling component.
    pub source: EdgeNode,

    /// The called component.
    pub target: EdgeNode,
}

impl Edge {
    /// Create an edge from two endpoints.
    pub fn new(source: EdgeNode, target: EdgeNode) -> Self {
        Self { source, target }
    }

    /// Create an edge between two nodes.
    pub fn between(source: &Node, target: &Node) -> Self {
        Self {
            source: source.edge_node(),
            target: target.edge_node(),
        }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} --> {}", self.source, self.target)
    }
}
