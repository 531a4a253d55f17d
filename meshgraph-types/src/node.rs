//! Node identity types.
//!
//! A [`Node`] is a component running inside an instance (a cell or a
//! composite). An [`EdgeNode`] is a detached copy of the same identity used
//! as an edge endpoint, so edges can be stored and compared without holding
//! on to the live node.

use core::fmt;
use core::hash::{Hash, Hasher};

use crate::Model;

/// A component observed in a runtime.
///
/// Equality and hashing cover `runtime`, `namespace`, `instance` and
/// `component` only. The `instance_kind` tag is metadata: two nodes that
/// differ only in kind are the same node, and the most recently observed
/// kind replaces the stored one.
///
/// # Example
///
/// ```rust
/// use meshgraph_types::Node;
///
/// let cell = Node::new("prod", "default", "hr", "gateway").with_instance_kind("Cell");
/// let composite = Node::new("prod", "default", "hr", "gateway").with_instance_kind("Composite");
///
/// assert_eq!(cell, composite);
/// assert_eq!(cell.fqn(), "default#hr#gateway");
/// ```
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Node {
    /// The runtime (cluster or environment) the component runs in.
    pub runtime: String,

    /// The namespace the instance belongs to.
    pub namespace: String,

    /// The instance the component belongs to.
    pub instance: String,

    /// The component name.
    pub component: String,

    /// The grouping construct of the instance, e.g. "Cell" or "Composite".
    #[cfg_attr(feature = "serde", serde(default, skip_serializing_if = "Option::is_none"))]
    pub instance_kind: Option<String>,
}

impl Node {
    /// Create a node without an instance kind.
    pub fn new(
        runtime: impl Into<String>,
        namespace: impl Into<String>,
        instance: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            runtime: runtime.into(),
            namespace: namespace.into(),
            instance: instance.into(),
            component: component.into(),
            instance_kind: None,
        }
    }

    /// Set the instance kind, consuming the node.
    pub fn with_instance_kind(mut self, kind: impl Into<String>) -> Self {
        self.instance_kind = Some(kind.into());
        self
    }

    /// Overwrite the instance kind in place.
    pub fn set_instance_kind(&mut self, kind: impl Into<String>) {
        self.instance_kind = Some(kind.into());
    }

    /// The `namespace#instance#component` name used for graph lookups.
    pub fn fqn(&self) -> String {
        Model::node_fqn(&self.namespace, &self.instance, &self.component)
    }

    /// A detached reference to this node's identity.
    pub fn edge_node(&self) -> EdgeNode {
        EdgeNode {
            runtime: self.runtime.clone(),
            namespace: self.namespace.clone(),
            instance: self.instance.clone(),
            component: self.component.clone(),
        }
    }

    /// Whether this node has the given identity.
    pub fn is(&self, namespace: &str, instance: &str, component: &str) -> bool {
        self.namespace == namespace && self.instance == instance && self.component == component
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.runtime == other.runtime
            && self.namespace == other.namespace
            && self.instance == other.instance
            && self.component == other.component
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.runtime.hash(state);
        self.namespace.hash(state);
        self.instance.hash(state);
        self.component.hash(state);
    }
}

impl PartialEq<EdgeNode> for Node {
    fn eq(&self, other: &EdgeNode) -> bool {
        self.runtime == other.runtime
            && self.namespace == other.namespace
            && self.instance == other.instance
            && self.component == other.component
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn())
    }
}

/// The identity of a node, used as the source or target of an edge.
///
/// Unlike [`Node`], every field takes part in equality, including the runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EdgeNode {
    /// The runtime the component runs in.
    pub runtime: String,

    /// The namespace the instance belongs to.
    pub namespace: String,

    /// The instance the component belongs to.
    pub instance: String,

    /// The component name.
    pub component: String,
}

impl EdgeNode {
    /// Create an edge endpoint.
    pub fn new(
        runtime: impl Into<String>,
        namespace: impl Into<String>,
        instance: impl Into<String>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            runtime: runtime.into(),
            namespace: namespace.into(),
            instance: instance.into(),
            component: component.into(),
        }
    }

    /// The `namespace#instance#component` name used for graph lookups.
    pub fn fqn(&self) -> String {
        Model::node_fqn(&self.namespace, &self.instance, &self.component)
    }
}

impl From<&Node> for EdgeNode {
    fn from(node: &Node) -> Self {
        node.edge_node()
    }
}

impl fmt::Display for EdgeNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fqn())
    }
}
