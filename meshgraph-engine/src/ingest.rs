//! Turning observations into graph mutations.
//!
//! Producers describe what they saw (a component exists, a component called
//! another one, a component went away) and the manager updates its graphs.
//! Observations missing part of an identity are dropped.

use meshgraph_types::{attributes, Node, TelemetryEvent};

use crate::ModelManager;

/// One side of a call, or a component seen on its own.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComponentObservation {
    pub runtime: String,
    pub namespace: String,
    pub instance: String,
    pub component: String,
    /// Kind of the owning instance, e.g. `Cell` or `Composite`.
    pub instance_kind: Option<String>,
}

impl ComponentObservation {
    /// Create an observation without an instance kind.
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

    /// Set the instance kind.
    pub fn with_instance_kind(mut self, kind: impl Into<String>) -> Self {
        self.instance_kind = Some(kind.into());
        self
    }

    fn is_complete(&self) -> bool {
        !self.runtime.is_empty()
            && !self.namespace.is_empty()
            && !self.instance.is_empty()
            && !self.component.is_empty()
    }

    fn kind(&self) -> Option<&str> {
        self.instance_kind.as_deref().filter(|kind| !kind.is_empty())
    }
}

/// A call from one component to another.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallObservation {
    pub source: ComponentObservation,
    pub destination: ComponentObservation,
}

impl CallObservation {
    pub fn new(source: ComponentObservation, destination: ComponentObservation) -> Self {
        Self {
            source,
            destination,
        }
    }

    /// Read a call from the standard telemetry attributes.
    ///
    /// Missing string attributes read as empty, so the result may be
    /// incomplete; [`ModelManager::observe_call`] drops those.
    pub fn from_event(event: &TelemetryEvent) -> Self {
        let get = |name: &str| event.get_str(name).unwrap_or_default().to_string();
        let runtime = get(attributes::RUNTIME);

        let source = ComponentObservation {
            runtime: runtime.clone(),
            namespace: get(attributes::SOURCE_NAMESPACE),
            instance: get(attributes::SOURCE_INSTANCE),
            component: get(attributes::SOURCE_COMPONENT),
            instance_kind: event
                .get_str(attributes::SOURCE_INSTANCE_KIND)
                .map(str::to_string),
        };
        let destination = ComponentObservation {
            runtime,
            namespace: get(attributes::DESTINATION_NAMESPACE),
            instance: get(attributes::DESTINATION_INSTANCE),
            component: get(attributes::DESTINATION_COMPONENT),
            instance_kind: event
                .get_str(attributes::DESTINATION_INSTANCE_KIND)
                .map(str::to_string),
        };
        Self::new(source, destination)
    }
}

impl ModelManager {
    /// Record a component, creating it if needed and updating its kind.
    ///
    /// Returns the stored node, or `None` if the observation was dropped.
    pub fn observe_component(&self, observation: &ComponentObservation) -> Option<Node> {
        if !observation.is_complete() {
            tracing::debug!(?observation, "Ignoring incomplete component observation");
            return None;
        }

        Some(self.get_or_generate_node_with_kind(
            &observation.runtime,
            &observation.namespace,
            &observation.instance,
            &observation.component,
            observation.kind(),
        ))
    }

    /// Record a call between two components.
    ///
    /// Both endpoints must be complete and in the same runtime. Returns
    /// whether a new edge was created.
    pub fn observe_call(&self, call: &CallObservation) -> bool {
        if call.source.runtime != call.destination.runtime {
            tracing::debug!(?call, "Ignoring call across runtimes");
            return false;
        }
        let (Some(source), Some(destination)) = (
            self.observe_component(&call.source),
            self.observe_component(&call.destination),
        ) else {
            return false;
        };

        let created = self.add_edge(&call.source.runtime, &source, &destination);
        if created {
            tracing::debug!(
                runtime = call.source.runtime.as_str(),
                source = %source,
                destination = %destination,
                "New dependency"
            );
        }
        created
    }

    /// Record that a component no longer exists.
    ///
    /// Returns whether the graph changed.
    pub fn observe_removal(&self, observation: &ComponentObservation) -> bool {
        if !observation.is_complete() {
            tracing::debug!(?observation, "Ignoring incomplete removal");
            return false;
        }
        self.remove_node(
            &observation.runtime,
            &observation.namespace,
            &observation.instance,
            &observation.component,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use meshgraph_store::{MemoryBackend, ModelStore};
    use meshgraph_types::ManualClock;
    use std::sync::Arc;

    fn manager() -> ModelManager {
        let store = ModelStore::new(Arc::new(MemoryBackend::new()), Arc::new(ManualClock::new(0)));
        ModelManager::new(Arc::new(store)).unwrap()
    }

    fn component(name: &str) -> ComponentObservation {
        ComponentObservation::new("r1", "ns1", "i1", name).with_instance_kind("Cell")
    }

    #[test]
    fn observe_call_creates_nodes_and_edge() {
        let manager = manager();
        let call = CallObservation::new(component("gateway"), component("backend"));

        assert!(manager.observe_call(&call));
        assert!(!manager.observe_call(&call));

        let model = manager.current_model("r1").unwrap();
        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.edges.len(), 1);
        assert!(model
            .nodes
            .iter()
            .all(|n| n.instance_kind.as_deref() == Some("Cell")));
    }

    #[test]
    fn observed_kind_overwrites_stored_kind() {
        let manager = manager();
        manager.observe_component(&component("gateway"));
        manager.observe_component(
            &ComponentObservation::new("r1", "ns1", "i1", "gateway").with_instance_kind("Composite"),
        );

        let node = manager.get_node("r1", "ns1", "i1", "gateway").unwrap();
        assert_eq!(node.instance_kind.as_deref(), Some("Composite"));
        assert_eq!(manager.current_model("r1").unwrap().nodes.len(), 1);
    }

    #[test]
    fn missing_kind_keeps_stored_kind() {
        let manager = manager();
        manager.observe_component(&component("gateway"));
        manager.observe_component(&ComponentObservation::new("r1", "ns1", "i1", "gateway"));

        let node = manager.get_node("r1", "ns1", "i1", "gateway").unwrap();
        assert_eq!(node.instance_kind.as_deref(), Some("Cell"));
    }

    #[test]
    fn observation_after_removal_recreates_the_node_once() {
        let manager = manager();
        manager.observe_component(&component("gateway"));
        assert!(manager.observe_removal(&component("gateway")));

        let node = manager
            .observe_component(
                &ComponentObservation::new("r1", "ns1", "i1", "gateway").with_instance_kind("Composite"),
            )
            .unwrap();
        assert_eq!(node.instance_kind.as_deref(), Some("Composite"));
        assert_eq!(manager.get_node("r1", "ns1", "i1", "gateway"), Some(node));
        assert_eq!(manager.current_model("r1").unwrap().nodes.len(), 1);
    }

    #[test]
    fn incomplete_observations_are_dropped() {
        let manager = manager();
        assert!(manager
            .observe_component(&ComponentObservation::new("r1", "", "i1", "gateway"))
            .is_none());

        let call = CallObservation::new(component("gateway"), ComponentObservation::new("r1", "ns1", "i1", ""));
        assert!(!manager.observe_call(&call));
        assert!(!manager.observe_removal(&ComponentObservation::new("", "ns1", "i1", "gateway")));
    }

    #[test]
    fn calls_across_runtimes_are_dropped() {
        let manager = manager();
        let call = CallObservation::new(
            component("gateway"),
            ComponentObservation::new("r2", "ns1", "i1", "backend"),
        );
        assert!(!manager.observe_call(&call));
        assert!(manager.runtimes().is_empty());
    }

    #[test]
    fn observe_removal_removes_node() {
        let manager = manager();
        manager.observe_call(&CallObservation::new(component("gateway"), component("backend")));

        assert!(manager.observe_removal(&component("backend")));
        let model = manager.current_model("r1").unwrap();
        assert_eq!(model.nodes.len(), 1);
        assert!(model.edges.is_empty());
    }

    #[test]
    fn from_event_reads_standard_attributes() {
        let event = TelemetryEvent::new()
            .with(attributes::RUNTIME, "r1")
            .with(attributes::SOURCE_NAMESPACE, "ns1")
            .with(attributes::SOURCE_INSTANCE, "i1")
            .with(attributes::SOURCE_INSTANCE_KIND, "Cell")
            .with(attributes::SOURCE_COMPONENT, "gateway")
            .with(attributes::DESTINATION_NAMESPACE, "ns1")
            .with(attributes::DESTINATION_INSTANCE, "i2")
            .with(attributes::DESTINATION_COMPONENT, "backend");

        let call = CallObservation::from_event(&event);
        assert_eq!(call.source, component("gateway"));
        assert_eq!(call.destination, ComponentObservation::new("r1", "ns1", "i2", "backend"));
    }
}
