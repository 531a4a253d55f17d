//! Writing scoped dependency models to JSON.

use std::path::Path;

use anyhow::{bail, Context, Result};
use meshgraph_engine::{ModelManager, Scope};
use meshgraph_types::Model;

/// What to export.
///
/// The scope narrows from namespace to instance to component; naming an
/// instance requires a namespace and naming a component requires both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    /// Export only this runtime. All known runtimes when `None`.
    pub runtime: Option<String>,
    pub namespace: Option<String>,
    pub instance: Option<String>,
    pub component: Option<String>,
    pub since_ms: u64,
    pub until_ms: u64,
}

impl Default for ExportRequest {
    fn default() -> Self {
        Self {
            runtime: None,
            namespace: None,
            instance: None,
            component: None,
            since_ms: 0,
            until_ms: u64::MAX,
        }
    }
}

impl ExportRequest {
    fn scope(&self) -> Result<Scope<'_>> {
        let scope = match (
            self.namespace.as_deref(),
            self.instance.as_deref(),
            self.component.as_deref(),
        ) {
            (None, None, None) => Scope::Runtime,
            (Some(namespace), None, None) => Scope::Namespace { namespace },
            (Some(namespace), Some(instance), None) => Scope::Instance {
                namespace,
                instance,
            },
            (Some(namespace), Some(instance), Some(component)) => Scope::Component {
                namespace,
                instance,
                component,
            },
            (None, Some(_), _) => bail!("An instance scope needs a namespace"),
            (_, None, Some(_)) => bail!("A component scope needs a namespace and an instance"),
        };
        if self.since_ms > self.until_ms {
            bail!(
                "Export range is empty: since {} is after until {}",
                self.since_ms,
                self.until_ms
            );
        }
        Ok(scope)
    }
}

/// Build the export document.
pub fn build_export(manager: &ModelManager, request: &ExportRequest) -> Result<serde_json::Value> {
    let scope = request.scope()?;
    let runtimes = match &request.runtime {
        Some(runtime) => vec![runtime.clone()],
        None => manager.runtimes(),
    };

    let mut exported = Vec::with_capacity(runtimes.len());
    for runtime in &runtimes {
        let model = manager
            .get_scoped_dependency_model(request.since_ms, request.until_ms, runtime, scope)
            .with_context(|| format!("Failed to load the dependency model of {}", runtime))?;
        exported.push(model_json(runtime, &model)?);
    }

    let mut export = serde_json::Map::new();
    export.insert(
        "scope".to_string(),
        serde_json::json!({
            "namespace": request.namespace,
            "instance": request.instance,
            "component": request.component,
            "since_ms": request.since_ms,
            "until_ms": request.until_ms,
        }),
    );
    export.insert("runtimes".to_string(), serde_json::Value::Array(exported));
    Ok(serde_json::Value::Object(export))
}

fn model_json(runtime: &str, model: &Model) -> Result<serde_json::Value> {
    let mut nodes: Vec<_> = model.nodes.iter().collect();
    nodes.sort_by_cached_key(|node| node.fqn());
    let mut edges: Vec<_> = model.edges.iter().collect();
    edges.sort_by_cached_key(|edge| edge.to_string());

    Ok(serde_json::json!({
        "runtime": runtime,
        "nodes": serde_json::to_value(nodes)?,
        "edges": serde_json::to_value(edges)?,
    }))
}

/// Export to a JSON file.
pub fn export_to_file(manager: &ModelManager, request: &ExportRequest, path: &Path) -> Result<()> {
    use std::io::Write;

    let export = build_export(manager, request)?;
    let json = serde_json::to_string_pretty(&export)?;
    let mut file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    file.write_all(json.as_bytes())?;
    file.write_all(b"\n")?;

    tracing::info!(path = %path.display(), "Exported dependency model");
    Ok(())
}
