use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use meshgraph_cli::{export, source, ExportRequest, Overrides, Pipeline, Settings};
use meshgraph_engine::dedup::{DedupConfig, DeduplicationWindow, TokioClock};
use meshgraph_engine::ModelManager;
use meshgraph_store::{ModelStore, SqliteBackend};
use meshgraph_types::{StreamSchema, SystemClock};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "meshgraph")]
#[command(about = "Build service dependency models from call telemetry")]
#[command(group(ArgGroup::new("action").required(true).multiple(true).args(["input", "export"])))]
struct Args {
    /// Settings file (TOML, YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// SQLite database holding model snapshots
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Newline-delimited JSON telemetry to replay, or "-" for stdin
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Runtime for records without one; also limits --export to this runtime
    #[arg(short, long)]
    runtime: Option<String>,

    /// Deduplication window (e.g., "60s", "500ms")
    #[arg(short, long)]
    window: Option<String>,

    /// How often live models are persisted (e.g., "60s")
    #[arg(long)]
    flush_interval: Option<String>,

    /// Export the dependency model to a JSON file after replaying
    #[arg(short, long)]
    export: Option<PathBuf>,

    /// Limit the export to a namespace
    #[arg(long, requires = "export")]
    namespace: Option<String>,

    /// Limit the export to an instance (requires --namespace)
    #[arg(long, requires_all = ["export", "namespace"])]
    instance: Option<String>,

    /// Limit the export to a component (requires --namespace and --instance)
    #[arg(long, requires_all = ["export", "namespace", "instance"])]
    component: Option<String>,

    /// Start of the export range, in epoch milliseconds
    #[arg(long, requires = "export")]
    since_ms: Option<u64>,

    /// End of the export range, in epoch milliseconds
    #[arg(long, requires = "export")]
    until_ms: Option<u64>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            database: self.database.clone(),
            runtime: self.runtime.clone(),
            window: self.window.clone(),
            flush_interval: self.flush_interval.clone(),
        }
    }

    fn export_request(&self, settings: &Settings) -> ExportRequest {
        ExportRequest {
            runtime: settings.runtime.clone(),
            namespace: self.namespace.clone(),
            instance: self.instance.clone(),
            component: self.component.clone(),
            since_ms: self.since_ms.unwrap_or(0),
            until_ms: self.until_ms.unwrap_or(u64::MAX),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let settings = Settings::load(args.config.as_deref(), &args.overrides())?;
    let manager = Arc::new(ModelManager::new(open_store(&settings))?);

    if let Some(input) = &args.input {
        let window = DeduplicationWindow::new(
            DedupConfig::new(settings.window_ms()?),
            &StreamSchema::telemetry(),
            Arc::new(TokioClock::new()),
        )?;
        let reader = source::open_input(input).await?;

        let summary = Pipeline::new(manager.clone(), window)
            .flush_interval(settings.flush_interval()?)
            .runtime(settings.runtime.clone())
            .run(reader)
            .await
            .with_context(|| format!("Failed to replay {}", input.display()))?;

        tracing::info!(
            forwarded = summary.read.forwarded,
            skipped = summary.read.skipped,
            records = summary.records,
            merged = summary.merged,
            new_edges = summary.new_edges,
            "Replay finished"
        );
    }

    if let Some(path) = &args.export {
        export::export_to_file(&manager, &args.export_request(&settings), path)?;
    }

    Ok(())
}

/// Open the snapshot database, running degraded if it cannot be opened.
fn open_store(settings: &Settings) -> Arc<ModelStore> {
    match SqliteBackend::open(&settings.database) {
        Ok(backend) => Arc::new(ModelStore::new(Arc::new(backend), Arc::new(SystemClock))),
        Err(e) => {
            tracing::error!(
                database = %settings.database.display(),
                error = %e,
                "Failed to open the model database, models will not be persisted"
            );
            Arc::new(ModelStore::unavailable(e.to_string(), Arc::new(SystemClock)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn args_are_consistent() {
        Args::command().debug_assert();
    }

    #[test]
    fn needs_input_or_export() {
        assert!(Args::try_parse_from(["meshgraph"]).is_err());
        assert!(Args::try_parse_from(["meshgraph", "--input", "-"]).is_ok());
        assert!(Args::try_parse_from(["meshgraph", "--export", "out.json"]).is_ok());
    }

    #[test]
    fn scope_flags_require_their_parents() {
        assert!(Args::try_parse_from(["meshgraph", "-e", "o.json", "--instance", "hr"]).is_err());
        assert!(Args::try_parse_from([
            "meshgraph",
            "-e",
            "o.json",
            "--namespace",
            "ns1",
            "--instance",
            "hr",
            "--component",
            "gateway",
        ])
        .is_ok());
    }

    #[test]
    fn export_request_defaults_to_everything() {
        let args = Args::try_parse_from(["meshgraph", "-e", "o.json"]).unwrap();
        let settings = Settings {
            database: PathBuf::from("db"),
            runtime: None,
            window: "60s".to_string(),
            flush_interval: "60s".to_string(),
        };
        assert_eq!(args.export_request(&settings), ExportRequest::default());
    }
}
