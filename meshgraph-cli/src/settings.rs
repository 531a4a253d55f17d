//! Layered settings for the `meshgraph` binary.
//!
//! Sources are applied in order, later ones winning: built-in defaults, an
//! optional settings file, `MESHGRAPH_*` environment variables and finally
//! command line flags.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::duration::parse_duration;

/// Prefix of the environment variables read as settings.
pub const ENV_PREFIX: &str = "MESHGRAPH";

const DEFAULT_DATABASE: &str = "dependency-model.db";
const DEFAULT_WINDOW: &str = "60s";
const DEFAULT_FLUSH_INTERVAL: &str = "60s";

/// Values given on the command line. `None` leaves the lower layers alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    pub database: Option<PathBuf>,
    pub runtime: Option<String>,
    pub window: Option<String>,
    pub flush_interval: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Settings {
    /// SQLite file holding the snapshots.
    pub database: PathBuf,
    /// Runtime assigned to records that do not name one.
    #[serde(default)]
    pub runtime: Option<String>,
    /// Deduplication window length, e.g. `"60s"`.
    pub window: String,
    /// How often live models are flushed, e.g. `"60s"`.
    pub flush_interval: String,
}

impl Settings {
    /// Load settings from every layer, reading the process environment.
    pub fn load(file: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        Self::load_with_env(file, Environment::with_prefix(ENV_PREFIX), overrides)
    }

    fn load_with_env(file: Option<&Path>, env: Environment, overrides: &Overrides) -> Result<Self> {
        let mut builder = Config::builder()
            .set_default("database", DEFAULT_DATABASE)?
            .set_default("window", DEFAULT_WINDOW)?
            .set_default("flush_interval", DEFAULT_FLUSH_INTERVAL)?;

        if let Some(path) = file {
            builder = builder.add_source(File::from(path));
        }

        let settings: Settings = builder
            .add_source(env)
            .set_override_option(
                "database",
                overrides
                    .database
                    .as_ref()
                    .map(|path| path.to_string_lossy().into_owned()),
            )?
            .set_override_option("runtime", overrides.runtime.clone())?
            .set_override_option("window", overrides.window.clone())?
            .set_override_option("flush_interval", overrides.flush_interval.clone())?
            .build()
            .context("Failed to read settings")?
            .try_deserialize()
            .context("Invalid settings")?;

        // Fail on bad durations now rather than halfway through a replay
        settings.window_ms()?;
        settings.flush_interval()?;
        Ok(settings)
    }

    /// The deduplication window in milliseconds.
    pub fn window_ms(&self) -> Result<i64> {
        let window = parse_duration(&self.window).context("Invalid window")?;
        i64::try_from(window.as_millis()).context("Window is too long")
    }

    pub fn flush_interval(&self) -> Result<Duration> {
        let interval = parse_duration(&self.flush_interval).context("Invalid flush interval")?;
        anyhow::ensure!(!interval.is_zero(), "Flush interval must be greater than zero");
        Ok(interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let source: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(source))
    }

    fn settings_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_apply_without_other_sources() {
        let settings = Settings::load_with_env(None, env(&[]), &Overrides::default()).unwrap();
        assert_eq!(settings.database, PathBuf::from("dependency-model.db"));
        assert_eq!(settings.runtime, None);
        assert_eq!(settings.window_ms().unwrap(), 60_000);
        assert_eq!(settings.flush_interval().unwrap(), Duration::from_secs(60));
    }

    #[test]
    fn file_overrides_defaults() {
        let file = settings_file("database = \"models.db\"\nwindow = \"5s\"\n");
        let settings =
            Settings::load_with_env(Some(file.path()), env(&[]), &Overrides::default()).unwrap();
        assert_eq!(settings.database, PathBuf::from("models.db"));
        assert_eq!(settings.window_ms().unwrap(), 5_000);
        assert_eq!(settings.flush_interval, "60s");
    }

    #[test]
    fn environment_overrides_file() {
        let file = settings_file("window = \"5s\"\nruntime = \"staging\"\n");
        let settings = Settings::load_with_env(
            Some(file.path()),
            env(&[("MESHGRAPH_WINDOW", "10s"), ("MESHGRAPH_FLUSH_INTERVAL", "500ms")]),
            &Overrides::default(),
        )
        .unwrap();
        assert_eq!(settings.window_ms().unwrap(), 10_000);
        assert_eq!(settings.flush_interval().unwrap(), Duration::from_millis(500));
        assert_eq!(settings.runtime.as_deref(), Some("staging"));
    }

    #[test]
    fn flags_override_everything() {
        let overrides = Overrides {
            database: Some(PathBuf::from("/tmp/flag.db")),
            runtime: Some("prod".to_string()),
            window: Some("250ms".to_string()),
            flush_interval: None,
        };
        let settings = Settings::load_with_env(
            None,
            env(&[("MESHGRAPH_DATABASE", "env.db"), ("MESHGRAPH_RUNTIME", "dev")]),
            &overrides,
        )
        .unwrap();
        assert_eq!(settings.database, PathBuf::from("/tmp/flag.db"));
        assert_eq!(settings.runtime.as_deref(), Some("prod"));
        assert_eq!(settings.window_ms().unwrap(), 250);
    }

    #[test]
    fn invalid_durations_fail_to_load() {
        let overrides = Overrides {
            window: Some("soon".to_string()),
            ..Overrides::default()
        };
        assert!(Settings::load_with_env(None, env(&[]), &overrides).is_err());

        let overrides = Overrides {
            flush_interval: Some("0s".to_string()),
            ..Overrides::default()
        };
        assert!(Settings::load_with_env(None, env(&[]), &overrides).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let result = Settings::load_with_env(
            Some(Path::new("/nonexistent/meshgraph.toml")),
            env(&[]),
            &Overrides::default(),
        );
        assert!(result.is_err());
    }
}
