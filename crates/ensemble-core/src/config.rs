//! Experiment configuration: how members are turned into commands, where
//! their directories go and which scheduler receives them.
//!
//! Files are written as JSON. On load the extension decides the format:
//! `.json` is parsed as JSON, anything else as YAML.

use crate::errors::{EnsembleError, Result};
use crate::model::CommandTemplate;
use crate::scheduler::{Resources, SchedulerConfig};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub model: CommandTemplate,
    /// Name run directories after their parameter values instead of the index.
    pub auto_dir: bool,
    pub scheduler: SchedulerConfig,
    pub resources: Resources,
}

/// Anything that can persist the experiment description next to the table.
pub trait ConfigWriter: Send + Sync {
    fn write_config(&self, path: &Path) -> Result<()>;
}

#[derive(Serialize)]
struct Snapshot<'a> {
    created_at: DateTime<Utc>,
    tool_version: &'a str,
    #[serde(flatten)]
    config: &'a ExperimentConfig,
}

impl ExperimentConfig {
    pub fn load(path: &Path) -> Result<Self> {
        load(path)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        save_json(self, path)
    }
}

impl ConfigWriter for ExperimentConfig {
    /// Writes the config plus a creation timestamp and the tool version.
    /// Both extra fields are ignored when the file is loaded back.
    fn write_config(&self, path: &Path) -> Result<()> {
        let snapshot = Snapshot {
            created_at: Utc::now(),
            tool_version: TOOL_VERSION,
            config: self,
        };
        save_json(&snapshot, path)
    }
}

/// Read a JSON or YAML document, chosen by file extension.
pub fn load<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let bytes = std::fs::read(path).map_err(|e| EnsembleError::io(path, e))?;
    if path.extension().and_then(|s| s.to_str()) == Some("json") {
        Ok(serde_json::from_slice(&bytes)?)
    } else {
        Ok(serde_yaml::from_slice(&bytes)?)
    }
}

pub fn save_json<T: Serialize + ?Sized>(value: &T, path: &Path) -> Result<()> {
    let mut body = serde_json::to_string_pretty(value)?;
    body.push('\n');
    std::fs::write(path, body).map_err(|e| EnsembleError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ParamFileType;

    fn config() -> ExperimentConfig {
        ExperimentConfig {
            model: CommandTemplate::new("model.x")
                .out_prefix("--out ")
                .param_file("params.json", ParamFileType::Json),
            auto_dir: true,
            resources: Resources {
                queue: Some("short".into()),
                ..Resources::default()
            },
            ..ExperimentConfig::default()
        }
    }

    #[test]
    fn snapshot_loads_back_as_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.json");
        config().write_config(&path).unwrap();

        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.get("created_at").is_some());
        assert_eq!(raw["tool_version"], TOOL_VERSION);

        assert_eq!(ExperimentConfig::load(&path).unwrap(), config());
    }

    #[test]
    fn yaml_is_accepted_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("experiment.yaml");
        std::fs::write(
            &path,
            "model:\n  executable: echo\n  args: \"--a {a}\"\nscheduler:\n  backend: pbs\n",
        )
        .unwrap();
        let cfg = ExperimentConfig::load(&path).unwrap();
        assert_eq!(cfg.model.executable, "echo");
        assert_eq!(cfg.model.args.as_deref(), Some("--a {a}"));
        assert_eq!(cfg.scheduler.backend, "pbs");
        assert_eq!(cfg.scheduler.poll_interval_secs, 30);
        assert!(!cfg.auto_dir);
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = ExperimentConfig::load(Path::new("/nonexistent/cfg.json")).unwrap_err();
        assert!(matches!(err, EnsembleError::Io { .. }));
    }
}
