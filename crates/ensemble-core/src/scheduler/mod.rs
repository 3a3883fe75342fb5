//! Cluster queuing systems.
//!
//! Each backend renders a job script from a [`JobRequest`], submits it with
//! the system's submit command and checks the queue for the returned id. The
//! submit and query programs are external processes: their stdout and exit
//! status are the whole contract.

pub mod loadleveler;
pub mod pbs;
pub mod slurm;

use crate::errors::{EnsembleError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

pub use loadleveler::LoadLeveler;
pub use pbs::Pbs;
pub use slurm::Slurm;

pub const DEFAULT_BACKEND: &str = "slurm";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;

/// Resource request shared by every backend; unset fields are left to the
/// scheduler's defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resources {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub walltime: Option<String>,
    /// Array index selection, e.g. `0-9`, `0-8:2` or `0,2,5`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub array: Option<String>,
    /// Raw directives appended verbatim to the script header.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRequest {
    pub command: String,
    pub resources: Resources,
    pub output_path: PathBuf,
    pub error_path: PathBuf,
    pub script_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobId(pub String);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which backend to use and how to reach its programs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub backend: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub submit_program: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_program: Option<String>,
    /// Queue owner to query; defaults to `$USER`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    pub poll_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            submit_program: None,
            query_program: None,
            user: None,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Submit / query program pair of one backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Programs {
    pub submit: String,
    pub query: String,
    pub user: Option<String>,
}

impl Programs {
    fn resolve(cfg: &SchedulerConfig, submit: &str, query: &str) -> Self {
        Self {
            submit: cfg.submit_program.clone().unwrap_or_else(|| submit.to_string()),
            query: cfg.query_program.clone().unwrap_or_else(|| query.to_string()),
            user: cfg.user.clone(),
        }
    }

    fn user(&self) -> Result<String> {
        match &self.user {
            Some(user) => Ok(user.clone()),
            None => std::env::var("USER")
                .map_err(|_| EnsembleError::submission("cannot query queue: $USER is not set", "")),
        }
    }

    /// Run the submit program on `script` and fail on non-zero exit.
    fn submit(&self, script: &Path) -> Result<String> {
        let out = run_capture(&self.submit, &[script.as_os_str()])?;
        let stdout = String::from_utf8_lossy(&out.stdout).trim().to_string();
        if !out.status.success() {
            return Err(EnsembleError::submission(
                format!("{} exited with {}", self.submit, out.status),
                String::from_utf8_lossy(&out.stderr).trim(),
            ));
        }
        Ok(stdout)
    }

    /// Run the query program with `args` and return its stdout.
    fn query(&self, args: &[&str]) -> Result<String> {
        let os_args: Vec<&std::ffi::OsStr> = args.iter().map(std::ffi::OsStr::new).collect();
        let out = run_capture(&self.query, &os_args)?;
        if !out.status.success() {
            return Err(EnsembleError::submission(
                format!("{} exited with {}", self.query, out.status),
                String::from_utf8_lossy(&out.stderr).trim(),
            ));
        }
        Ok(String::from_utf8_lossy(&out.stdout).into_owned())
    }
}

fn run_capture(program: &str, args: &[&std::ffi::OsStr]) -> Result<Output> {
    tracing::debug!(program, ?args, "running scheduler command");
    Command::new(program)
        .args(args)
        .output()
        .map_err(|source| EnsembleError::ProcessSpawn {
            program: program.to_string(),
            source,
        })
}

pub trait SchedulerBackend: Send + Sync {
    fn name(&self) -> &str;

    fn render_script(&self, request: &JobRequest) -> String;

    fn submit(&self, script_path: &Path) -> Result<JobId>;

    fn is_enqueued(&self, id: &JobId) -> Result<bool>;

    /// Environment variable carrying the task index inside an array job;
    /// `None` when the backend has no array jobs.
    fn array_task_variable(&self) -> Option<&'static str>;

    /// Whether array ranges may be comma lists (`0,2,5`) rather than a single
    /// `START-STOP[:STEP]`.
    fn array_index_lists(&self) -> bool {
        true
    }

    /// Write the script, submit it and verify that the job reached the queue.
    fn submit_request(&self, request: &JobRequest) -> Result<JobId> {
        let script = self.render_script(request);
        std::fs::write(&request.script_path, script)
            .map_err(|e| EnsembleError::io(&request.script_path, e))?;
        let id = self.submit(&request.script_path)?;
        tracing::info!(backend = self.name(), job = %id, script = %request.script_path.display(), "submitted job");
        if !self.is_enqueued(&id)? {
            return Err(EnsembleError::submission(
                format!("job {id} does not appear in the {} queue", self.name()),
                "",
            ));
        }
        Ok(id)
    }
}

/// Resolve a backend by name; unknown names fail fast.
pub fn backend_by_name(cfg: &SchedulerConfig) -> Result<Box<dyn SchedulerBackend>> {
    match cfg.backend.as_str() {
        "slurm" => Ok(Box::new(Slurm::new(cfg))),
        "loadleveler" | "ll" => Ok(Box::new(LoadLeveler::new(cfg))),
        "pbs" | "qsub" => Ok(Box::new(Pbs::new(cfg))),
        other => Err(EnsembleError::UnsupportedBackend(other.to_string())),
    }
}

/// Block until none of `ids` is listed in the queue any more.
pub fn wait_for_jobs(backend: &dyn SchedulerBackend, ids: &[JobId], poll: Duration) -> Result<()> {
    let mut pending: Vec<&JobId> = ids.iter().collect();
    while !pending.is_empty() {
        let mut still = Vec::with_capacity(pending.len());
        for id in pending {
            if backend.is_enqueued(id)? {
                still.push(id);
            } else {
                tracing::info!(job = %id, "job left the queue");
            }
        }
        pending = still;
        if !pending.is_empty() {
            std::thread::sleep(poll);
        }
    }
    Ok(())
}

/// `#PREFIX key=value`-style header line helper shared by the renderers.
fn directive(out: &mut String, prefix: &str, flag: &str, value: Option<&str>) {
    if let Some(value) = value {
        out.push_str(&format!("{prefix} {flag}{value}\n"));
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn request() -> JobRequest {
        JobRequest {
            command: "model.x --a 3 --out out/2".into(),
            resources: Resources {
                queue: Some("short".into()),
                job_name: Some("ens-2".into()),
                account: Some("climate".into()),
                walltime: Some("01:00:00".into()),
                ..Resources::default()
            },
            output_path: PathBuf::from("out/2/log.out"),
            error_path: PathBuf::from("out/2/log.err"),
            script_path: PathBuf::from("out/2/job.submit"),
        }
    }

    #[test]
    fn registry_knows_three_backends() {
        for (name, expected) in [
            ("slurm", "slurm"),
            ("loadleveler", "loadleveler"),
            ("ll", "loadleveler"),
            ("pbs", "pbs"),
            ("qsub", "pbs"),
        ] {
            let cfg = SchedulerConfig {
                backend: name.into(),
                ..SchedulerConfig::default()
            };
            assert_eq!(backend_by_name(&cfg).unwrap().name(), expected);
        }
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let cfg = SchedulerConfig {
            backend: "condor".into(),
            ..SchedulerConfig::default()
        };
        match backend_by_name(&cfg) {
            Err(EnsembleError::UnsupportedBackend(name)) => assert_eq!(name, "condor"),
            other => panic!("expected UnsupportedBackend, got {:?}", other.map(|b| b.name().to_string())),
        }
    }

    #[test]
    fn program_overrides_win() {
        let cfg = SchedulerConfig {
            submit_program: Some("/opt/bin/sbatch".into()),
            ..SchedulerConfig::default()
        };
        let p = Programs::resolve(&cfg, "sbatch", "squeue");
        assert_eq!(p.submit, "/opt/bin/sbatch");
        assert_eq!(p.query, "squeue");
    }
}
