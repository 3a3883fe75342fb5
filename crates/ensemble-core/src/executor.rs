//! Local dispatch of one model command.

use crate::errors::{EnsembleError, Result};
use crate::model::ModelCommand;
use std::fs::File;
use std::path::Path;
use std::process::{Child, Command, Stdio};

pub const LOG_OUT: &str = "log.out";
pub const LOG_ERR: &str = "log.err";

/// Captured stderr is capped to keep failure reports readable.
const STDERR_CAP: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecMode {
    /// Spawn and block until the model exits.
    #[default]
    Foreground,
    /// Spawn with output redirected to the run directory and return at once.
    Background,
    /// Print the command, spawn nothing.
    DryRun,
}

#[derive(Debug)]
pub enum Launched {
    Exited { code: Option<i32>, stderr: String },
    Detached(Child),
    Rendered(String),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Executor {
    mode: ExecMode,
}

impl Executor {
    pub fn new(mode: ExecMode) -> Self {
        Self { mode }
    }

    pub fn mode(&self) -> ExecMode {
        self.mode
    }

    /// Run `cmd` from the current directory; `rundir` only receives the
    /// background logs.
    pub fn execute(&self, cmd: &ModelCommand, rundir: &Path) -> Result<Launched> {
        match self.mode {
            ExecMode::DryRun => {
                let line = cmd.render();
                println!("{line}");
                Ok(Launched::Rendered(line))
            }
            ExecMode::Foreground => {
                tracing::debug!(command = %cmd, "running in foreground");
                let child = command(cmd)
                    .stdin(Stdio::null())
                    .stdout(Stdio::inherit())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(|source| spawn_error(cmd, source))?;
                let output = child
                    .wait_with_output()
                    .map_err(|source| spawn_error(cmd, source))?;
                let stderr = String::from_utf8_lossy(&output.stderr);
                if !stderr.is_empty() {
                    eprint!("{stderr}");
                }
                Ok(Launched::Exited {
                    code: output.status.code(),
                    stderr: tail(&stderr),
                })
            }
            ExecMode::Background => {
                let out_path = rundir.join(LOG_OUT);
                let err_path = rundir.join(LOG_ERR);
                let stdout = File::create(&out_path).map_err(|e| EnsembleError::io(&out_path, e))?;
                let stderr = File::create(&err_path).map_err(|e| EnsembleError::io(&err_path, e))?;
                let child = command(cmd)
                    .stdin(Stdio::null())
                    .stdout(stdout)
                    .stderr(stderr)
                    .spawn()
                    .map_err(|source| spawn_error(cmd, source))?;
                tracing::debug!(pid = child.id(), command = %cmd, "started in background");
                Ok(Launched::Detached(child))
            }
        }
    }
}

fn command(cmd: &ModelCommand) -> Command {
    let mut c = Command::new(&cmd.executable);
    c.args(&cmd.args);
    c
}

fn spawn_error(cmd: &ModelCommand, source: std::io::Error) -> EnsembleError {
    EnsembleError::ProcessSpawn {
        program: cmd.executable.clone(),
        source,
    }
}

/// Last `STDERR_CAP` bytes of `s`, cut on a char boundary.
pub(crate) fn tail(s: &str) -> String {
    let s = s.trim_end();
    if s.len() <= STDERR_CAP {
        return s.to_string();
    }
    let mut start = s.len() - STDERR_CAP;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}
