//! The whole ensemble as one array job.
//!
//! Every array task re-invokes the command-line tool with its task index, so
//! the job only needs the experiment directory, the table and a config file:
//!
//! ```text
//! <program> -c <expdir>/job.run.array.json run --task --id $TASK_VAR \
//!     --params-file <expdir>/params.txt -o <expdir>
//! ```

use crate::config::{save_json, ExperimentConfig};
use crate::errors::{EnsembleError, Result};
use crate::indices::full_range;
use crate::model::shell_quote;
use crate::planner::PARAMS_FILE;
use crate::scheduler::{JobId, JobRequest, Resources, SchedulerBackend};
use std::path::{Path, PathBuf};

pub const ARRAY_BASENAME: &str = "job.run.array";

pub struct ArrayJobBuilder {
    program: String,
    config: ExperimentConfig,
}

impl ArrayJobBuilder {
    /// `program` is the command-line tool the tasks call back into.
    pub fn new(program: impl Into<String>, config: ExperimentConfig) -> Self {
        Self {
            program: program.into(),
            config,
        }
    }

    pub fn config_path(expdir: &Path) -> PathBuf {
        expdir.join(format!("{ARRAY_BASENAME}.json"))
    }

    /// Range covering `selection`: `0-(size-1)` when no selection is given or
    /// the selection is every member in order, `START-STOP[:STEP]` for an
    /// evenly spaced selection, otherwise the comma-joined indices.
    pub fn array_range(selection: Option<&[usize]>, size: usize) -> Result<String> {
        let full = full_range(size).ok_or(EnsembleError::EmptyEnsemble)?;
        let Some(selection) = selection else {
            return Ok(full);
        };
        if let Some(&index) = selection.iter().find(|&&i| i >= size) {
            return Err(EnsembleError::IndexOutOfRange { index, size });
        }
        if selection.is_empty() {
            return Err(EnsembleError::Parse("empty array selection".into()));
        }
        if selection.iter().copied().eq(0..size) {
            return Ok(full);
        }
        if let Some(range) = stepped_range(selection) {
            return Ok(range);
        }
        Ok(selection
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(","))
    }

    /// Array range for `backend`, checked against what the backend accepts.
    /// Touches nothing on disk, so callers can run it before setting up the
    /// experiment directory.
    pub fn range_for(
        backend: &dyn SchedulerBackend,
        selection: Option<&[usize]>,
        size: usize,
    ) -> Result<String> {
        if backend.array_task_variable().is_none() {
            return Err(EnsembleError::ArrayUnsupported {
                backend: backend.name().to_string(),
            });
        }
        let range = Self::array_range(selection, size)?;
        if !backend.array_index_lists() && !is_single_range(&range) {
            return Err(EnsembleError::Parse(format!(
                "{} array jobs need a START-STOP[:STEP] selection, got {range}",
                backend.name()
            )));
        }
        Ok(range)
    }

    /// Build the request and write the task config. The table must already
    /// be in `<expdir>/params.txt`.
    pub fn build(
        &self,
        size: usize,
        selection: Option<&[usize]>,
        expdir: &Path,
        backend: &dyn SchedulerBackend,
        resources: &Resources,
    ) -> Result<JobRequest> {
        let range = Self::range_for(backend, selection, size)?;
        let variable = backend
            .array_task_variable()
            .ok_or_else(|| EnsembleError::ArrayUnsupported {
                backend: backend.name().to_string(),
            })?;

        let config_path = Self::config_path(expdir);
        save_json(&self.config, &config_path)?;

        let command = [
            shell_quote(&self.program),
            "-c".into(),
            shell_quote(&config_path.to_string_lossy()),
            "run".into(),
            "--task".into(),
            "--id".into(),
            format!("${variable}"),
            "--params-file".into(),
            shell_quote(&expdir.join(PARAMS_FILE).to_string_lossy()),
            "-o".into(),
            shell_quote(&expdir.to_string_lossy()),
        ]
        .join(" ");

        let mut resources = resources.clone();
        resources.array = Some(range);
        if resources.job_name.is_none() {
            resources.job_name = Some("ensemble".into());
        }
        Ok(JobRequest {
            command,
            resources,
            output_path: expdir.join(format!("{ARRAY_BASENAME}.out")),
            error_path: expdir.join(format!("{ARRAY_BASENAME}.err")),
            script_path: expdir.join(format!("{ARRAY_BASENAME}.sh")),
        })
    }

    pub fn submit(
        &self,
        size: usize,
        selection: Option<&[usize]>,
        expdir: &Path,
        backend: &dyn SchedulerBackend,
        resources: &Resources,
    ) -> Result<JobId> {
        let request = self.build(size, selection, expdir, backend, resources)?;
        let id = backend.submit_request(&request)?;
        tracing::info!(job = %id, array = ?request.resources.array, "submitted array job");
        Ok(id)
    }
}

/// `START-STOP[:STEP]` when `selection` is increasing with a constant step.
fn stepped_range(selection: &[usize]) -> Option<String> {
    let (&first, &last) = (selection.first()?, selection.last()?);
    if selection.len() < 2 {
        return None;
    }
    let step = selection[1].checked_sub(first).filter(|&s| s > 0)?;
    if !selection.windows(2).all(|w| w[1].checked_sub(w[0]) == Some(step)) {
        return None;
    }
    Some(if step == 1 {
        format!("{first}-{last}")
    } else {
        format!("{first}-{last}:{step}")
    })
}

fn is_single_range(range: &str) -> bool {
    !range.contains(',') && range.contains('-')
}
