use super::{directive, JobId, JobRequest, Programs, SchedulerBackend, SchedulerConfig};
use crate::errors::{EnsembleError, Result};
use std::path::Path;

pub struct Slurm {
    programs: Programs,
}

impl Slurm {
    pub fn new(cfg: &SchedulerConfig) -> Self {
        Self {
            programs: Programs::resolve(cfg, "sbatch", "squeue"),
        }
    }
}

impl SchedulerBackend for Slurm {
    fn name(&self) -> &str {
        "slurm"
    }

    fn render_script(&self, request: &JobRequest) -> String {
        let r = &request.resources;
        let mut out = String::from("#!/bin/bash\n");
        directive(&mut out, "#SBATCH", "--job-name=", r.job_name.as_deref());
        directive(&mut out, "#SBATCH", "--qos=", r.queue.as_deref());
        directive(&mut out, "#SBATCH", "--account=", r.account.as_deref());
        directive(&mut out, "#SBATCH", "--time=", r.walltime.as_deref());
        directive(&mut out, "#SBATCH", "--array=", r.array.as_deref());
        directive(
            &mut out,
            "#SBATCH",
            "--output=",
            Some(&*request.output_path.to_string_lossy()),
        );
        directive(
            &mut out,
            "#SBATCH",
            "--error=",
            Some(&*request.error_path.to_string_lossy()),
        );
        for extra in &r.extra {
            out.push_str(&format!("#SBATCH {extra}\n"));
        }
        out.push('\n');
        out.push_str(&request.command);
        out.push('\n');
        out
    }

    /// Accepts both `--parsable` output (`123` or `123;cluster`) and the
    /// default `Submitted batch job 123`.
    fn submit(&self, script_path: &Path) -> Result<JobId> {
        let stdout = self.programs.submit(script_path)?;
        parse_job_id(&stdout).ok_or_else(|| {
            EnsembleError::submission(format!("unexpected sbatch output: {stdout:?}"), "")
        })
    }

    fn is_enqueued(&self, id: &JobId) -> Result<bool> {
        let user = self.programs.user()?;
        let listing = self.programs.query(&["-h", "-u", &user, "-o", "%i"])?;
        Ok(listing.lines().map(str::trim).any(|line| {
            line == id.0
                || line
                    .strip_prefix(id.0.as_str())
                    .is_some_and(|rest| rest.starts_with('_'))
        }))
    }

    fn array_task_variable(&self) -> Option<&'static str> {
        Some("SLURM_ARRAY_TASK_ID")
    }
}

fn parse_job_id(stdout: &str) -> Option<JobId> {
    let last = stdout.split_whitespace().last()?;
    let id = last.split(';').next()?;
    (!id.is_empty() && id.chars().all(|c| c.is_ascii_digit())).then(|| JobId(id.to_string()))
}
