use super::{directive, JobId, JobRequest, Programs, SchedulerBackend, SchedulerConfig};
use crate::errors::{EnsembleError, Result};
use std::path::Path;

/// PBS Pro / Torque style `qsub`. Array ranges use PBS Pro `-J`.
pub struct Pbs {
    programs: Programs,
}

impl Pbs {
    pub fn new(cfg: &SchedulerConfig) -> Self {
        Self {
            programs: Programs::resolve(cfg, "qsub", "qstat"),
        }
    }
}

impl SchedulerBackend for Pbs {
    fn name(&self) -> &str {
        "pbs"
    }

    fn render_script(&self, request: &JobRequest) -> String {
        let r = &request.resources;
        let mut out = String::from("#!/bin/bash\n#PBS -V\n");
        directive(&mut out, "#PBS", "-N ", r.job_name.as_deref());
        directive(&mut out, "#PBS", "-q ", r.queue.as_deref());
        directive(&mut out, "#PBS", "-A ", r.account.as_deref());
        directive(&mut out, "#PBS", "-l walltime=", r.walltime.as_deref());
        directive(&mut out, "#PBS", "-J ", r.array.as_deref());
        directive(
            &mut out,
            "#PBS",
            "-o ",
            Some(&*request.output_path.to_string_lossy()),
        );
        directive(
            &mut out,
            "#PBS",
            "-e ",
            Some(&*request.error_path.to_string_lossy()),
        );
        for extra in &r.extra {
            out.push_str(&format!("#PBS {extra}\n"));
        }
        out.push_str("\ncd \"${PBS_O_WORKDIR:-.}\"\n");
        out.push_str(&request.command);
        out.push('\n');
        out
    }

    /// `qsub` prints the full job id, e.g. `123.server`.
    fn submit(&self, script_path: &Path) -> Result<JobId> {
        let stdout = self.programs.submit(script_path)?;
        let id = stdout.lines().map(str::trim).find(|l| !l.is_empty());
        match id {
            Some(id) if id.starts_with(|c: char| c.is_ascii_digit()) => Ok(JobId(id.to_string())),
            _ => Err(EnsembleError::submission(
                format!("unexpected qsub output: {stdout:?}"),
                "",
            )),
        }
    }

    /// `qstat` may truncate the server part, so match on the numeric prefix.
    fn is_enqueued(&self, id: &JobId) -> Result<bool> {
        let user = self.programs.user()?;
        let listing = self.programs.query(&["-u", &user])?;
        let number = numeric_part(&id.0);
        Ok(listing.lines().any(|line| {
            line.split_whitespace()
                .next()
                .is_some_and(|first| numeric_part(first) == number)
        }))
    }

    fn array_task_variable(&self) -> Option<&'static str> {
        Some("PBS_ARRAY_INDEX")
    }

    /// `-J` only takes `X-Y[:Z]`.
    fn array_index_lists(&self) -> bool {
        false
    }
}

fn numeric_part(id: &str) -> &str {
    let end = id.find(|c: char| !c.is_ascii_digit()).unwrap_or(id.len());
    &id[..end]
}
