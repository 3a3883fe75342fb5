use super::{directive, JobId, JobRequest, Programs, SchedulerBackend, SchedulerConfig};
use crate::errors::{EnsembleError, Result};
use std::path::Path;

const DEFAULT_CLASS: &str = "medium";

/// IBM LoadLeveler. No array jobs.
pub struct LoadLeveler {
    programs: Programs,
}

impl LoadLeveler {
    pub fn new(cfg: &SchedulerConfig) -> Self {
        Self {
            programs: Programs::resolve(cfg, "llsubmit", "llq"),
        }
    }
}

impl SchedulerBackend for LoadLeveler {
    fn name(&self) -> &str {
        "loadleveler"
    }

    fn render_script(&self, request: &JobRequest) -> String {
        let r = &request.resources;
        let mut out = String::from("#!/bin/ksh\n");
        directive(&mut out, "# @", "job_name = ", r.job_name.as_deref());
        directive(
            &mut out,
            "# @",
            "class = ",
            Some(r.queue.as_deref().unwrap_or(DEFAULT_CLASS)),
        );
        directive(&mut out, "# @", "group = ", r.account.as_deref());
        out.push_str("# @ job_type = serial\n");
        directive(
            &mut out,
            "# @",
            "output = ",
            Some(&*request.output_path.to_string_lossy()),
        );
        directive(
            &mut out,
            "# @",
            "error = ",
            Some(&*request.error_path.to_string_lossy()),
        );
        directive(&mut out, "# @", "wall_clock_limit = ", r.walltime.as_deref());
        for extra in &r.extra {
            out.push_str(&format!("# @ {extra}\n"));
        }
        out.push_str("# @ notification = complete\n");
        out.push_str("# @ queue\n\n");
        out.push_str(&request.command);
        out.push('\n');
        out
    }

    /// `llsubmit: The job "host.123" has been submitted.`
    fn submit(&self, script_path: &Path) -> Result<JobId> {
        let stdout = self.programs.submit(script_path)?;
        parse_job_id(&stdout).ok_or_else(|| {
            EnsembleError::submission(format!("unexpected llsubmit output: {stdout:?}"), "")
        })
    }

    fn is_enqueued(&self, id: &JobId) -> Result<bool> {
        let user = self.programs.user()?;
        let listing = self.programs.query(&["-u", &user])?;
        if listing.contains("currently no job") {
            return Ok(false);
        }
        Ok(lists_job(&listing, &id.0))
    }

    fn array_task_variable(&self) -> Option<&'static str> {
        None
    }
}

/// `llq` lists job steps (`host.123.0`), so a job matches its own id or any
/// of its step ids.
fn lists_job(listing: &str, id: &str) -> bool {
    listing.split_whitespace().any(|token| {
        token == id
            || token
                .strip_prefix(id)
                .is_some_and(|rest| rest.starts_with('.'))
    })
}

fn parse_job_id(stdout: &str) -> Option<JobId> {
    let start = stdout.find('"')? + 1;
    let len = stdout[start..].find('"')?;
    let id = &stdout[start..start + len];
    (!id.is_empty()).then(|| JobId(id.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::tests::request;

    #[test]
    fn script_uses_keyword_statements() {
        let s = LoadLeveler::new(&SchedulerConfig::default()).render_script(&request());
        assert!(s.starts_with("#!/bin/ksh\n"));
        assert!(s.contains("# @ class = short\n"));
        assert!(s.contains("# @ group = climate\n"));
        assert!(s.contains("# @ wall_clock_limit = 01:00:00\n"));
        assert!(s.contains("# @ queue\n"));
        assert!(s.trim_end().ends_with("model.x --a 3 --out out/2"));
    }

    #[test]
    fn class_defaults_to_medium() {
        let mut req = request();
        req.resources.queue = None;
        let s = LoadLeveler::new(&SchedulerConfig::default()).render_script(&req);
        assert!(s.contains("# @ class = medium\n"));
    }

    #[test]
    fn job_id_is_the_quoted_name() {
        assert_eq!(
            parse_job_id(r#"llsubmit: The job "node1.1234" has been submitted."#),
            Some(JobId("node1.1234".into()))
        );
        assert_eq!(parse_job_id("llsubmit: error"), None);
    }

    #[test]
    fn queue_listing_matches_whole_ids() {
        let listing = "Id                       Owner      Submitted   ST PRI Class\n\
                       node1.1234.0             tester     10/18 09:12 R  50  medium\n";
        assert!(lists_job(listing, "node1.1234"));
        assert!(!lists_job(listing, "node1.12"));
        assert!(!lists_job(listing, "node1.123"));
        assert!(lists_job("node1.77 tester", "node1.77"));
    }
}
