//! Dispatch results. Every member carries the last stage it reached, so a
//! partially dispatched ensemble can be reported member by member.

use crate::errors::Result;
use crate::executor::{tail, LOG_ERR};
use crate::indices::MemberIndex;
use crate::scheduler::{wait_for_jobs, JobId, SchedulerBackend};
use std::path::PathBuf;
use std::process::Child;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberStage {
    Planned,
    DirectoryReady,
    Dispatched,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberOutcome {
    pub index: MemberIndex,
    pub rundir: PathBuf,
    pub stage: MemberStage,
    /// Stage the member had reached when it failed.
    pub failed_at: Option<MemberStage>,
    /// Rendered command line.
    pub command: String,
    pub exit_code: Option<i32>,
    pub error: Option<String>,
    pub stderr: Option<String>,
}

impl MemberOutcome {
    pub(crate) fn new(index: MemberIndex, rundir: PathBuf, command: String) -> Self {
        Self {
            index,
            rundir,
            stage: MemberStage::Planned,
            failed_at: None,
            command,
            exit_code: None,
            error: None,
            stderr: None,
        }
    }

    pub(crate) fn fail(&mut self, error: impl ToString, stderr: Option<String>) {
        self.failed_at = Some(self.stage);
        self.stage = MemberStage::Failed;
        self.error = Some(error.to_string());
        self.stderr = stderr.filter(|s| !s.is_empty());
        tracing::warn!(member = %self.index, stage = ?self.failed_at, error = ?self.error, "member failed");
    }

    pub fn is_failed(&self) -> bool {
        self.stage == MemberStage::Failed
    }
}

/// Local run. Background members hold their child until [`RunHandle::wait`].
#[derive(Debug, Default)]
pub struct RunHandle {
    members: Vec<(MemberOutcome, Option<Child>)>,
}

impl RunHandle {
    pub(crate) fn push(&mut self, outcome: MemberOutcome, child: Option<Child>) {
        self.members.push((outcome, child));
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &MemberOutcome> {
        self.members.iter().map(|(o, _)| o)
    }

    pub fn failures(&self) -> Vec<&MemberOutcome> {
        self.outcomes().filter(|o| o.is_failed()).collect()
    }

    /// Wait for every background child and return the final outcomes.
    pub fn wait(self) -> Vec<MemberOutcome> {
        self.members
            .into_iter()
            .map(|(mut outcome, child)| {
                if let Some(mut child) = child {
                    match child.wait() {
                        Ok(status) if status.success() => {
                            outcome.exit_code = status.code();
                            outcome.stage = MemberStage::Completed;
                        }
                        Ok(status) => {
                            outcome.exit_code = status.code();
                            let stderr = std::fs::read_to_string(outcome.rundir.join(LOG_ERR))
                                .ok()
                                .map(|s| tail(&s));
                            outcome.fail(format!("model exited with {status}"), stderr);
                        }
                        Err(e) => outcome.fail(format!("waiting for model: {e}"), None),
                    }
                }
                outcome
            })
            .collect()
    }
}

/// Cluster submission; one job id per successfully submitted member.
#[derive(Debug, Default)]
pub struct SubmitHandle {
    members: Vec<(MemberOutcome, Option<JobId>)>,
}

impl SubmitHandle {
    pub(crate) fn push(&mut self, outcome: MemberOutcome, job: Option<JobId>) {
        self.members.push((outcome, job));
    }

    pub fn outcomes(&self) -> impl Iterator<Item = &MemberOutcome> {
        self.members.iter().map(|(o, _)| o)
    }

    pub fn job_ids(&self) -> Vec<&JobId> {
        self.members.iter().filter_map(|(_, id)| id.as_ref()).collect()
    }

    pub fn failures(&self) -> Vec<&MemberOutcome> {
        self.outcomes().filter(|o| o.is_failed()).collect()
    }

    /// Poll the queue until every submitted job has left it. Jobs that left
    /// the queue are marked completed; the model's own exit status is only in
    /// its logs.
    pub fn wait(self, backend: &dyn SchedulerBackend, poll: Duration) -> Result<Vec<MemberOutcome>> {
        let ids: Vec<JobId> = self.job_ids().into_iter().cloned().collect();
        wait_for_jobs(backend, &ids, poll)?;
        Ok(self
            .members
            .into_iter()
            .map(|(mut outcome, job)| {
                if job.is_some() {
                    outcome.stage = MemberStage::Completed;
                }
                outcome
            })
            .collect())
    }
}
