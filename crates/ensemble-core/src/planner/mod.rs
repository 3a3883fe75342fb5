//! Maps ensemble members to run directories and model commands, and
//! dispatches them locally or to a cluster queue.
//!
//! Layout of an experiment directory:
//!
//! ```text
//! <expdir>/params.txt        ensemble table
//! <expdir>/experiment.json   configuration snapshot
//! <expdir>/<rundir>/         one per member (`0`, `1`, ... or auto-named)
//! <expdir>/default/          run with every parameter at its default
//! ```
//!
//! Index validation and command resolution happen before anything touches
//! the filesystem. Once dispatch starts, a member failure is recorded in the
//! returned handle and the remaining members still go out.

pub mod autodir;
pub mod handle;

pub use handle::{MemberOutcome, MemberStage, RunHandle, SubmitHandle};

use crate::config::ConfigWriter;
use crate::errors::{EnsembleError, ErrorKind, Result};
use crate::executor::{Executor, Launched, LOG_ERR, LOG_OUT};
use crate::indices::MemberIndex;
use crate::model::{ModelCommand, ModelWrapper};
use crate::scheduler::{JobRequest, Resources, SchedulerBackend};
use crate::table::{Assignment, EnsembleTable};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const PARAMS_FILE: &str = "params.txt";
pub const EXPERIMENT_CONFIG: &str = "experiment.json";
pub const DEFAULT_RUNDIR: &str = "default";
pub const JOB_SCRIPT: &str = "job.submit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirLayout {
    /// `<expdir>/<index>`
    #[default]
    Sequential,
    /// `<expdir>/<name built from the values>`
    AutoNamed,
}

/// Everything needed to dispatch one member.
#[derive(Debug, Clone, PartialEq)]
pub struct RunDescriptor {
    pub index: MemberIndex,
    pub rundir: PathBuf,
    pub params: Assignment,
    pub command: ModelCommand,
}

pub struct RunPlanner {
    model: Box<dyn ModelWrapper>,
    table: EnsembleTable,
    layout: DirLayout,
    config_writer: Option<Box<dyn ConfigWriter>>,
}

impl RunPlanner {
    pub fn new(model: Box<dyn ModelWrapper>, table: EnsembleTable) -> Self {
        Self {
            model,
            table,
            layout: DirLayout::Sequential,
            config_writer: None,
        }
    }

    pub fn with_layout(mut self, layout: DirLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_config_writer(mut self, writer: Box<dyn ConfigWriter>) -> Self {
        self.config_writer = Some(writer);
        self
    }

    pub fn table(&self) -> &EnsembleTable {
        &self.table
    }

    pub fn layout(&self) -> DirLayout {
        self.layout
    }

    pub fn validate_indices(&self, indices: &[MemberIndex]) -> Result<()> {
        let size = self.table.size();
        for index in indices {
            if let MemberIndex::Member(i) = *index {
                if i >= size {
                    return Err(EnsembleError::IndexOutOfRange { index: i, size });
                }
            }
        }
        Ok(())
    }

    /// Prepare `expdir`: refuse a non-empty directory unless `force`, then
    /// write the table and the configuration snapshot.
    pub fn setup(&self, expdir: &Path, force: bool) -> Result<()> {
        if self.layout == DirLayout::AutoNamed {
            self.check_collisions()?;
        }
        if is_non_empty_dir(expdir)? {
            if !force {
                return Err(EnsembleError::DirectoryExists {
                    path: expdir.to_path_buf(),
                });
            }
            tracing::warn!(expdir = %expdir.display(), "experiment directory exists, overwriting");
        }
        std::fs::create_dir_all(expdir).map_err(|e| EnsembleError::io(expdir, e))?;

        let params = expdir.join(PARAMS_FILE);
        self.table.write(&params)?;
        tracing::info!(path = %params.display(), members = self.table.size(), "wrote ensemble table");

        if let Some(writer) = &self.config_writer {
            writer.write_config(&expdir.join(EXPERIMENT_CONFIG))?;
        }
        Ok(())
    }

    fn check_collisions(&self) -> Result<()> {
        let mut seen: HashMap<String, usize> = HashMap::new();
        for i in 0..self.table.size() {
            let name = self.dirname(MemberIndex::Member(i))?;
            if let Some(&first) = seen.get(&name) {
                return Err(EnsembleError::RundirCollision {
                    name,
                    first,
                    second: i,
                });
            }
            seen.insert(name, i);
        }
        Ok(())
    }

    fn assignment(&self, index: MemberIndex) -> Result<Assignment> {
        match index {
            MemberIndex::Default => Ok(Assignment::new()),
            MemberIndex::Member(i) => self.table.assignment(i).ok_or(EnsembleError::IndexOutOfRange {
                index: i,
                size: self.table.size(),
            }),
        }
    }

    fn dirname(&self, index: MemberIndex) -> Result<String> {
        let params = self.assignment(index)?;
        Ok(match (index, self.layout) {
            (MemberIndex::Default, _) => DEFAULT_RUNDIR.to_string(),
            (MemberIndex::Member(i), DirLayout::Sequential) => i.to_string(),
            (MemberIndex::Member(i), DirLayout::AutoNamed) => {
                let name = autodir::autoname(&params);
                if name.is_empty() {
                    i.to_string()
                } else {
                    name
                }
            }
        })
    }

    pub fn get_rundir(&self, index: MemberIndex, expdir: &Path) -> Result<PathBuf> {
        Ok(expdir.join(self.dirname(index)?))
    }

    /// Bind the member's values and let the model wrapper build its command.
    /// The default sentinel binds nothing.
    pub fn get_model(&self, index: MemberIndex, expdir: &Path) -> Result<RunDescriptor> {
        let params = self.assignment(index)?;
        let rundir = self.get_rundir(index, expdir)?;
        let command = self.model.command(&params, &rundir)?;
        Ok(RunDescriptor {
            index,
            rundir,
            params,
            command,
        })
    }

    /// Validate `indices` and resolve every member's rundir and command.
    /// Nothing touches the filesystem, so this can run before [`setup`].
    ///
    /// [`setup`]: RunPlanner::setup
    pub fn plan(&self, indices: &[MemberIndex], expdir: &Path) -> Result<Vec<RunDescriptor>> {
        self.validate_indices(indices)?;
        indices.iter().map(|&i| self.get_model(i, expdir)).collect()
    }

    /// Create the run directory and let the model write its inputs.
    fn ready(&self, run: &RunDescriptor, outcome: &mut MemberOutcome) -> bool {
        let prepared = std::fs::create_dir_all(&run.rundir)
            .map_err(|e| EnsembleError::io(&run.rundir, e))
            .and_then(|()| self.model.prepare(&run.params, &run.rundir));
        match prepared {
            Ok(()) => {
                outcome.stage = MemberStage::DirectoryReady;
                true
            }
            Err(e) => {
                outcome.fail(e, None);
                false
            }
        }
    }

    /// Run members locally. Foreground members are complete when this
    /// returns, background members once [`RunHandle::wait`] returns.
    pub fn run(&self, indices: &[MemberIndex], expdir: &Path, executor: &Executor) -> Result<RunHandle> {
        Ok(self.run_planned(self.plan(indices, expdir)?, executor))
    }

    /// [`run`](RunPlanner::run) for members already resolved by [`plan`](RunPlanner::plan).
    pub fn run_planned(&self, runs: Vec<RunDescriptor>, executor: &Executor) -> RunHandle {
        let dry = executor.mode() == crate::executor::ExecMode::DryRun;
        let mut handle = RunHandle::default();

        for run in runs {
            let mut outcome = MemberOutcome::new(run.index, run.rundir.clone(), run.command.render());
            if !dry && !self.ready(&run, &mut outcome) {
                handle.push(outcome, None);
                continue;
            }
            tracing::info!(member = %run.index, rundir = %run.rundir.display(), "dispatching");
            let child = match executor.execute(&run.command, &run.rundir) {
                Ok(Launched::Rendered(_)) => None,
                Ok(Launched::Exited { code, stderr }) => {
                    outcome.stage = MemberStage::Dispatched;
                    outcome.exit_code = code;
                    if code == Some(0) {
                        outcome.stage = MemberStage::Completed;
                    } else {
                        let status = code.map_or_else(|| "a signal".to_string(), |c| format!("exit code {c}"));
                        outcome.fail(format!("model terminated with {status}"), Some(stderr));
                    }
                    None
                }
                Ok(Launched::Detached(child)) => {
                    outcome.stage = MemberStage::Dispatched;
                    Some(child)
                }
                Err(e) => {
                    outcome.fail(e, None);
                    None
                }
            };
            handle.push(outcome, child);
        }
        handle
    }

    /// Submit one job per member. A job script that cannot be written aborts
    /// the remaining submissions; every other failure is recorded per member.
    pub fn submit(
        &self,
        indices: &[MemberIndex],
        expdir: &Path,
        backend: &dyn SchedulerBackend,
        resources: &Resources,
    ) -> Result<SubmitHandle> {
        self.submit_planned(self.plan(indices, expdir)?, backend, resources)
    }

    pub fn submit_planned(
        &self,
        runs: Vec<RunDescriptor>,
        backend: &dyn SchedulerBackend,
        resources: &Resources,
    ) -> Result<SubmitHandle> {
        let mut handle = SubmitHandle::default();

        for run in runs {
            let mut outcome = MemberOutcome::new(run.index, run.rundir.clone(), run.command.render());
            if !self.ready(&run, &mut outcome) {
                handle.push(outcome, None);
                continue;
            }
            let mut resources = resources.clone();
            if resources.job_name.is_none() {
                resources.job_name = Some(format!("member-{}", run.index));
            }
            let request = JobRequest {
                command: outcome.command.clone(),
                resources,
                output_path: run.rundir.join(LOG_OUT),
                error_path: run.rundir.join(LOG_ERR),
                script_path: run.rundir.join(JOB_SCRIPT),
            };
            match backend.submit_request(&request) {
                Ok(id) => {
                    outcome.stage = MemberStage::Dispatched;
                    handle.push(outcome, Some(id));
                }
                Err(e) if e.kind() == ErrorKind::Io => {
                    let submitted: Vec<String> = handle.job_ids().iter().map(|id| id.to_string()).collect();
                    tracing::error!(member = %run.index, ?submitted, "cannot write job script, aborting submission");
                    return Err(e);
                }
                Err(e) => {
                    let stderr = match &e {
                        EnsembleError::SubmissionFailure { stderr, .. } => Some(stderr.clone()),
                        _ => None,
                    };
                    outcome.fail(e, stderr);
                    handle.push(outcome, None);
                }
            }
        }
        Ok(handle)
    }
}

fn is_non_empty_dir(path: &Path) -> Result<bool> {
    if !path.exists() {
        return Ok(false);
    }
    let mut entries = std::fs::read_dir(path).map_err(|e| EnsembleError::io(path, e))?;
    Ok(entries.next().is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CommandTemplate;
    use crate::param::ParameterSpace;

    fn table() -> EnsembleTable {
        ParameterSpace::parse(&["a=2,3,4", "b=0,1"]).unwrap().product().unwrap()
    }

    fn planner() -> RunPlanner {
        RunPlanner::new(
            Box::new(CommandTemplate::new("echo").out_prefix("--out ").param_prefix("--{} ")),
            table(),
        )
    }

    #[test]
    fn sequential_and_default_rundirs() {
        let p = planner();
        let exp = Path::new("out");
        assert_eq!(p.get_rundir(MemberIndex::Member(5), exp).unwrap(), PathBuf::from("out/5"));
        assert_eq!(p.get_rundir(MemberIndex::Default, exp).unwrap(), PathBuf::from("out/default"));
    }

    #[test]
    fn auto_named_rundirs() {
        let p = planner().with_layout(DirLayout::AutoNamed);
        let dir = p.get_rundir(MemberIndex::Member(2), Path::new("out")).unwrap();
        assert_eq!(dir, PathBuf::from("out/a.3.b.0"));
        assert_eq!(
            p.get_rundir(MemberIndex::Default, Path::new("out")).unwrap(),
            PathBuf::from("out/default")
        );
    }

    #[test]
    fn get_model_binds_row_values() {
        let run = planner().get_model(MemberIndex::Member(2), Path::new("out")).unwrap();
        assert_eq!(run.params, vec![("a".to_string(), 3.0), ("b".to_string(), 0.0)]);
        assert_eq!(run.command.render(), "echo --out out/2 --a 3 --b 0");

        let default = planner().get_model(MemberIndex::Default, Path::new("out")).unwrap();
        assert!(default.params.is_empty());
        assert_eq!(default.command.render(), "echo --out out/default");
    }

    #[test]
    fn out_of_range_fails_before_side_effects() {
        let dir = tempfile::tempdir().unwrap();
        let exp = dir.path().join("exp");
        let err = planner()
            .run(
                &[MemberIndex::Member(0), MemberIndex::Member(6)],
                &exp,
                &Executor::default(),
            )
            .unwrap_err();
        assert!(matches!(err, EnsembleError::IndexOutOfRange { index: 6, size: 6 }));
        assert!(!exp.exists());
    }

    #[test]
    fn setup_refuses_non_empty_dir_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let params = dir.path().join(PARAMS_FILE);
        std::fs::write(&params, "z\n9\n").unwrap();
        let p = planner();
        let err = p.setup(dir.path(), false).unwrap_err();
        assert!(matches!(err, EnsembleError::DirectoryExists { .. }));
        assert_eq!(std::fs::read_to_string(&params).unwrap(), "z\n9\n");

        p.setup(dir.path(), true).unwrap();
        let back = EnsembleTable::read(&params).unwrap();
        assert_eq!(back, table());
        assert_eq!(back.names(), ["a", "b"]);
    }

    #[test]
    fn plan_resolves_without_touching_disk() {
        let dir = tempfile::tempdir().unwrap();
        let exp = dir.path().join("exp");
        let runs = planner()
            .plan(&[MemberIndex::Member(2), MemberIndex::Default], &exp)
            .unwrap();
        assert_eq!(runs[0].rundir, exp.join("2"));
        assert_eq!(runs[1].rundir, exp.join(DEFAULT_RUNDIR));

        let unbound = RunPlanner::new(Box::new(CommandTemplate::new("echo").args("{c}")), table());
        let err = unbound.plan(&[MemberIndex::Member(0)], &exp).unwrap_err();
        assert!(matches!(err, EnsembleError::Template(_)));
        assert!(!exp.exists());
    }

    #[test]
    fn auto_name_collisions_are_rejected() {
        let t = EnsembleTable::new(vec!["a".into()], vec![vec![1.0], vec![1.0]]).unwrap();
        let p = RunPlanner::new(Box::new(CommandTemplate::new("echo")), t).with_layout(DirLayout::AutoNamed);
        let dir = tempfile::tempdir().unwrap();
        let err = p.setup(&dir.path().join("exp"), false).unwrap_err();
        assert!(matches!(err, EnsembleError::RundirCollision { first: 0, second: 1, .. }));
    }

    #[test]
    fn foreground_failure_is_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let model = CommandTemplate::new("test").args("{a} = 0");
        let t = EnsembleTable::new(vec!["a".into()], vec![vec![0.0], vec![1.0], vec![0.0]]).unwrap();
        let p = RunPlanner::new(Box::new(model), t);
        let handle = p
            .run(
                &[MemberIndex::Member(0), MemberIndex::Member(1), MemberIndex::Member(2)],
                dir.path(),
                &Executor::default(),
            )
            .unwrap();
        let stages: Vec<MemberStage> = handle.outcomes().map(|o| o.stage).collect();
        assert_eq!(
            stages,
            [MemberStage::Completed, MemberStage::Failed, MemberStage::Completed]
        );
        assert_eq!(handle.failures()[0].failed_at, Some(MemberStage::Dispatched));
    }
}
