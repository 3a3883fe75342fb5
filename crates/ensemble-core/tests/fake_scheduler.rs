//! Submission against scheduler programs replaced by small shell scripts.

use ensemble_core::{
    backend_by_name, ArrayJobBuilder, CommandTemplate, EnsembleError, ExperimentConfig, JobId, MemberIndex,
    MemberStage, ParameterSpace, Resources, RunPlanner, SchedulerConfig,
};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

fn script(dir: &Path, name: &str, body: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path.to_string_lossy().into_owned()
}

fn slurm(bin: &Path, submit: &str, query: &str) -> SchedulerConfig {
    SchedulerConfig {
        backend: "slurm".into(),
        submit_program: Some(script(bin, "sbatch", submit)),
        query_program: Some(script(bin, "squeue", query)),
        user: Some("tester".into()),
        ..SchedulerConfig::default()
    }
}

fn backend_config(bin: &Path, backend: &str, submit: &str, query: &str) -> SchedulerConfig {
    SchedulerConfig {
        backend: backend.into(),
        submit_program: Some(script(bin, &format!("{backend}-submit"), submit)),
        query_program: Some(script(bin, &format!("{backend}-query"), query)),
        user: Some("tester".into()),
        ..SchedulerConfig::default()
    }
}

fn planner() -> RunPlanner {
    let table = ParameterSpace::parse(&["a=2,3"]).unwrap().product().unwrap();
    RunPlanner::new(Box::new(CommandTemplate::new("model.x").param_prefix("--{} ")), table)
}

fn exp(dir: &Path) -> PathBuf {
    dir.join("exp")
}

#[test]
fn submitted_jobs_are_verified_in_queue() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = slurm(dir.path(), "echo 'Submitted batch job 101'", "echo 101");
    let backend = backend_by_name(&cfg).unwrap();

    let handle = planner()
        .submit(&[MemberIndex::Member(1)], &exp(dir.path()), backend.as_ref(), &Resources::default())
        .unwrap();
    assert!(handle.failures().is_empty());
    assert_eq!(handle.job_ids().len(), 1);
    assert_eq!(handle.job_ids()[0].0, "101");

    let script = std::fs::read_to_string(exp(dir.path()).join("1").join("job.submit")).unwrap();
    assert!(script.contains("#SBATCH --job-name=member-1\n"));
    assert!(script.trim_end().ends_with("model.x --a 3"));
}

#[test]
fn non_zero_submit_is_recorded_with_stderr() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = slurm(dir.path(), "echo 'sbatch: error: invalid qos' >&2; exit 1", "true");
    let backend = backend_by_name(&cfg).unwrap();

    let handle = planner()
        .submit(
            &[MemberIndex::Member(0), MemberIndex::Member(1)],
            &exp(dir.path()),
            backend.as_ref(),
            &Resources::default(),
        )
        .unwrap();
    let failures = handle.failures();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0].failed_at, Some(MemberStage::DirectoryReady));
    assert_eq!(failures[0].stderr.as_deref(), Some("sbatch: error: invalid qos"));
}

#[test]
fn job_missing_from_queue_is_a_failure() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = slurm(dir.path(), "echo 202", "echo 999");
    let backend = backend_by_name(&cfg).unwrap();

    let handle = planner()
        .submit(&[MemberIndex::Member(0)], &exp(dir.path()), backend.as_ref(), &Resources::default())
        .unwrap();
    let failures = handle.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error.as_deref().unwrap().contains("does not appear"));
}

#[test]
fn wait_polls_until_queue_drains() {
    let dir = tempfile::tempdir().unwrap();
    let counter = dir.path().join("count");
    let query = format!(
        "n=$(cat {c} 2>/dev/null || echo 0); n=$((n+1)); echo $n > {c}; [ $n -le 2 ] && echo 303; exit 0",
        c = counter.display()
    );
    let cfg = slurm(dir.path(), "echo 303", &query);
    let backend = backend_by_name(&cfg).unwrap();

    let handle = planner()
        .submit(&[MemberIndex::Member(0)], &exp(dir.path()), backend.as_ref(), &Resources::default())
        .unwrap();
    let outcomes = handle.wait(backend.as_ref(), Duration::from_millis(10)).unwrap();
    assert_eq!(outcomes[0].stage, MemberStage::Completed);
    assert_eq!(std::fs::read_to_string(&counter).unwrap().trim(), "3");
}

#[test]
fn array_job_is_one_submission() {
    let dir = tempfile::tempdir().unwrap();
    let log = dir.path().join("submitted");
    let submit = format!("cp \"$1\" {}; echo 'Submitted batch job 404'", log.display());
    let cfg = slurm(dir.path(), &submit, "echo 404_0; echo 404_1");
    let backend = backend_by_name(&cfg).unwrap();

    let p = planner();
    let exp = exp(dir.path());
    p.setup(&exp, false).unwrap();
    let id = ArrayJobBuilder::new("ensemble", ExperimentConfig::default())
        .submit(p.table().size(), None, &exp, backend.as_ref(), &Resources::default())
        .unwrap();
    assert_eq!(id.0, "404");

    let script = std::fs::read_to_string(&log).unwrap();
    assert!(script.contains("#SBATCH --array=0-1\n"));
    assert!(script.contains("--id $SLURM_ARRAY_TASK_ID"));
}

#[test]
fn pbs_matches_truncated_server_names() {
    let dir = tempfile::tempdir().unwrap();
    let listing = "echo 'Job ID          Username Queue'; \
                   echo '--------------- -------- -----'; \
                   echo '4711.pbs01      tester   short'";
    let cfg = backend_config(dir.path(), "pbs", "echo 4711.pbs01.cluster.example", listing);
    let backend = backend_by_name(&cfg).unwrap();

    let handle = planner()
        .submit(&[MemberIndex::Member(0)], &exp(dir.path()), backend.as_ref(), &Resources::default())
        .unwrap();
    assert!(handle.failures().is_empty());
    assert_eq!(handle.job_ids()[0].0, "4711.pbs01.cluster.example");

    let script = std::fs::read_to_string(exp(dir.path()).join("0").join("job.submit")).unwrap();
    assert!(script.contains("#PBS -N member-0\n"));

    let other = backend_config(dir.path(), "pbs", "echo 47.pbs01", listing);
    let handle = planner()
        .submit(
            &[MemberIndex::Member(1)],
            &dir.path().join("other"),
            backend_by_name(&other).unwrap().as_ref(),
            &Resources::default(),
        )
        .unwrap();
    assert_eq!(handle.failures().len(), 1);
}

#[test]
fn loadleveler_empty_queue_means_not_enqueued() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = backend_config(
        dir.path(),
        "loadleveler",
        "echo 'llsubmit: The job \"node1.1234\" has been submitted.'",
        "echo 'llq: There is currently no job status to report.'",
    );
    let backend = backend_by_name(&cfg).unwrap();
    let handle = planner()
        .submit(&[MemberIndex::Member(0)], &exp(dir.path()), backend.as_ref(), &Resources::default())
        .unwrap();
    let failures = handle.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].error.as_deref().unwrap().contains("node1.1234"));

    let listed = backend_config(
        dir.path(),
        "loadleveler",
        "echo 'llsubmit: The job \"node1.1234\" has been submitted.'",
        "echo 'node1.1234.0   tester  10/18 09:12 I  50 medium'",
    );
    let backend = backend_by_name(&listed).unwrap();
    assert!(backend.is_enqueued(&JobId("node1.1234".into())).unwrap());
    assert!(!backend.is_enqueued(&JobId("node1.12".into())).unwrap());
}

#[test]
fn unknown_backend_fails_fast() {
    let cfg = SchedulerConfig {
        backend: "condor".into(),
        ..SchedulerConfig::default()
    };
    assert!(matches!(backend_by_name(&cfg), Err(EnsembleError::UnsupportedBackend(_))));
}
