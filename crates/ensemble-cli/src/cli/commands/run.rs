use crate::cli::args::RunArgs;
use crate::exit_codes;
use anyhow::Context;
use ensemble_core::config::save_json;
use ensemble_core::indices::{batch, parse_indices};
use ensemble_core::{
    backend_by_name, ArrayJobBuilder, DirLayout, EnsembleTable, ExecMode, Executor, ExperimentConfig,
    MemberIndex, MemberOutcome, MemberStage, ParameterSpace, RunDescriptor, RunPlanner, SchedulerBackend,
};
use std::path::Path;

pub fn run(args: RunArgs, mut config: ExperimentConfig) -> anyhow::Result<i32> {
    apply_overrides(&args, &mut config)?;
    if let Some(path) = &args.save_wrapper {
        save_json(&config.model, path)?;
        eprintln!("saved model wrapper to {}", path.display());
    }

    let table = load_table(&args)?;
    let selection = args.id.as_deref().map(parse_indices).transpose()?;
    let include_default = args.include_default || table.width() == 0;
    let indices = batch(selection.as_deref(), table.size(), include_default);
    if indices.is_empty() {
        eprintln!("nothing to run: the ensemble has no members");
        return Ok(exit_codes::SUCCESS);
    }

    let layout = if config.auto_dir {
        DirLayout::AutoNamed
    } else {
        DirLayout::Sequential
    };
    let planner = RunPlanner::new(Box::new(config.model.clone()), table)
        .with_layout(layout)
        .with_config_writer(Box::new(config.clone()));
    let expdir = args.out_dir.as_path();

    if args.task {
        return run_task(&planner, &indices, expdir);
    }
    if args.echo {
        planner.run(&indices, expdir, &Executor::new(ExecMode::DryRun))?;
        return Ok(exit_codes::SUCCESS);
    }

    // Everything that can be rejected is rejected before setup writes to disk.
    let runs = planner.plan(&indices, expdir)?;
    let setup = || {
        planner
            .setup(expdir, args.force)
            .with_context(|| format!("setting up experiment in {}", expdir.display()))
    };

    if args.array {
        let backend = backend_by_name(&config.scheduler)?;
        let size = planner.table().size();
        let range = ArrayJobBuilder::range_for(backend.as_ref(), selection.as_deref(), size)?;
        setup()?;
        return submit_array(
            &planner,
            &config,
            selection.as_deref(),
            include_default,
            expdir,
            backend.as_ref(),
            &range,
        );
    }
    if args.submit {
        let backend = backend_by_name(&config.scheduler)?;
        setup()?;
        return submit_members(&planner, &config, runs, backend.as_ref(), args.wait);
    }

    setup()?;
    let mode = if args.test {
        ExecMode::Foreground
    } else {
        ExecMode::Background
    };
    let handle = planner.run_planned(runs, &Executor::new(mode));
    if mode == ExecMode::Background && !args.wait {
        let started = handle
            .outcomes()
            .filter(|o| o.stage == MemberStage::Dispatched)
            .count();
        eprintln!(
            "started {started} member(s) in the background, logs in {}/<rundir>/log.out",
            expdir.display()
        );
        let failures: Vec<MemberOutcome> = handle.failures().into_iter().cloned().collect();
        return Ok(report(&failures));
    }
    Ok(report(&handle.wait()))
}

fn apply_overrides(args: &RunArgs, config: &mut ExperimentConfig) -> anyhow::Result<()> {
    let model = &mut config.model;
    if let Some(executable) = &args.executable {
        model.executable.clone_from(executable);
    }
    if args.args.is_some() {
        model.args.clone_from(&args.args);
    }
    if args.arg_param_prefix.is_some() {
        model.param_prefix.clone_from(&args.arg_param_prefix);
    }
    if args.arg_out_prefix.is_some() {
        model.out_prefix.clone_from(&args.arg_out_prefix);
    }
    if args.file_name.is_some() {
        model.file_name.clone_from(&args.file_name);
    }
    if let Some(file_type) = &args.file_type {
        model.file_type = file_type.parse()?;
    }
    config.auto_dir |= args.auto_dir;

    let queue = &args.queue;
    if let Some(backend) = &queue.scheduler {
        config.scheduler.backend.clone_from(backend);
    }
    let resources = &mut config.resources;
    for (flag, slot) in [
        (&queue.qos, &mut resources.queue),
        (&queue.job_name, &mut resources.job_name),
        (&queue.account, &mut resources.account),
        (&queue.walltime, &mut resources.walltime),
    ] {
        if flag.is_some() {
            slot.clone_from(flag);
        }
    }
    Ok(())
}

fn load_table(args: &RunArgs) -> anyhow::Result<EnsembleTable> {
    if let Some(path) = &args.params_file {
        return Ok(EnsembleTable::read(path)?);
    }
    if args.params.is_empty() {
        return Ok(EnsembleTable::empty());
    }
    Ok(ParameterSpace::parse(&args.params)?.product()?)
}

/// One array task: the experiment is already set up by the submitting side.
fn run_task(planner: &RunPlanner, indices: &[MemberIndex], expdir: &Path) -> anyhow::Result<i32> {
    let handle = planner.run(indices, expdir, &Executor::new(ExecMode::Foreground))?;
    Ok(report(&handle.wait()))
}

fn submit_array(
    planner: &RunPlanner,
    config: &ExperimentConfig,
    selection: Option<&[usize]>,
    include_default: bool,
    expdir: &Path,
    backend: &dyn SchedulerBackend,
    range: &str,
) -> anyhow::Result<i32> {
    if include_default {
        tracing::warn!("the default member is not part of array jobs; run it with --include-default separately");
    }
    let program = std::env::current_exe()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|_| "ensemble".to_string());
    let id = ArrayJobBuilder::new(program, config.clone()).submit(
        planner.table().size(),
        selection,
        expdir,
        backend,
        &config.resources,
    )?;
    println!("✓ submitted array job {id} ({range})");
    Ok(exit_codes::SUCCESS)
}

fn submit_members(
    planner: &RunPlanner,
    config: &ExperimentConfig,
    runs: Vec<RunDescriptor>,
    backend: &dyn SchedulerBackend,
    wait: bool,
) -> anyhow::Result<i32> {
    let handle = planner.submit_planned(runs, backend, &config.resources)?;
    let ids = handle.job_ids();
    if !ids.is_empty() {
        let ids: Vec<String> = ids.iter().map(|id| id.to_string()).collect();
        println!("✓ submitted {} job(s) to {}: {}", ids.len(), backend.name(), ids.join(" "));
    }

    let failures: Vec<MemberOutcome> = handle.failures().into_iter().cloned().collect();
    if !failures.is_empty() {
        report(&failures);
        return Ok(exit_codes::SUBMISSION_FAILED);
    }
    if wait {
        handle.wait(backend, config.scheduler.poll_interval())?;
        eprintln!("all jobs left the queue");
    }
    Ok(exit_codes::SUCCESS)
}

/// Print failed members and pick the exit code.
fn report(outcomes: &[MemberOutcome]) -> i32 {
    let mut failed = 0;
    for outcome in outcomes.iter().filter(|o| o.is_failed()) {
        failed += 1;
        eprintln!(
            "✗ member {} ({}): {}",
            outcome.index,
            outcome.rundir.display(),
            outcome.error.as_deref().unwrap_or("failed")
        );
        if let Some(stderr) = &outcome.stderr {
            for line in stderr.lines() {
                eprintln!("    {line}");
            }
        }
    }
    if failed > 0 {
        eprintln!("{failed} member(s) failed");
        exit_codes::MEMBER_FAILED
    } else {
        exit_codes::SUCCESS
    }
}
