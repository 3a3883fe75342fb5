use super::args::*;
use anyhow::Context;
use ensemble_core::ExperimentConfig;

pub mod product;
pub mod run;
pub mod sample;

pub fn dispatch(cli: Cli) -> anyhow::Result<i32> {
    match cli.cmd {
        Command::Run(args) => {
            let config = match &cli.config {
                Some(path) => ExperimentConfig::load(path)
                    .with_context(|| format!("loading config {}", path.display()))?,
                None => ExperimentConfig::default(),
            };
            run::run(args, config)
        }
        Command::Sample(args) => sample::run(args),
        Command::Product(args) => product::run(args),
    }
}

/// Print a table to `out`, or to stdout when no file is given.
pub(crate) fn emit_table(
    table: &ensemble_core::EnsembleTable,
    out: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    match out {
        Some(path) => {
            table.write(path)?;
            eprintln!("wrote {} members to {}", table.size(), path.display());
        }
        None => print!("{}", table.to_text()),
    }
    Ok(())
}
