use crate::cli::args::ProductArgs;
use super::emit_table;
use crate::exit_codes;
use ensemble_core::ParameterSpace;

pub fn run(args: ProductArgs) -> anyhow::Result<i32> {
    let table = ParameterSpace::parse(&args.params)?.product()?;
    emit_table(&table, args.out.as_deref())?;
    Ok(exit_codes::SUCCESS)
}
