use crate::cli::args::SampleArgs;
use super::emit_table;
use crate::exit_codes;
use ensemble_core::param::Criterion;
use ensemble_core::{ParameterSpace, SamplingMethod};

pub fn run(args: SampleArgs) -> anyhow::Result<i32> {
    let method = sampling_method(&args)?;
    let table = ParameterSpace::parse(&args.params)?.sample(args.size, args.seed, method)?;
    emit_table(&table, args.out.as_deref())?;
    Ok(exit_codes::SUCCESS)
}

fn sampling_method(args: &SampleArgs) -> anyhow::Result<SamplingMethod> {
    let method: SamplingMethod = args.method.parse()?;
    Ok(match method {
        SamplingMethod::Lhs { criterion, iterations } => SamplingMethod::Lhs {
            criterion: match &args.criterion {
                Some(c) => c.parse::<Criterion>()?,
                None => criterion,
            },
            iterations: args.iterations.unwrap_or(iterations),
        },
        SamplingMethod::MonteCarlo => {
            if args.criterion.is_some() || args.iterations.is_some() {
                tracing::warn!("--criterion and --iterations only apply to --method lhs");
            }
            SamplingMethod::MonteCarlo
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ensemble_core::param::DEFAULT_ITERATIONS;

    fn args(method: &str, criterion: Option<&str>) -> SampleArgs {
        SampleArgs {
            params: vec!["a=U?0,1".into()],
            size: 4,
            seed: Some(1),
            method: method.into(),
            criterion: criterion.map(str::to_string),
            iterations: None,
            out: None,
        }
    }

    #[test]
    fn criterion_flag_overrides_default() {
        let m = sampling_method(&args("lhs", Some("maximin"))).unwrap();
        assert_eq!(
            m,
            SamplingMethod::Lhs {
                criterion: Criterion::Maximin,
                iterations: DEFAULT_ITERATIONS
            }
        );
        assert!(sampling_method(&args("lhs", Some("random"))).is_err());
        assert!(sampling_method(&args("sobol", None)).is_err());
    }
}
