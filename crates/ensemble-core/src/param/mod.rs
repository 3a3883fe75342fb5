//! Parameters as random variables, and the spaces they span.

pub mod distribution;
pub mod lhs;
pub mod space;

pub use distribution::{ContinuousDist, ContinuousKind, Distribution};
pub use lhs::{Criterion, DEFAULT_CRITERION, DEFAULT_ITERATIONS};
pub use space::{ParameterSpace, SamplingMethod};

use crate::errors::{EnsembleError, Result};
use std::fmt;
use std::str::FromStr;

/// A named random variable: a discrete value set or a continuous
/// distribution, with an optional default value.
#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub distribution: Option<Distribution>,
    pub default: Option<f64>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, distribution: Distribution) -> Self {
        Self {
            name: name.into(),
            distribution: Some(distribution),
            default: None,
        }
    }

    /// Parameter that is never sampled and only carries a default.
    pub fn fixed(name: impl Into<String>, default: f64) -> Self {
        Self {
            name: name.into(),
            distribution: None,
            default: Some(default),
        }
    }

    pub fn with_default(mut self, default: f64) -> Self {
        self.default = Some(default);
        self
    }

    /// Parse `NAME=SPEC[!DEFAULT]`.
    ///
    /// SPEC is a comma-separated list `VALUE[,VALUE...]`, a range
    /// `START:STOP:N` (N evenly spaced values, both ends included), or a
    /// continuous distribution `TYPE?ARG,ARG[,ARG]` with TYPE one of
    /// `U` (min,max), `N` (mean,sd), `LN` (mu,sigma), `T` (min,mode,max).
    pub fn parse(s: &str) -> Result<Self> {
        let (name, spec) = s
            .split_once('=')
            .ok_or_else(|| EnsembleError::Parse(format!("expected NAME=SPEC, got: {s}")))?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(EnsembleError::Parse(format!("invalid parameter name in: {s}")));
        }

        let (spec, default) = match spec.split_once('!') {
            Some((spec, default)) => (spec, Some(parse_number(default)?)),
            None => (spec, None),
        };

        let distribution = parse_distribution(spec.trim())?;
        Ok(Self {
            name: name.to_string(),
            distribution: Some(distribution),
            default,
        })
    }

    pub fn is_discrete(&self) -> bool {
        self.distribution.as_ref().is_some_and(Distribution::is_discrete)
    }
}

impl PartialEq for Parameter {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl FromStr for Parameter {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.distribution, self.default) {
            (Some(dist), Some(default)) => write!(f, "{}={}!{}", self.name, dist, default),
            (Some(dist), None) => write!(f, "{}={}", self.name, dist),
            (None, Some(default)) => write!(f, "{}={}", self.name, default),
            (None, None) => write!(f, "{}", self.name),
        }
    }
}

fn parse_distribution(spec: &str) -> Result<Distribution> {
    if let Some((kind, args)) = spec.split_once('?') {
        let kind = ContinuousKind::parse(kind.trim())?;
        let params = parse_list(args)?;
        return Ok(Distribution::Continuous(ContinuousDist::new(kind, params)?));
    }
    if spec.contains(':') {
        return Distribution::discrete(parse_range(spec)?);
    }
    Distribution::discrete(parse_list(spec)?)
}

fn parse_number(s: &str) -> Result<f64> {
    s.trim()
        .parse::<f64>()
        .map_err(|_| EnsembleError::Parse(format!("not a number: {s:?}")))
}

fn parse_list(s: &str) -> Result<Vec<f64>> {
    s.split(',').map(parse_number).collect()
}

/// `START:STOP:N` as N evenly spaced values, both ends included.
fn parse_range(s: &str) -> Result<Vec<f64>> {
    let parts: Vec<&str> = s.split(':').collect();
    let [start, stop, n] = parts.as_slice() else {
        return Err(EnsembleError::Parse(format!(
            "expected START:STOP:N, got: {s}"
        )));
    };
    let start = parse_number(start)?;
    let stop = parse_number(stop)?;
    let n: usize = n
        .trim()
        .parse()
        .map_err(|_| EnsembleError::Parse(format!("invalid number of values in range: {s}")))?;
    match n {
        0 => Err(EnsembleError::Parse(format!("empty range: {s}"))),
        1 => Ok(vec![start]),
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            Ok((0..n)
                .map(|i| if i == n - 1 { stop } else { start + step * i as f64 })
                .collect())
        }
    }
}
