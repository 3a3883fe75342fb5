//! Discrete value sets and continuous distributions behind one small
//! capability surface: `sample` and `quantile`.

use crate::errors::{EnsembleError, Result};
use rand::Rng;
use statrs::distribution::{ContinuousCDF, LogNormal, Normal, Triangular, Uniform};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Distribution {
    /// Finite ordered set of values.
    Discrete(Vec<f64>),
    Continuous(ContinuousDist),
}

impl Distribution {
    pub fn discrete(values: Vec<f64>) -> Result<Self> {
        if values.is_empty() {
            return Err(EnsembleError::Parse("empty list of values".into()));
        }
        if values.iter().any(|v| v.is_nan()) {
            return Err(EnsembleError::Parse("NaN is not a valid parameter value".into()));
        }
        Ok(Self::Discrete(values))
    }

    pub fn is_discrete(&self) -> bool {
        matches!(self, Self::Discrete(_))
    }

    /// Draw `size` independent values.
    pub fn sample<R: Rng + ?Sized>(&self, size: usize, rng: &mut R) -> Vec<f64> {
        match self {
            Self::Discrete(values) => (0..size)
                .map(|_| values[rng.gen_range(0..values.len())])
                .collect(),
            Self::Continuous(dist) => (0..size).map(|_| dist.quantile(rng.gen::<f64>())).collect(),
        }
    }

    /// Inverse CDF. For discrete values this is the nearest-rank percentile over
    /// the sorted set, not a true continuous quantile.
    pub fn quantile(&self, q: f64) -> f64 {
        match self {
            Self::Discrete(values) => nearest_rank(values, q),
            Self::Continuous(dist) => dist.quantile(q),
        }
    }
}

impl fmt::Display for Distribution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discrete(values) => {
                let parts: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            Self::Continuous(dist) => write!(f, "{dist}"),
        }
    }
}

fn nearest_rank(values: &[f64], q: f64) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let last = sorted.len() - 1;
    let pos = (q.clamp(0.0, 1.0) * last as f64).round_ties_even() as usize;
    sorted[pos.min(last)]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuousKind {
    Uniform,
    Normal,
    LogNormal,
    Triangular,
}

impl ContinuousKind {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "U" | "uniform" => Ok(Self::Uniform),
            "N" | "norm" | "normal" => Ok(Self::Normal),
            "LN" | "lognorm" => Ok(Self::LogNormal),
            "T" | "triang" => Ok(Self::Triangular),
            other => Err(EnsembleError::Parse(format!(
                "unknown distribution type: {other} (expected U, N, LN or T)"
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uniform => "U",
            Self::Normal => "N",
            Self::LogNormal => "LN",
            Self::Triangular => "T",
        }
    }

    fn arity(&self) -> usize {
        match self {
            Self::Triangular => 3,
            _ => 2,
        }
    }
}

/// A validated continuous distribution, kept both as its textual parameters
/// and as the frozen `statrs` object used for quantiles.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousDist {
    kind: ContinuousKind,
    params: Vec<f64>,
    frozen: Frozen,
}

#[derive(Debug, Clone, PartialEq)]
enum Frozen {
    Uniform(Uniform),
    Normal(Normal),
    LogNormal(LogNormal),
    Triangular(Triangular),
}

impl ContinuousDist {
    /// `params` follow the command-line order: `U?min,max`, `N?mean,sd`,
    /// `LN?mu,sigma`, `T?min,mode,max`.
    pub fn new(kind: ContinuousKind, params: Vec<f64>) -> Result<Self> {
        if params.len() != kind.arity() {
            return Err(EnsembleError::Parse(format!(
                "{}?: expected {} arguments, got {}",
                kind.as_str(),
                kind.arity(),
                params.len()
            )));
        }
        let invalid = |e: &dyn fmt::Display| {
            EnsembleError::Parse(format!("{}?{}: {e}", kind.as_str(), join(&params)))
        };
        let frozen = match kind {
            ContinuousKind::Uniform => {
                Frozen::Uniform(Uniform::new(params[0], params[1]).map_err(|e| invalid(&e))?)
            }
            ContinuousKind::Normal => {
                Frozen::Normal(Normal::new(params[0], params[1]).map_err(|e| invalid(&e))?)
            }
            ContinuousKind::LogNormal => {
                Frozen::LogNormal(LogNormal::new(params[0], params[1]).map_err(|e| invalid(&e))?)
            }
            ContinuousKind::Triangular => Frozen::Triangular(
                Triangular::new(params[0], params[2], params[1]).map_err(|e| invalid(&e))?,
            ),
        };
        Ok(Self {
            kind,
            params,
            frozen,
        })
    }

    pub fn kind(&self) -> ContinuousKind {
        self.kind
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn quantile(&self, q: f64) -> f64 {
        match &self.frozen {
            Frozen::Uniform(d) => d.inverse_cdf(q),
            Frozen::Normal(d) => d.inverse_cdf(q),
            Frozen::LogNormal(d) => d.inverse_cdf(q),
            Frozen::Triangular(d) => d.inverse_cdf(q),
        }
    }
}

impl fmt::Display for ContinuousDist {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}?{}", self.kind.as_str(), join(&self.params))
    }
}

fn join(values: &[f64]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
