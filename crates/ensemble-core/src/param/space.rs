use super::lhs::{self, Criterion, DEFAULT_ITERATIONS};
use super::{Distribution, Parameter};
use crate::errors::{EnsembleError, Result};
use crate::table::EnsembleTable;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::HashSet;
use std::str::FromStr;

/// How `ParameterSpace::sample` turns distributions into a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SamplingMethod {
    Lhs {
        criterion: Criterion,
        iterations: usize,
    },
    MonteCarlo,
}

impl Default for SamplingMethod {
    fn default() -> Self {
        Self::Lhs {
            criterion: Criterion::default(),
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl SamplingMethod {
    pub fn lhs(criterion: Criterion, iterations: usize) -> Self {
        Self::Lhs {
            criterion,
            iterations,
        }
    }
}

impl FromStr for SamplingMethod {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "lhs" => Ok(Self::default()),
            "montecarlo" => Ok(Self::MonteCarlo),
            other => Err(EnsembleError::UnsupportedMethod(format!(
                "sampling method {other}"
            ))),
        }
    }
}

/// Ordered collection of uniquely named parameters. Order defines the column
/// order of every table built from the space.
#[derive(Debug, Clone, Default)]
pub struct ParameterSpace {
    params: Vec<Parameter>,
}

impl ParameterSpace {
    pub fn new(params: Vec<Parameter>) -> Result<Self> {
        let mut seen = HashSet::new();
        for p in &params {
            if !seen.insert(p.name.as_str()) {
                return Err(EnsembleError::DuplicateParameter(p.name.clone()));
            }
        }
        Ok(Self { params })
    }

    /// Parse a list of `NAME=SPEC` strings.
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        let params = specs
            .iter()
            .map(|s| Parameter::parse(s.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(params)
    }

    pub fn names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.params.iter().find(|p| p.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.params.iter()
    }

    /// Full factorial design. The first parameter is the outermost loop and the
    /// last one varies fastest.
    pub fn product(&self) -> Result<EnsembleTable> {
        let mut sets: Vec<&[f64]> = Vec::with_capacity(self.params.len());
        for p in &self.params {
            match &p.distribution {
                Some(Distribution::Discrete(values)) => sets.push(values),
                _ => {
                    return Err(EnsembleError::NotDiscrete {
                        name: p.name.clone(),
                    })
                }
            }
        }

        let mut rows: Vec<Vec<f64>> = Vec::new();
        if !sets.is_empty() {
            let total: usize = sets.iter().map(|s| s.len()).product();
            rows.reserve(total);
            let mut cursor = vec![0usize; sets.len()];
            for _ in 0..total {
                rows.push(cursor.iter().zip(&sets).map(|(&i, s)| s[i]).collect());
                // odometer, last position first
                for pos in (0..cursor.len()).rev() {
                    cursor[pos] += 1;
                    if cursor[pos] < sets[pos].len() {
                        break;
                    }
                    cursor[pos] = 0;
                }
            }
        }
        EnsembleTable::new(self.names(), rows)
    }

    pub fn sample(
        &self,
        size: usize,
        seed: Option<u64>,
        method: SamplingMethod,
    ) -> Result<EnsembleTable> {
        if self.params.is_empty() && size > 0 {
            return Err(EnsembleError::Parse(
                "cannot sample from an empty parameter space".into(),
            ));
        }
        let dists = self.distributions()?;
        tracing::debug!(
            size,
            ?seed,
            ?method,
            params = self.params.len(),
            "sampling parameter space"
        );
        match method {
            SamplingMethod::MonteCarlo => self.sample_montecarlo(&dists, size, seed),
            SamplingMethod::Lhs {
                criterion,
                iterations,
            } => self.sample_lhs(&dists, size, seed, criterion, iterations),
        }
    }

    fn distributions(&self) -> Result<Vec<&Distribution>> {
        self.params
            .iter()
            .map(|p| {
                p.distribution
                    .as_ref()
                    .ok_or_else(|| EnsembleError::NotSampleable {
                        name: p.name.clone(),
                    })
            })
            .collect()
    }

    /// Independent draws per column. With a seed, column `i` is drawn from an
    /// RNG seeded with `seed + i`.
    fn sample_montecarlo(
        &self,
        dists: &[&Distribution],
        size: usize,
        seed: Option<u64>,
    ) -> Result<EnsembleTable> {
        let columns: Vec<Vec<f64>> = dists
            .iter()
            .enumerate()
            .map(|(i, dist)| {
                let mut rng = rng_for(seed.map(|s| s.wrapping_add(i as u64)));
                dist.sample(size, &mut rng)
            })
            .collect();
        let rows: Vec<Vec<f64>> = (0..size)
            .map(|r| columns.iter().map(|c| c[r]).collect())
            .collect();
        EnsembleTable::new(self.names(), rows)
    }

    fn sample_lhs(
        &self,
        dists: &[&Distribution],
        size: usize,
        seed: Option<u64>,
        criterion: Criterion,
        iterations: usize,
    ) -> Result<EnsembleTable> {
        let mut rng = rng_for(seed);
        let unit = lhs::design(dists.len(), size, criterion, iterations, &mut rng);
        let rows: Vec<Vec<f64>> = unit
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .zip(dists)
                    .map(|(q, dist)| dist.quantile(q))
                    .collect()
            })
            .collect();
        EnsembleTable::new(self.names(), rows)
    }
}

fn rng_for(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
