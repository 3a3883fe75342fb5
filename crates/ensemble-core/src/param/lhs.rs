//! Latin hypercube designs in the unit cube.
//!
//! Every column of a design of `n` points hits each of the `n` strata
//! `[k/n, (k+1)/n)` exactly once. The space-filling criteria pick the best of
//! several random candidates, so a design is reproducible for a fixed RNG
//! state, `n`, dimension, criterion and iteration count.

use crate::errors::{EnsembleError, Result};
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CRITERION: Criterion = Criterion::CenterMaximin;
pub const DEFAULT_ITERATIONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Criterion {
    /// Random point inside each stratum.
    Classic,
    /// Stratum midpoints.
    Center,
    /// Classic candidates, maximize the minimal pairwise distance.
    Maximin,
    /// Centered candidates, maximize the minimal pairwise distance.
    #[default]
    CenterMaximin,
    /// Classic candidates, minimize the maximal absolute column correlation.
    Correlation,
}

impl Criterion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Classic => "classic",
            Self::Center => "center",
            Self::Maximin => "maximin",
            Self::CenterMaximin => "centermaximin",
            Self::Correlation => "correlation",
        }
    }
}

impl FromStr for Criterion {
    type Err = EnsembleError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "classic" => Ok(Self::Classic),
            "center" | "c" => Ok(Self::Center),
            "maximin" | "m" => Ok(Self::Maximin),
            "centermaximin" | "cm" => Ok(Self::CenterMaximin),
            "correlation" | "corr" => Ok(Self::Correlation),
            other => Err(EnsembleError::UnsupportedMethod(format!(
                "lhs criterion {other}"
            ))),
        }
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Design of `samples` rows by `dims` columns, all values in `[0, 1)`.
pub fn design<R: Rng + ?Sized>(
    dims: usize,
    samples: usize,
    criterion: Criterion,
    iterations: usize,
    rng: &mut R,
) -> Vec<Vec<f64>> {
    let iterations = iterations.max(1);
    match criterion {
        Criterion::Classic => classic(dims, samples, rng),
        Criterion::Center => centered(dims, samples, rng),
        Criterion::Maximin => best_by(iterations, rng, |r| classic(dims, samples, r), min_distance),
        Criterion::CenterMaximin => {
            best_by(iterations, rng, |r| centered(dims, samples, r), min_distance)
        }
        Criterion::Correlation => best_by(
            iterations,
            rng,
            |r| classic(dims, samples, r),
            |d| -max_abs_correlation(d),
        ),
    }
}

fn classic<R: Rng + ?Sized>(dims: usize, samples: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = samples as f64;
    let columns: Vec<Vec<f64>> = (0..dims)
        .map(|_| {
            let mut col: Vec<f64> = (0..samples)
                .map(|k| (k as f64 + rng.gen::<f64>()) / n)
                .collect();
            col.shuffle(rng);
            col
        })
        .collect();
    transpose(&columns, samples)
}

fn centered<R: Rng + ?Sized>(dims: usize, samples: usize, rng: &mut R) -> Vec<Vec<f64>> {
    let n = samples as f64;
    let columns: Vec<Vec<f64>> = (0..dims)
        .map(|_| {
            let mut col: Vec<f64> = (0..samples).map(|k| (k as f64 + 0.5) / n).collect();
            col.shuffle(rng);
            col
        })
        .collect();
    transpose(&columns, samples)
}

/// Keep the candidate with the highest score; ties keep the earlier one.
fn best_by<R, G, S>(iterations: usize, rng: &mut R, mut generate: G, score: S) -> Vec<Vec<f64>>
where
    R: Rng + ?Sized,
    G: FnMut(&mut R) -> Vec<Vec<f64>>,
    S: Fn(&[Vec<f64>]) -> f64,
{
    let mut best = generate(rng);
    let mut best_score = score(&best);
    for _ in 1..iterations {
        let candidate = generate(rng);
        let s = score(&candidate);
        if s > best_score {
            best = candidate;
            best_score = s;
        }
    }
    best
}

fn transpose(columns: &[Vec<f64>], samples: usize) -> Vec<Vec<f64>> {
    (0..samples)
        .map(|i| columns.iter().map(|col| col[i]).collect())
        .collect()
}

fn min_distance(rows: &[Vec<f64>]) -> f64 {
    let mut min = f64::INFINITY;
    for (i, a) in rows.iter().enumerate() {
        for b in &rows[i + 1..] {
            let d = a
                .iter()
                .zip(b)
                .map(|(x, y)| (x - y) * (x - y))
                .sum::<f64>()
                .sqrt();
            min = min.min(d);
        }
    }
    min
}

fn max_abs_correlation(rows: &[Vec<f64>]) -> f64 {
    let dims = rows.first().map_or(0, Vec::len);
    let n = rows.len() as f64;
    if dims < 2 || rows.len() < 2 {
        return 0.0;
    }
    let column = |j: usize| rows.iter().map(move |r| r[j]);
    let means: Vec<f64> = (0..dims).map(|j| column(j).sum::<f64>() / n).collect();

    let mut max = 0.0f64;
    for a in 0..dims {
        for b in a + 1..dims {
            let (mut cov, mut va, mut vb) = (0.0, 0.0, 0.0);
            for r in rows {
                let (da, db) = (r[a] - means[a], r[b] - means[b]);
                cov += da * db;
                va += da * da;
                vb += db * db;
            }
            if va > 0.0 && vb > 0.0 {
                max = max.max((cov / (va * vb).sqrt()).abs());
            }
        }
    }
    max
}
