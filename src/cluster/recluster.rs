//! Reduce an oversampled candidate pool to exactly `k` centroids.
//!
//! The first candidate seeds the result. Each further centroid is chosen by
//! its squared distance to the nearest centroid picked so far:
//!
//! - [`Recluster::PlusPlus`]: one roulette-wheel draw, probability
//!   proportional to that distance (k-means++).
//! - [`Recluster::Furthest`]: the candidate with the largest distance
//!   (deterministic; ties go to the lowest index).

use std::fmt;
use std::str::FromStr;

use rand::prelude::*;
use serde::{Deserialize, Serialize};

use super::distance::min_sqr;
use crate::error::{Error, Result};

/// Selection policy used to collapse the candidate pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recluster {
    /// Weighted random draw (k-means++).
    #[serde(alias = "kmeans++", alias = "k-means++")]
    PlusPlus,
    /// Farthest remaining candidate.
    #[serde(alias = "farthest")]
    Furthest,
}

impl Recluster {
    /// Pick `k` centroids out of `points`.
    ///
    /// `points` must be non-empty. With fewer distinct candidates than `k`,
    /// some centroids repeat.
    pub fn select<R: Rng + ?Sized>(
        self,
        points: &[Vec<f64>],
        k: usize,
        rng: &mut R,
    ) -> Result<Vec<Vec<f64>>> {
        let Some(first) = points.first() else {
            return Err(Error::EmptyInput);
        };
        let mut res = Vec::with_capacity(k);
        res.push(first.clone());

        let mut weights = vec![0.0; points.len()];
        while res.len() < k {
            let count = res.len();
            for (w, p) in weights.iter_mut().zip(points) {
                *w = min_sqr(&res, p, count);
            }
            let next = match self {
                Self::PlusPlus => roulette(&weights, rng),
                Self::Furthest => furthest(&weights),
            };
            res.push(points[next].clone());
        }
        Ok(res)
    }
}

/// Index drawn with probability proportional to `weights`.
fn roulette<R: Rng + ?Sized>(weights: &[f64], rng: &mut R) -> usize {
    let sum: f64 = weights.iter().sum();
    if sum.is_nan() || sum <= 0.0 {
        // Every candidate coincides with a chosen centroid.
        return rng.random_range(0..weights.len());
    }
    let threshold = rng.random::<f64>() * sum;
    let mut acc = 0.0;
    let mut last = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w <= 0.0 {
            continue;
        }
        acc += w;
        last = i;
        if acc > threshold {
            return i;
        }
    }
    last
}

fn furthest(weights: &[f64]) -> usize {
    let mut max = 0.0;
    let mut index = 0;
    for (i, &w) in weights.iter().enumerate() {
        if w > max {
            max = w;
            index = i;
        }
    }
    index
}

impl fmt::Display for Recluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PlusPlus => write!(f, "plusplus"),
            Self::Furthest => write!(f, "furthest"),
        }
    }
}

impl FromStr for Recluster {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "plusplus" | "kmeans++" | "k-means++" => Ok(Self::PlusPlus),
            "furthest" | "farthest" => Ok(Self::Furthest),
            other => Err(Error::invalid(
                "recluster",
                format!("unsupported policy '{other}'"),
            )),
        }
    }
}
