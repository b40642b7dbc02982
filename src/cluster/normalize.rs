//! Mean imputation and per-column z-scoring.

use crate::frame::Frame;

/// Columns whose standard deviation is at or below this are shifted but not scaled.
pub const MIN_SIGMA: f64 = 1e-6;

#[inline]
fn scaled(sigma: f64) -> bool {
    sigma > MIN_SIGMA
}

/// Maps raw frame values into the space the clustering runs in, and back.
///
/// Missing values are replaced by the column mean, whether or not
/// normalization is on. With normalization, each value becomes
/// `(x - mean) / sigma`, or `x - mean` for columns with `sigma <= MIN_SIGMA`.
/// A column with no values at all has a NaN mean and stays missing.
#[derive(Debug, Clone)]
pub struct Normalizer {
    means: Vec<f64>,
    sigmas: Option<Vec<f64>>,
}

impl Normalizer {
    /// Build from per-column statistics.
    pub fn new(means: Vec<f64>, sigmas: Option<Vec<f64>>) -> Self {
        if let Some(s) = &sigmas {
            debug_assert_eq!(s.len(), means.len());
        }
        Self { means, sigmas }
    }

    /// Read the statistics of every column of `frame`.
    pub fn from_frame<F: Frame + ?Sized>(frame: &F, normalize: bool) -> Self {
        let stats: Vec<_> = (0..frame.ncols()).map(|c| frame.stats(c)).collect();
        let means = stats.iter().map(|s| s.mean).collect();
        let sigmas = normalize.then(|| stats.iter().map(|s| s.sigma).collect());
        Self::new(means, sigmas)
    }

    /// Whether values are z-scored.
    pub fn normalizes(&self) -> bool {
        self.sigmas.is_some()
    }

    /// Transform a single raw value of column `col`.
    #[inline]
    pub fn value(&self, mut d: f64, col: usize) -> f64 {
        if d.is_nan() {
            d = self.means[col];
        }
        match &self.sigmas {
            Some(sigmas) => {
                d -= self.means[col];
                if scaled(sigmas[col]) {
                    d /= sigmas[col];
                }
                d
            }
            None => d,
        }
    }

    /// Read and transform one row of `frame` into `out`.
    #[inline]
    pub fn row<F: Frame + ?Sized>(&self, frame: &F, row: usize, out: &mut [f64]) {
        for (col, v) in out.iter_mut().enumerate() {
            *v = self.value(frame.at(row, col), col);
        }
    }

    /// Forward transform of a full vector (no imputation).
    pub fn normalize(&self, x: &[f64]) -> Vec<f64> {
        match &self.sigmas {
            Some(sigmas) => x
                .iter()
                .zip(self.means.iter().zip(sigmas))
                .map(|(&v, (&m, &s))| if scaled(s) { (v - m) / s } else { v - m })
                .collect(),
            None => x.to_vec(),
        }
    }

    /// Inverse transform, back to the original value space.
    pub fn denormalize(&self, z: &[f64]) -> Vec<f64> {
        match &self.sigmas {
            Some(sigmas) => z
                .iter()
                .zip(self.means.iter().zip(sigmas))
                .map(|(&v, (&m, &s))| if scaled(s) { v * s + m } else { v + m })
                .collect(),
            None => z.to_vec(),
        }
    }

    /// Inverse transform of a set of centroids.
    pub fn denormalize_all(&self, centroids: &[Vec<f64>]) -> Vec<Vec<f64>> {
        centroids.iter().map(|c| self.denormalize(c)).collect()
    }

    /// Forward transform of a set of centroids.
    pub fn normalize_all(&self, centroids: &[Vec<f64>]) -> Vec<Vec<f64>> {
        centroids.iter().map(|c| self.normalize(c)).collect()
    }
}
