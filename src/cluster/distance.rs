//! Nearest-centroid search with missing-dimension scaling.

/// Nearest cluster for one point and the squared distance to it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterDist {
    /// Index of the nearest centroid, or `None` when the point has no valid
    /// (non-NaN) dimension or no centroid was comparable.
    pub cluster: Option<usize>,
    /// Scaled squared distance to that centroid (0 when `cluster` is `None`).
    pub dist: f64,
}

/// Scaled squared distance between `point` and `centroid`.
///
/// Only dimensions where `point` is present contribute. With `p` of `D`
/// dimensions present and `0 < p < D`, the partial sum is scaled by `D / p`,
/// i.e. each missing dimension is assumed to contribute the average error of
/// the present ones. Returns `None` when `p == 0`.
#[inline]
pub fn scaled_sqr(centroid: &[f64], point: &[f64]) -> Option<f64> {
    debug_assert_eq!(centroid.len(), point.len());
    let mut sqr = 0.0;
    let mut valid = 0usize;
    for (&c, &x) in centroid.iter().zip(point) {
        if x.is_nan() {
            continue;
        }
        let delta = x - c;
        sqr += delta * delta;
        valid += 1;
    }
    let dims = point.len();
    match valid {
        0 => None,
        p if p < dims => Some(sqr * dims as f64 / p as f64),
        _ => Some(sqr),
    }
}

/// Find the nearest of the first `count` centroids.
///
/// Ties go to the lowest index. Centroids that are themselves undefined (NaN)
/// are skipped. An infinite distance still assigns the point.
pub fn closest_among(centroids: &[Vec<f64>], point: &[f64], count: usize) -> ClusterDist {
    let mut best: Option<(usize, f64)> = None;
    for (i, c) in centroids.iter().take(count).enumerate() {
        let Some(sqr) = scaled_sqr(c, point) else {
            // No valid dimension: same answer for every centroid.
            return ClusterDist {
                cluster: None,
                dist: 0.0,
            };
        };
        if sqr.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| sqr < b) {
            best = Some((i, sqr));
        }
    }
    match best {
        Some((i, sqr)) => ClusterDist {
            cluster: Some(i),
            dist: sqr,
        },
        None => ClusterDist {
            cluster: None,
            dist: 0.0,
        },
    }
}

/// Nearest of all `centroids`.
#[inline]
pub fn closest(centroids: &[Vec<f64>], point: &[f64]) -> ClusterDist {
    closest_among(centroids, point, centroids.len())
}

/// Squared distance to the nearest of the first `count` centroids.
#[inline]
pub fn min_sqr(centroids: &[Vec<f64>], point: &[f64], count: usize) -> f64 {
    closest_among(centroids, point, count).dist
}
