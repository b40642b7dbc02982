//! One Lloyd refinement pass as a partitioned map/reduce.
//!
//! Each partition makes two passes over its rows. The first assigns every row
//! to its nearest centroid and accumulates per-cluster sums and counts plus
//! the total squared error. The second accumulates per-cluster, per-column
//! squared deviations from the partition-local means computed by the first.
//!
//! Partitions are merged with the pairwise update of Chan, Golub and LeVeque
//! (count, mean, M2), so merging many partitions doesn't suffer the
//! cancellation of a naive sum-of-squares formula.
//!
//! After imputation a column can only still be missing if it has no values at
//! all. Such a column keeps a NaN mean and contributes nothing to M2.

use std::ops::Range;

use super::distance::closest;
use super::normalize::Normalizer;
use crate::frame::Frame;
use crate::task::MapReduce;

/// Count, mean and sum of squared deviations of the rows of one cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterStats {
    pub rows: u64,
    pub mean: Vec<f64>,
    pub m2: Vec<f64>,
}

impl ClusterStats {
    /// Statistics of zero rows in `dims` dimensions.
    pub fn empty(dims: usize) -> Self {
        Self {
            rows: 0,
            mean: vec![0.0; dims],
            m2: vec![0.0; dims],
        }
    }

    /// Merge the statistics of a disjoint set of rows.
    pub fn combine(mut self, other: Self) -> Self {
        if other.rows == 0 {
            return self;
        }
        if self.rows == 0 {
            return other;
        }
        let na = self.rows as f64;
        let nb = other.rows as f64;
        let n = na + nb;
        for ((ma, m2a), (mb, m2b)) in self
            .mean
            .iter_mut()
            .zip(self.m2.iter_mut())
            .zip(other.mean.iter().zip(&other.m2))
        {
            let delta = mb - *ma;
            if delta.is_nan() {
                *ma = f64::NAN;
                *m2a += m2b;
                continue;
            }
            *ma += delta * nb / n;
            *m2a += m2b + delta * delta * na * nb / n;
        }
        self.rows += other.rows;
        self
    }

    /// Sum of squared deviations over all columns.
    pub fn variance(&self) -> f64 {
        self.m2.iter().sum()
    }
}

/// Partial result of a Lloyd pass.
#[derive(Debug, Clone, PartialEq)]
pub struct Lloyds {
    pub clusters: Vec<ClusterStats>,
    /// Total squared distance of every row to its nearest centroid.
    pub sqr: f64,
    /// Rows without any valid dimension.
    pub skipped: u64,
}

impl Lloyds {
    fn empty(k: usize, dims: usize) -> Self {
        Self {
            clusters: vec![ClusterStats::empty(dims); k],
            sqr: 0.0,
            skipped: 0,
        }
    }

    /// Merge two partial results.
    pub fn combine(mut self, other: Self) -> Self {
        self.clusters = self
            .clusters
            .into_iter()
            .zip(other.clusters)
            .map(|(a, b)| a.combine(b))
            .collect();
        self.sqr += other.sqr;
        self.skipped += other.skipped;
        self
    }

    /// New centroids (NaN for clusters that received no rows).
    pub fn centroids(&self) -> Vec<Vec<f64>> {
        self.clusters
            .iter()
            .map(|c| {
                if c.rows == 0 {
                    vec![f64::NAN; c.mean.len()]
                } else {
                    c.mean.clone()
                }
            })
            .collect()
    }

    /// Per-cluster sum of squared deviations.
    pub fn variances(&self) -> Vec<f64> {
        self.clusters.iter().map(ClusterStats::variance).collect()
    }

    /// Rows assigned to each cluster.
    pub fn sizes(&self) -> Vec<u64> {
        self.clusters.iter().map(|c| c.rows).collect()
    }

    /// Clusters that received no rows.
    pub fn empty_clusters(&self) -> Vec<usize> {
        self.clusters
            .iter()
            .enumerate()
            .filter(|(_, c)| c.rows == 0)
            .map(|(i, _)| i)
            .collect()
    }
}

/// Map/reduce pass producing [`Lloyds`] for `centroids`.
pub struct LloydsTask<'a> {
    pub(crate) centroids: &'a [Vec<f64>],
    pub(crate) norm: &'a Normalizer,
}

impl<'a> LloydsTask<'a> {
    /// `centroids` are in normalized space.
    pub fn new(centroids: &'a [Vec<f64>], norm: &'a Normalizer) -> Self {
        Self { centroids, norm }
    }

    fn dims(&self) -> usize {
        self.centroids.first().map_or(0, Vec::len)
    }
}

impl MapReduce for LloydsTask<'_> {
    type Output = Lloyds;

    fn empty(&self) -> Lloyds {
        Lloyds::empty(self.centroids.len(), self.dims())
    }

    fn map<F: Frame + ?Sized>(&self, frame: &F, rows: Range<usize>) -> Lloyds {
        let mut out = self.empty();
        let mut values = vec![0.0; self.dims()];
        let mut assigned = Vec::with_capacity(rows.len());

        for row in rows.clone() {
            self.norm.row(frame, row, &mut values);
            let cd = closest(self.centroids, &values);
            out.sqr += cd.dist;
            assigned.push(cd.cluster);
            let Some(clu) = cd.cluster else {
                out.skipped += 1;
                continue;
            };
            let stats = &mut out.clusters[clu];
            for (sum, &v) in stats.mean.iter_mut().zip(&values) {
                *sum += v;
            }
            stats.rows += 1;
        }
        for stats in out.clusters.iter_mut().filter(|c| c.rows > 0) {
            let n = stats.rows as f64;
            for m in &mut stats.mean {
                *m /= n;
            }
        }

        for (row, clu) in rows.zip(assigned) {
            let Some(clu) = clu else { continue };
            self.norm.row(frame, row, &mut values);
            let stats = &mut out.clusters[clu];
            for ((m2, &mean), &v) in stats.m2.iter_mut().zip(&stats.mean).zip(&values) {
                let delta = v - mean;
                if !delta.is_nan() {
                    *m2 += delta * delta;
                }
            }
        }
        out
    }

    fn reduce(&self, a: Lloyds, b: Lloyds) -> Lloyds {
        a.combine(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::ColumnFrame;
    use crate::task;

    fn stats_of(points: &[f64]) -> ClusterStats {
        let n = points.len() as f64;
        let mean = points.iter().sum::<f64>() / n;
        let m2 = points.iter().map(|x| (x - mean).powi(2)).sum();
        ClusterStats {
            rows: points.len() as u64,
            mean: vec![mean],
            m2: vec![m2],
        }
    }

    #[test]
    fn merge_matches_single_pass() {
        let all = [1.0e9 + 1.0, 1.0e9 + 2.0, 1.0e9 + 4.0, 1.0e9 + 7.0, 1.0e9 + 11.0];
        let merged = stats_of(&all[..2]).combine(stats_of(&all[2..]));
        let direct = stats_of(&all);
        assert_eq!(merged.rows, 5);
        assert!((merged.mean[0] - direct.mean[0]).abs() < 1e-6);
        assert!((merged.m2[0] - direct.m2[0]).abs() < 1e-6);
    }

    #[test]
    fn merge_with_empty_is_identity() {
        let s = stats_of(&[1.0, 3.0]);
        assert_eq!(s.clone().combine(ClusterStats::empty(1)), s);
        assert_eq!(ClusterStats::empty(1).combine(s.clone()), s);
    }

    #[test]
    fn pass_recomputes_means_and_variances() {
        let rows = vec![
            vec![0.0, 0.0],
            vec![0.0, 2.0],
            vec![10.0, 0.0],
            vec![10.0, 2.0],
            vec![10.0, 4.0],
        ];
        let frame = ColumnFrame::from_rows(&rows).unwrap().with_chunk_rows(2);
        let norm = Normalizer::from_frame(&frame, false);
        let centroids = vec![vec![1.0, 1.0], vec![9.0, 1.0]];
        let res = task::run(&LloydsTask::new(&centroids, &norm), &frame);

        assert_eq!(res.sizes(), vec![2, 3]);
        let c = res.centroids();
        assert!((c[0][0] - 0.0).abs() < 1e-12 && (c[0][1] - 1.0).abs() < 1e-12);
        assert!((c[1][0] - 10.0).abs() < 1e-12 && (c[1][1] - 2.0).abs() < 1e-12);
        let v = res.variances();
        assert!((v[0] - 2.0).abs() < 1e-12);
        assert!((v[1] - 8.0).abs() < 1e-12);
        // Errors against the input centroids: 2 + 2 + (2 + 2 + 10).
        assert!((res.sqr - 18.0).abs() < 1e-12);
        assert_eq!(res.skipped, 0);
    }

    #[test]
    fn empty_cluster_is_undefined() {
        let rows = vec![vec![0.0], vec![1.0]];
        let frame = ColumnFrame::from_rows(&rows).unwrap();
        let norm = Normalizer::from_frame(&frame, false);
        let centroids = vec![vec![0.5], vec![100.0]];
        let res = task::run(&LloydsTask::new(&centroids, &norm), &frame);
        assert_eq!(res.empty_clusters(), vec![1]);
        assert!(res.centroids()[1][0].is_nan());
        assert_eq!(res.variances()[1], 0.0);
    }

    #[test]
    fn rows_without_values_are_counted_not_assigned() {
        let rows = vec![vec![0.0, 0.0], vec![f64::NAN, f64::NAN], vec![1.0, 1.0]];
        let frame = ColumnFrame::from_rows(&rows).unwrap();
        // No column means to impute from.
        let norm = Normalizer::new(vec![f64::NAN, f64::NAN], None);
        let centroids = vec![vec![0.0, 0.0], vec![1.0, 1.0]];
        let res = task::run(&LloydsTask::new(&centroids, &norm), &frame);
        assert_eq!(res.skipped, 1);
        assert_eq!(res.sizes(), vec![1, 1]);
        assert_eq!(res.sqr, 0.0);
    }

    #[test]
    fn huge_rows_are_assigned_not_skipped() {
        let rows = vec![vec![0.0, 0.0], vec![1e200, 0.0], vec![1e200, 1.0], vec![1.0, 0.0]];
        let frame = ColumnFrame::from_rows(&rows).unwrap();
        let norm = Normalizer::from_frame(&frame, false);
        let centroids = vec![vec![0.0, 0.0], vec![1.0, 0.0]];
        let res = task::run(&LloydsTask::new(&centroids, &norm), &frame);

        assert_eq!(res.skipped, 0);
        assert_eq!(res.sizes(), vec![3, 1]);
        assert!(res.sqr.is_infinite());
        assert!(res.centroids()[0][0] > 1e199);
    }

    #[test]
    fn column_without_values_stays_undefined() {
        let rows: Vec<Vec<f64>> = (0..9)
            .map(|i| vec![if i < 5 { 0.0 } else { 10.0 } + (i % 2) as f64, f64::NAN])
            .collect();
        let frame = ColumnFrame::from_rows(&rows).unwrap().with_chunk_rows(4);
        let norm = Normalizer::from_frame(&frame, false);
        let centroids = vec![vec![0.0, f64::NAN], vec![10.0, f64::NAN]];
        let res = task::run(&LloydsTask::new(&centroids, &norm), &frame);

        assert_eq!(res.sizes(), vec![5, 4]);
        assert_eq!(res.skipped, 0);
        let c = res.centroids();
        assert!((c[0][0] - 0.4).abs() < 1e-12);
        assert!((c[1][0] - 10.5).abs() < 1e-12);
        assert!(c[0][1].is_nan() && c[1][1].is_nan());
        assert!(res.variances().iter().all(|v| v.is_finite()));
        assert!((res.variances()[0] - 1.2).abs() < 1e-12);
        assert!((res.variances()[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn partition_order_does_not_matter() {
        let rows: Vec<Vec<f64>> = (0..40)
            .map(|i| vec![(i % 7) as f64 * 1.3, (i % 5) as f64 * 0.7])
            .collect();
        let frame = ColumnFrame::from_rows(&rows).unwrap();
        let norm = Normalizer::from_frame(&frame, true);
        let centroids = vec![vec![-1.0, -1.0], vec![1.0, 1.0]];
        let task = LloydsTask::new(&centroids, &norm);

        let parts: Vec<Lloyds> = [0..13, 13..29, 29..40]
            .into_iter()
            .map(|r| task.map(&frame, r))
            .collect();
        let fwd = parts.iter().cloned().reduce(Lloyds::combine).unwrap();
        let rev = parts.into_iter().rev().reduce(Lloyds::combine).unwrap();
        let whole = task.map(&frame, 0..40);

        for res in [&fwd, &rev] {
            assert_eq!(res.sizes(), whole.sizes());
            assert!((res.sqr - whole.sqr).abs() < 1e-9);
            for (a, b) in res.centroids().iter().flatten().zip(whole.centroids().iter().flatten()) {
                assert!((a - b).abs() < 1e-9);
            }
            for (a, b) in res.variances().iter().zip(whole.variances()) {
                assert!((a - b).abs() < 1e-9);
            }
        }
    }
}
