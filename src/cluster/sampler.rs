//! Oversampled candidate draw for k-means|| seeding.
//!
//! Each row is kept with probability `min(1, l * d / phi)`, where `d` is its
//! squared distance to the nearest current centroid, `phi` the total of those
//! distances and `l` the oversampling factor. One uniform draw per row decides,
//! compared as `l * d > u * phi` so no division happens.
//!
//! Every partition draws from its own generator seeded with
//! [`partition_seed`], so the sample depends only on the seed and the data,
//! not on scheduling or thread count. Each seeding round passes its own
//! [`round_seed`], so a row gets a fresh draw every round.

use std::ops::Range;

use rand::prelude::*;

use super::distance::min_sqr;
use super::normalize::Normalizer;
use crate::frame::Frame;
use crate::task::MapReduce;

/// Sampler seed for seeding round `round` (0-based).
#[inline]
pub fn round_seed(seed: u64, round: usize) -> u64 {
    // Golden-ratio stride between rounds.
    seed ^ (round as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// Seed of the generator used for the partition starting at `start_row`.
#[inline]
pub fn partition_seed(seed: u64, start_row: usize) -> u64 {
    seed.wrapping_add(start_row as u64)
}

/// Rows picked by the sampler, as `(row, normalized values)`.
#[derive(Debug, Clone, Default)]
pub struct Sampled {
    pub rows: Vec<(usize, Vec<f64>)>,
}

impl Sampled {
    /// Concatenate two samples.
    pub fn combine(mut self, mut other: Self) -> Self {
        if self.rows.is_empty() {
            return other;
        }
        self.rows.append(&mut other.rows);
        self
    }

    /// Sampled points ordered by row number.
    pub fn into_points(mut self) -> Vec<Vec<f64>> {
        self.rows.sort_unstable_by_key(|(row, _)| *row);
        self.rows.into_iter().map(|(_, v)| v).collect()
    }
}

/// Map/reduce pass drawing new seeding candidates.
pub struct SamplerTask<'a> {
    pub(crate) centroids: &'a [Vec<f64>],
    pub(crate) norm: &'a Normalizer,
    /// Total squared error of `centroids` over the frame.
    pub(crate) sqr: f64,
    /// Oversampling factor.
    pub(crate) probability: f64,
    pub(crate) seed: u64,
}

impl<'a> SamplerTask<'a> {
    pub fn new(
        centroids: &'a [Vec<f64>],
        norm: &'a Normalizer,
        sqr: f64,
        probability: f64,
        seed: u64,
    ) -> Self {
        Self {
            centroids,
            norm,
            sqr,
            probability,
            seed,
        }
    }
}

impl MapReduce for SamplerTask<'_> {
    type Output = Sampled;

    fn empty(&self) -> Sampled {
        Sampled::default()
    }

    fn map<F: Frame + ?Sized>(&self, frame: &F, rows: Range<usize>) -> Sampled {
        let mut rng = StdRng::seed_from_u64(partition_seed(self.seed, rows.start));
        let mut values = vec![0.0; frame.ncols()];
        let mut out = Vec::new();
        for row in rows {
            self.norm.row(frame, row, &mut values);
            let sqr = min_sqr(self.centroids, &values, self.centroids.len());
            if self.probability * sqr > rng.random::<f64>() * self.sqr {
                out.push((row, values.clone()));
            }
        }
        Sampled { rows: out }
    }

    fn reduce(&self, a: Sampled, b: Sampled) -> Sampled {
        a.combine(b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::sumsqr::SumSqrTask;
    use crate::frame::ColumnFrame;
    use crate::task;

    fn line(n: usize) -> ColumnFrame {
        let rows: Vec<Vec<f64>> = (0..n).map(|i| vec![i as f64, 0.0]).collect();
        ColumnFrame::from_rows(&rows).unwrap()
    }

    fn sample(frame: &ColumnFrame, seed: u64) -> Vec<Vec<f64>> {
        let norm = Normalizer::from_frame(frame, false);
        let centroids = vec![vec![0.0, 0.0]];
        let sqr = task::run(&SumSqrTask::new(&centroids, &norm), frame).sqr;
        let sampler = SamplerTask::new(&centroids, &norm, sqr, 6.0, seed);
        task::run(&sampler, frame).into_points()
    }

    #[test]
    fn same_seed_same_sample() {
        let frame = line(200).with_chunk_rows(16);
        assert_eq!(sample(&frame, 7), sample(&frame, 7));
    }

    #[test]
    fn rows_on_centroid_never_sampled() {
        let frame = line(200).with_chunk_rows(16);
        for seed in 0..20 {
            let picked = sample(&frame, seed);
            assert!(picked.iter().all(|p| p[0] != 0.0));
        }
    }

    #[test]
    fn expected_sample_size_tracks_factor() {
        // E[|sample|] <= l; with a long tail of small distances it's close to l.
        let frame = line(1000).with_chunk_rows(64);
        let total: usize = (0..200).map(|s| sample(&frame, s).len()).sum();
        let mean = total as f64 / 200.0;
        assert!(mean > 4.0 && mean < 7.0, "mean sample size {mean}");
    }

    #[test]
    fn rounds_draw_independently() {
        let frame = line(200).with_chunk_rows(16);
        assert_eq!(round_seed(7, 0), 7);
        let rounds: Vec<_> = (0..5).map(|r| sample(&frame, round_seed(7, r))).collect();
        assert_ne!(rounds[0], rounds[1]);
        assert_ne!(rounds[1], rounds[2]);
        assert_eq!(rounds[3], sample(&frame, round_seed(7, 3)));
    }

    #[test]
    fn seed_derivation_depends_on_offset() {
        assert_ne!(partition_seed(1, 0), partition_seed(1, 4096));
        assert_eq!(partition_seed(u64::MAX, 1), 0);
    }
}
