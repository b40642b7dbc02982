//! Total minimum squared distance of all rows to a centroid set.

use std::ops::Range;

use super::distance::min_sqr;
use super::normalize::Normalizer;
use crate::frame::Frame;
use crate::task::MapReduce;

/// Partial sum of squared distances.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SumSqr {
    /// Sum of each row's squared distance to its nearest centroid.
    pub sqr: f64,
}

impl SumSqr {
    /// Merge two partial sums.
    pub fn combine(self, other: Self) -> Self {
        Self {
            sqr: self.sqr + other.sqr,
        }
    }
}

/// Map/reduce pass computing [`SumSqr`] for `centroids`.
pub struct SumSqrTask<'a> {
    pub(crate) centroids: &'a [Vec<f64>],
    pub(crate) norm: &'a Normalizer,
}

impl<'a> SumSqrTask<'a> {
    /// `centroids` are in normalized space.
    pub fn new(centroids: &'a [Vec<f64>], norm: &'a Normalizer) -> Self {
        Self { centroids, norm }
    }
}

impl MapReduce for SumSqrTask<'_> {
    type Output = SumSqr;

    fn empty(&self) -> SumSqr {
        SumSqr::default()
    }

    fn map<F: Frame + ?Sized>(&self, frame: &F, rows: Range<usize>) -> SumSqr {
        let mut values = vec![0.0; frame.ncols()];
        let mut sqr = 0.0;
        for row in rows {
            self.norm.row(frame, row, &mut values);
            sqr += min_sqr(self.centroids, &values, self.centroids.len());
        }
        SumSqr { sqr }
    }

    fn reduce(&self, a: SumSqr, b: SumSqr) -> SumSqr {
        a.combine(b)
    }
}
