//! Partitioned map/combine.
//!
//! A [`MapReduce`] task is mapped over every partition of a [`Frame`]
//! independently, and the per-partition accumulators are merged with an
//! associative `reduce`. Partitions never share mutable state; the task's own
//! fields are read-only inputs for the duration of a pass.
//!
//! With the `parallel` feature, partitions are mapped on the rayon pool and
//! combined by rayon's tree reduction (which keeps left-to-right order).
//! Without it, partitions are mapped in turn and combined by [`fan_in`].

use std::ops::Range;

use crate::frame::Frame;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// One map/reduce pass over a partitioned frame.
pub trait MapReduce: Sync {
    /// Per-partition accumulator.
    type Output: Send;

    /// Accumulator for an empty set of rows.
    fn empty(&self) -> Self::Output;

    /// Process the rows of a single partition.
    fn map<F: Frame + ?Sized>(&self, frame: &F, rows: Range<usize>) -> Self::Output;

    /// Merge two accumulators. Must be associative; `a` covers rows before `b`.
    fn reduce(&self, a: Self::Output, b: Self::Output) -> Self::Output;
}

/// Run `task` over every partition of `frame` and return the combined result.
pub fn run<T, F>(task: &T, frame: &F) -> T::Output
where
    T: MapReduce,
    F: Frame + ?Sized,
{
    let parts = frame.partitions();

    #[cfg(feature = "parallel")]
    {
        parts
            .into_par_iter()
            .map(|rows| task.map(frame, rows))
            .reduce(|| task.empty(), |a, b| task.reduce(a, b))
    }

    #[cfg(not(feature = "parallel"))]
    {
        let mapped: Vec<T::Output> = parts.into_iter().map(|rows| task.map(frame, rows)).collect();
        fan_in(mapped, |a, b| task.reduce(a, b)).unwrap_or_else(|| task.empty())
    }
}

/// Pairwise tree reduction: adjacent accumulators are merged level by level
/// until one remains. Order of operands is preserved.
pub fn fan_in<T>(mut level: Vec<T>, mut combine: impl FnMut(T, T) -> T) -> Option<T> {
    while level.len() > 1 {
        let mut next = Vec::with_capacity(level.len().div_ceil(2));
        let mut it = level.into_iter();
        while let Some(a) = it.next() {
            match it.next() {
                Some(b) => next.push(combine(a, b)),
                None => next.push(a),
            }
        }
        level = next;
    }
    level.pop()
}
