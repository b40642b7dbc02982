//! Column-partitioned numeric datasets.
//!
//! A [`Frame`] is an ordered set of named numeric columns whose rows are split
//! into disjoint partitions. Missing values are NaN. Every column exposes a
//! precomputed mean and standard deviation.
//!
//! [`ColumnFrame`] is the in-memory implementation used by the clustering
//! code's own tests and by [`Clustering::fit_predict`](crate::Clustering).
//! [`Select`] projects a subset of another frame's columns.

use std::ops::Range;

use crate::error::{Error, Result};

/// Default number of rows per partition for [`ColumnFrame`].
pub const DEFAULT_CHUNK_ROWS: usize = 4096;

/// Precomputed per-column statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColumnStats {
    /// Mean of the non-missing values (NaN if every value is missing).
    pub mean: f64,
    /// Sample standard deviation of the non-missing values.
    pub sigma: f64,
}

impl ColumnStats {
    /// Compute mean and sample standard deviation, skipping NaN.
    pub fn compute(values: &[f64]) -> Self {
        // Welford, so long columns don't lose precision.
        let mut n = 0u64;
        let mut mean = 0.0;
        let mut m2 = 0.0;
        for &v in values.iter().filter(|v| !v.is_nan()) {
            n += 1;
            let delta = v - mean;
            mean += delta / n as f64;
            m2 += delta * (v - mean);
        }
        match n {
            0 => Self {
                mean: f64::NAN,
                sigma: f64::NAN,
            },
            1 => Self { mean, sigma: 0.0 },
            _ => Self {
                mean,
                sigma: (m2 / (n - 1) as f64).sqrt(),
            },
        }
    }
}

/// Read access to a partitioned numeric dataset.
pub trait Frame: Sync {
    /// Column names, in column order.
    fn names(&self) -> &[String];

    /// Number of columns.
    fn ncols(&self) -> usize {
        self.names().len()
    }

    /// Number of rows.
    fn nrows(&self) -> usize;

    /// Precomputed statistics for one column.
    fn stats(&self, col: usize) -> ColumnStats;

    /// Value at `(row, col)`; NaN when missing.
    fn at(&self, row: usize, col: usize) -> f64;

    /// Disjoint row ranges covering `0..nrows()`, in row order.
    fn partitions(&self) -> Vec<Range<usize>>;
}

/// In-memory columnar frame.
#[derive(Debug, Clone)]
pub struct ColumnFrame {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
    stats: Vec<ColumnStats>,
    nrows: usize,
    chunk_rows: usize,
}

impl ColumnFrame {
    /// Build a frame from named columns of equal length.
    pub fn from_columns(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
        if names.len() != columns.len() {
            return Err(Error::DimensionMismatch {
                expected: names.len(),
                found: columns.len(),
            });
        }
        let nrows = columns.first().map_or(0, Vec::len);
        for col in &columns {
            if col.len() != nrows {
                return Err(Error::DimensionMismatch {
                    expected: nrows,
                    found: col.len(),
                });
            }
        }
        let stats = columns.iter().map(|c| ColumnStats::compute(c)).collect();
        Ok(Self {
            names,
            columns,
            stats,
            nrows,
            chunk_rows: DEFAULT_CHUNK_ROWS,
        })
    }

    /// Build a frame from row vectors; columns are named `C1`, `C2`, ...
    pub fn from_rows(rows: &[Vec<f64>]) -> Result<Self> {
        let d = match rows.first() {
            Some(r) => r.len(),
            None => return Err(Error::EmptyInput),
        };
        let mut columns = vec![Vec::with_capacity(rows.len()); d];
        for row in rows {
            if row.len() != d {
                return Err(Error::DimensionMismatch {
                    expected: d,
                    found: row.len(),
                });
            }
            for (col, &v) in columns.iter_mut().zip(row) {
                col.push(v);
            }
        }
        let names = (1..=d).map(|i| format!("C{i}")).collect();
        Self::from_columns(names, columns)
    }

    /// Set the number of rows per partition (at least 1).
    pub fn with_chunk_rows(mut self, chunk_rows: usize) -> Self {
        self.chunk_rows = chunk_rows.max(1);
        self
    }

    /// Raw column values.
    pub fn column(&self, col: usize) -> &[f64] {
        &self.columns[col]
    }
}

impl Frame for ColumnFrame {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn nrows(&self) -> usize {
        self.nrows
    }

    fn stats(&self, col: usize) -> ColumnStats {
        self.stats[col]
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        self.columns[col][row]
    }

    fn partitions(&self) -> Vec<Range<usize>> {
        (0..self.nrows)
            .step_by(self.chunk_rows)
            .map(|start| start..(start + self.chunk_rows).min(self.nrows))
            .collect()
    }
}

/// A column projection of another frame.
#[derive(Debug, Clone)]
pub struct Select<'a, F: ?Sized> {
    inner: &'a F,
    cols: Vec<usize>,
    names: Vec<String>,
}

impl<'a, F: Frame + ?Sized> Select<'a, F> {
    /// Select `cols` (in the given order) from `inner`.
    pub fn new(inner: &'a F, cols: &[usize]) -> Result<Self> {
        if cols.is_empty() {
            return Err(Error::invalid("cols", "must select at least one column"));
        }
        let all = inner.names();
        let mut names = Vec::with_capacity(cols.len());
        for &c in cols {
            match all.get(c) {
                Some(name) => names.push(name.clone()),
                None => {
                    return Err(Error::invalid(
                        "cols",
                        format!("column {c} out of range (frame has {})", all.len()),
                    ))
                }
            }
        }
        Ok(Self {
            inner,
            cols: cols.to_vec(),
            names,
        })
    }

    /// Select columns by name.
    pub fn by_name(inner: &'a F, names: &[&str]) -> Result<Self> {
        let all = inner.names();
        let mut cols = Vec::with_capacity(names.len());
        for name in names {
            match all.iter().position(|n| n == name) {
                Some(c) => cols.push(c),
                None => {
                    return Err(Error::invalid("cols", format!("no column named {name:?}")))
                }
            }
        }
        Self::new(inner, &cols)
    }
}

impl<F: Frame + ?Sized> Frame for Select<'_, F> {
    fn names(&self) -> &[String] {
        &self.names
    }

    fn nrows(&self) -> usize {
        self.inner.nrows()
    }

    fn stats(&self, col: usize) -> ColumnStats {
        self.inner.stats(self.cols[col])
    }

    #[inline]
    fn at(&self, row: usize, col: usize) -> f64 {
        self.inner.at(row, self.cols[col])
    }

    fn partitions(&self) -> Vec<Range<usize>> {
        self.inner.partitions()
    }
}
