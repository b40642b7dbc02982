use crate::error::Result;

/// Hard clustering of in-memory points (one label per point).
pub trait Clustering {
    /// Fit on `data` and return the nearest-cluster label of every point.
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>>;

    /// The configured number of clusters.
    fn n_clusters(&self) -> usize;
}
