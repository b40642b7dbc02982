//! Scalable k-means over partitioned data.
//!
//! The algorithm is split into components that each run as one map/reduce
//! pass over a [`Frame`](crate::Frame), plus the driver that sequences them:
//!
//! | Component | Role |
//! |---|---|
//! | [`distance`] | nearest centroid and scaled squared distance for one point |
//! | [`Normalizer`] | mean imputation and z-scoring, forward and inverse |
//! | [`SumSqrTask`] | total squared error of a centroid set |
//! | [`SamplerTask`] | oversampled candidate draw for k-means\|\| seeding |
//! | [`Recluster`] | collapse the candidate pool to exactly k centroids |
//! | [`LloydsTask`] | one assign-and-recompute refinement pass |
//! | [`Kmeans`] | configuration and the seeding/refinement state machine |
//!
//! ## Usage
//!
//! ```rust
//! use kmeans_par::{ColumnFrame, Initialization, Kmeans, Phase};
//!
//! let rows = vec![
//!     vec![0.0, 0.0],
//!     vec![0.1, 0.1],
//!     vec![10.0, 10.0],
//!     vec![10.1, 10.1],
//! ];
//! let frame = ColumnFrame::from_rows(&rows).unwrap();
//!
//! let model = Kmeans::new(2)
//!     .with_init(Initialization::Furthest)
//!     .with_max_iter(10)
//!     .with_seed(42)
//!     .fit(&frame)
//!     .unwrap();
//!
//! assert_eq!(model.phase, Phase::Done);
//! assert_eq!(model.assign_row(&frame, 0).unwrap(), model.assign_row(&frame, 1).unwrap());
//! assert_ne!(model.assign_row(&frame, 0).unwrap(), model.assign_row(&frame, 2).unwrap());
//! ```

pub mod distance;
mod kmeans;
mod lloyds;
mod normalize;
mod recluster;
mod sampler;
mod sumsqr;
mod traits;

pub use distance::ClusterDist;
pub use kmeans::{
    EmptyClusters, Initialization, Kmeans, KmeansModel, Phase, Scorer, OVERSAMPLING,
    SEEDING_ROUNDS, UNASSIGNED,
};
pub use lloyds::{ClusterStats, Lloyds, LloydsTask};
pub use normalize::{Normalizer, MIN_SIGMA};
pub use recluster::Recluster;
pub use sampler::{partition_seed, round_seed, Sampled, SamplerTask};
pub use sumsqr::{SumSqr, SumSqrTask};
pub use traits::Clustering;
