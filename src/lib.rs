//! Scalable k-means over column-partitioned data.
//!
//! `kmeans-par` computes k centroids with k-means|| seeding (parallel
//! oversampled initialization) followed by Lloyd refinement. Every pass is a
//! map/reduce over independent row partitions of a [`Frame`], so the work
//! spreads across threads while results stay reproducible for a given seed.
//!
//! - [`cluster`]: the algorithm (distance, normalization, the map/reduce
//!   tasks, re-clustering and the [`Kmeans`] driver)
//! - [`frame`]: the dataset contract and an in-memory implementation
//! - [`task`]: the partitioned map/combine primitive
//! - [`checkpoint`] and [`job`]: model persistence and cancellation

#![forbid(unsafe_code)]

pub mod checkpoint;
pub mod cluster;
pub mod error;
pub mod frame;
pub mod job;
pub mod task;

pub use checkpoint::{Checkpoint, JsonDir, MemoryStore};
pub use cluster::{
    Clustering, EmptyClusters, Initialization, Kmeans, KmeansModel, Phase, Recluster, Scorer,
    UNASSIGNED,
};
pub use error::{Error, Result};
pub use frame::{ColumnFrame, ColumnStats, Frame, Select};
pub use job::{CancelToken, Job};
