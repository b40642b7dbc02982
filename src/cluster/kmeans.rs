//! Scalable k-means: k-means|| seeding followed by Lloyd refinement.
//!
//! # The Objective
//!
//! ```text
//! WCSS = Σₖ Σᵢ∈Cₖ ||xᵢ - μₖ||²
//! ```
//!
//! # Seeding (Bahmani et al., 2012)
//!
//! k-means++ needs k sequential passes over the data. k-means|| instead runs
//! a handful of rounds that each sample *many* candidates at once:
//!
//! 1. Start from one random row.
//! 2. For each of 5 rounds, compute the total error `phi` of the current
//!    candidates, then keep every row independently with probability
//!    `min(1, l * d² / phi)`, `l = 3k`.
//! 3. Collapse the candidates to k centroids with a [`Recluster`] policy.
//!
//! Both steps are partitioned map/reduce passes, so they scale with the
//! number of partitions rather than with k.
//!
//! # Refinement
//!
//! Each Lloyd pass is a single map/reduce: assign rows, recompute means and
//! per-cluster variances. The total error reported for a pass is that of the
//! assignment to the previous centroids, so it never increases from one pass
//! to the next.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ─┬─> Seeding ─> Reclustering ─┬─> Refining ─> Done
//!                └────────────────────────────┘       └─────> Cancelled
//! ```
//!
//! The model is checkpointed after every completed seeding round and Lloyd
//! pass. Cancellation is observed before each seeding round and after each
//! Lloyd pass; the last checkpoint is then final.
//!
//! # Missing values and normalization
//!
//! Missing values are replaced by the column mean. A column with no values at
//! all stays missing, and distances are extrapolated over the dimensions that
//! are present. With normalization on, all work happens on z-scores and
//! centroids are mapped back before they are reported.

use std::fmt;
use std::str::FromStr;

use rand::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::distance::closest;
use super::lloyds::LloydsTask;
use super::normalize::Normalizer;
use super::recluster::Recluster;
use super::sampler::{round_seed, SamplerTask};
use super::sumsqr::SumSqrTask;
use super::traits::Clustering;
use crate::error::{Error, Result};
use crate::frame::{ColumnFrame, Frame};
use crate::job::Job;
use crate::task;

/// Number of k-means|| sampling rounds.
pub const SEEDING_ROUNDS: usize = 5;

/// Oversampling factor per round, as a multiple of k.
pub const OVERSAMPLING: f64 = 3.0;

/// Label for rows that could not be assigned (no valid dimension).
pub const UNASSIGNED: usize = usize::MAX;

/// How initial centroids are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Initialization {
    /// k independent random rows.
    #[default]
    #[serde(alias = "none")]
    Random,
    /// k-means|| seeding, collapsed with k-means++.
    #[serde(alias = "kmeans++", alias = "k-means++")]
    PlusPlus,
    /// k-means|| seeding, collapsed with farthest-point selection.
    #[serde(alias = "farthest")]
    Furthest,
}

impl Initialization {
    /// Policy used to collapse the oversampled pool, if seeding runs at all.
    pub fn recluster(self) -> Option<Recluster> {
        match self {
            Self::Random => None,
            Self::PlusPlus => Some(Recluster::PlusPlus),
            Self::Furthest => Some(Recluster::Furthest),
        }
    }
}

impl fmt::Display for Initialization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Random => write!(f, "none"),
            Self::PlusPlus => write!(f, "plusplus"),
            Self::Furthest => write!(f, "furthest"),
        }
    }
}

impl FromStr for Initialization {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "none" | "random" => Ok(Self::Random),
            "plusplus" | "kmeans++" | "k-means++" => Ok(Self::PlusPlus),
            "furthest" | "farthest" => Ok(Self::Furthest),
            other => Err(Error::invalid(
                "initialization",
                format!("unsupported strategy '{other}'"),
            )),
        }
    }
}

/// What to do with a cluster that received no rows in a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmptyClusters {
    /// Leave the centroid undefined (NaN). Later passes never assign to it.
    #[default]
    Keep,
    /// Move the centroid to a random row.
    Reseed,
}

/// Where a fit is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    #[default]
    Uninitialized,
    Seeding,
    Reclustering,
    Refining,
    Done,
    Cancelled,
}

/// K-means configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Kmeans {
    /// Number of clusters.
    k: usize,
    /// Maximum number of Lloyd passes.
    max_iter: usize,
    init: Initialization,
    /// Z-score every column before clustering.
    normalize: bool,
    /// Random seed; drawn from entropy (and recorded in the model) if unset.
    seed: Option<u64>,
    empty_clusters: EmptyClusters,
}

impl Default for Kmeans {
    fn default() -> Self {
        Self::new(2)
    }
}

impl Kmeans {
    /// Create a new K-means clusterer.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            max_iter: 100,
            init: Initialization::default(),
            normalize: false,
            seed: None,
            empty_clusters: EmptyClusters::default(),
        }
    }

    /// Set maximum number of Lloyd passes.
    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Set the initialization strategy.
    pub fn with_init(mut self, init: Initialization) -> Self {
        self.init = init;
        self
    }

    /// Cluster on z-scores instead of raw values.
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// Set random seed for reproducibility.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the empty-cluster policy.
    pub fn with_empty_clusters(mut self, policy: EmptyClusters) -> Self {
        self.empty_clusters = policy;
        self
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn max_iter(&self) -> usize {
        self.max_iter
    }

    pub fn init(&self) -> Initialization {
        self.init
    }

    /// Check the configuration on its own.
    pub fn validate(&self) -> Result<()> {
        if self.k < 2 {
            return Err(Error::invalid("k", "must be at least 2"));
        }
        if self.max_iter < 1 {
            return Err(Error::invalid("max_iter", "must be at least 1"));
        }
        Ok(())
    }

    fn validate_frame<F: Frame + ?Sized>(&self, frame: &F) -> Result<()> {
        let n = frame.nrows();
        if n == 0 {
            return Err(Error::EmptyInput);
        }
        if frame.ncols() == 0 {
            return Err(Error::invalid("cols", "must select at least one column"));
        }
        if self.k > n {
            return Err(Error::InvalidClusterCount {
                requested: self.k,
                n_items: n,
            });
        }
        Ok(())
    }

    /// Fit on `frame`, checkpointing into a private in-memory store.
    pub fn fit<F: Frame + ?Sized>(&self, frame: &F) -> Result<KmeansModel> {
        self.fit_job(frame, &Job::new("kmeans"))
    }

    /// Fit on `frame` under `job`.
    ///
    /// Returns the final model: `Done` after `max_iter` Lloyd passes, or
    /// `Cancelled` with the last checkpointed state.
    pub fn fit_job<F: Frame + ?Sized>(&self, frame: &F, job: &Job) -> Result<KmeansModel> {
        self.validate()?;
        self.validate_frame(frame)?;

        let seed = self.seed.unwrap_or_else(|| rand::rng().random());
        let norm = Normalizer::from_frame(frame, self.normalize);
        // Offset so the driver stream differs from every partition stream.
        let mut rng = StdRng::seed_from_u64(seed.wrapping_sub(1));
        let mut model = KmeansModel::new(self, frame.names().to_vec(), seed);

        info!(
            k = self.k,
            rows = frame.nrows(),
            cols = frame.ncols(),
            init = %self.init,
            normalize = self.normalize,
            seed,
            "k-means fit started"
        );

        let mut clusters = match self.init.recluster() {
            None => (0..self.k)
                .map(|_| random_row(frame, &norm, &mut rng))
                .collect::<Vec<_>>(),
            Some(policy) => {
                model.phase = Phase::Seeding;
                let mut pool = vec![random_row(frame, &norm, &mut rng)];
                while model.seeding_rounds < SEEDING_ROUNDS {
                    if job.cancelled() {
                        return cancel(model, job);
                    }
                    let sqr = task::run(&SumSqrTask::new(&pool, &norm), frame).sqr;
                    let sampler = SamplerTask::new(
                        &pool,
                        &norm,
                        sqr,
                        OVERSAMPLING * self.k as f64,
                        round_seed(seed, model.seeding_rounds),
                    );
                    let sampled = task::run(&sampler, frame).into_points();
                    debug!(
                        round = model.seeding_rounds + 1,
                        error = sqr,
                        sampled = sampled.len(),
                        pool = pool.len() + sampled.len(),
                        "seeding round complete"
                    );
                    pool.extend(sampled);

                    model.centroids = norm.denormalize_all(&pool);
                    model.error = sqr;
                    model.seeding_rounds += 1;
                    checkpoint(&mut model, job)?;
                }
                model.phase = Phase::Reclustering;
                policy.select(&pool, self.k, &mut rng)?
            }
        };

        model.phase = Phase::Refining;
        loop {
            let pass = task::run(&LloydsTask::new(&clusters, &norm), frame);
            let mut next = pass.centroids();
            let empty = pass.empty_clusters();
            if !empty.is_empty() {
                warn!(
                    iteration = model.iterations + 1,
                    clusters = ?empty,
                    policy = ?self.empty_clusters,
                    "clusters received no rows"
                );
                if self.empty_clusters == EmptyClusters::Reseed {
                    for &c in &empty {
                        next[c] = random_row(frame, &norm, &mut rng);
                    }
                }
            }
            if pass.skipped > 0 {
                warn!(rows = pass.skipped, "rows without any valid dimension were not assigned");
            }

            model.centroids = norm.denormalize_all(&next);
            model.cluster_variances = pass.variances();
            model.cluster_sizes = pass.sizes();
            model.empty_clusters = empty;
            model.skipped_rows = pass.skipped;
            model.error = pass.sqr;
            model.iterations += 1;
            if model.iterations >= self.max_iter {
                model.phase = Phase::Done;
            }
            debug!(iteration = model.iterations, error = pass.sqr, "lloyd pass complete");
            checkpoint(&mut model, job)?;
            clusters = next;

            if model.phase == Phase::Done {
                break;
            }
            if job.cancelled() {
                return cancel(model, job);
            }
        }

        info!(
            iterations = model.iterations,
            error = model.error,
            "k-means fit finished"
        );
        Ok(model)
    }
}

impl Clustering for Kmeans {
    fn fit_predict(&self, data: &[Vec<f32>]) -> Result<Vec<usize>> {
        if data.is_empty() {
            return Err(Error::EmptyInput);
        }
        let rows: Vec<Vec<f64>> = data
            .iter()
            .map(|p| p.iter().map(|&x| f64::from(x)).collect())
            .collect();
        let frame = ColumnFrame::from_rows(&rows)?;
        let model = self.fit(&frame)?;
        let scorer = model.scorer(&frame)?;
        (0..frame.nrows())
            .map(|row| Ok(scorer.assign(row)?.unwrap_or(UNASSIGNED)))
            .collect()
    }

    fn n_clusters(&self) -> usize {
        self.k
    }
}

fn random_row<F: Frame + ?Sized>(frame: &F, norm: &Normalizer, rng: &mut StdRng) -> Vec<f64> {
    let row = rng.random_range(0..frame.nrows());
    let mut values = vec![0.0; frame.ncols()];
    norm.row(frame, row, &mut values);
    values
}

fn checkpoint(model: &mut KmeansModel, job: &Job) -> Result<()> {
    model.version += 1;
    job.store().put(job.key(), model)
}

fn cancel(mut model: KmeansModel, job: &Job) -> Result<KmeansModel> {
    info!(
        iterations = model.iterations,
        seeding_rounds = model.seeding_rounds,
        "k-means fit cancelled"
    );
    model.phase = Phase::Cancelled;
    checkpoint(&mut model, job)?;
    Ok(model)
}

/// Snapshot of a k-means fit.
///
/// Centroids are always in the original value space, whether or not the fit
/// normalized internally. While seeding they hold the candidate pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmeansModel {
    /// Column names, in centroid coordinate order.
    pub names: Vec<String>,
    /// Cluster centers; NaN rows mark clusters that received no rows.
    #[serde(with = "nan_as_null")]
    pub centroids: Vec<Vec<f64>>,
    /// Sum of minimum squared distances.
    pub error: f64,
    /// Completed Lloyd passes.
    pub iterations: usize,
    /// Completed k-means|| sampling rounds.
    pub seeding_rounds: usize,
    /// Sum of squared deviations per cluster (in the clustering space).
    pub cluster_variances: Vec<f64>,
    /// Rows assigned to each cluster in the last pass.
    pub cluster_sizes: Vec<u64>,
    /// Clusters that received no rows in the last pass.
    pub empty_clusters: Vec<usize>,
    /// Rows without any valid dimension in the last pass.
    pub skipped_rows: u64,
    /// Whether data was normalized.
    pub normalized: bool,
    pub max_iter: usize,
    /// Seed actually used.
    pub seed: u64,
    pub phase: Phase,
    /// Incremented on every checkpoint.
    pub version: u64,
}

impl KmeansModel {
    fn new(params: &Kmeans, names: Vec<String>, seed: u64) -> Self {
        Self {
            names,
            centroids: Vec::new(),
            error: 0.0,
            iterations: 0,
            seeding_rounds: 0,
            cluster_variances: Vec::new(),
            cluster_sizes: Vec::new(),
            empty_clusters: Vec::new(),
            skipped_rows: 0,
            normalized: params.normalize,
            max_iter: params.max_iter,
            seed,
            phase: Phase::Uninitialized,
            version: 0,
        }
    }

    /// Number of centroids.
    pub fn k(&self) -> usize {
        self.centroids.len()
    }

    /// Fraction of Lloyd passes done, in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.max_iter == 0 {
            return 1.0;
        }
        (self.iterations as f32 / self.max_iter as f32).min(1.0)
    }

    /// Prepare to score rows of `frame` (which supplies the column statistics).
    pub fn scorer<'a, F: Frame + ?Sized>(&'a self, frame: &'a F) -> Result<Scorer<'a, F>> {
        let dims = self.names.len();
        if frame.ncols() != dims {
            return Err(Error::DimensionMismatch {
                expected: dims,
                found: frame.ncols(),
            });
        }
        let norm = Normalizer::from_frame(frame, self.normalized);
        let centroids = norm.normalize_all(&self.centroids);
        Ok(Scorer {
            frame,
            norm,
            centroids,
        })
    }

    /// Nearest cluster of one row of `frame`.
    pub fn assign_row<F: Frame + ?Sized>(&self, frame: &F, row: usize) -> Result<Option<usize>> {
        self.scorer(frame)?.assign(row)
    }

    /// One-hot cluster membership of one row of `frame`.
    pub fn score_row<F: Frame + ?Sized>(&self, frame: &F, row: usize) -> Result<Vec<f32>> {
        self.scorer(frame)?.score(row)
    }

    /// Scoring a bare row is not possible: imputation and normalization need
    /// the statistics of the full dataset. Use [`score_row`](Self::score_row).
    pub fn score_values(&self, _values: &[f64]) -> Result<Vec<f32>> {
        Err(Error::Unsupported(
            "scoring a single row needs the dataset's column statistics",
        ))
    }
}

/// Scores rows of one frame against a model, with centroids normalized once.
pub struct Scorer<'a, F: ?Sized> {
    frame: &'a F,
    norm: Normalizer,
    centroids: Vec<Vec<f64>>,
}

impl<F: Frame + ?Sized> Scorer<'_, F> {
    /// Nearest cluster of `row`, `None` if the row has no valid dimension.
    pub fn assign(&self, row: usize) -> Result<Option<usize>> {
        if row >= self.frame.nrows() {
            return Err(Error::invalid(
                "row",
                format!("{row} out of range (frame has {})", self.frame.nrows()),
            ));
        }
        let mut values = vec![0.0; self.frame.ncols()];
        self.norm.row(self.frame, row, &mut values);
        Ok(closest(&self.centroids, &values).cluster)
    }

    /// One-hot membership of `row` (all zeros if it can't be assigned).
    pub fn score(&self, row: usize) -> Result<Vec<f32>> {
        let mut preds = vec![0.0; self.centroids.len()];
        if let Some(c) = self.assign(row)? {
            preds[c] = 1.0;
        }
        Ok(preds)
    }
}

/// JSON has no NaN; undefined coordinates travel as `null`.
mod nan_as_null {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(v: &[Vec<f64>], s: S) -> Result<S::Ok, S::Error> {
        let rows: Vec<Vec<Option<f64>>> = v
            .iter()
            .map(|r| r.iter().map(|&x| (!x.is_nan()).then_some(x)).collect())
            .collect();
        rows.serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Vec<f64>>, D::Error> {
        let rows = Vec::<Vec<Option<f64>>>::deserialize(d)?;
        Ok(rows
            .into_iter()
            .map(|r| r.into_iter().map(|x| x.unwrap_or(f64::NAN)).collect())
            .collect())
    }
}
