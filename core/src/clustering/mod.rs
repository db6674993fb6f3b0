//! Clustering engine: standardize the feature matrix, run one catalog
//! algorithm, summarize the result.
//!
//! Dispatch is an exhaustive match over AlgorithmSpec: every variant
//! maps to one pure function `(scaled matrix, params, rng) -> Fitted`.
//! Adding a catalog entry without wiring it here does not compile.
//!
//! Seeded algorithms (kmeans, gmm, spectral, affinity_propagation)
//! draw from the RngBank, so identical inputs give identical labels.

mod affinity;
mod birch;
mod dbscan;
mod gmm;
mod hierarchical;
mod kmeans;
pub mod linalg;
mod meanshift;
pub mod params;
pub mod scaler;
mod spectral;

pub use params::{
    Affinity, AffinityPropagationParams, AlgorithmSpec, BirchParams, DbscanParams, GmmParams,
    HierarchicalParams, KMeansParams, MeanShiftParams, SpectralParams, CATALOG,
};
pub use scaler::StandardScaler;

use crate::{
    config::PipelineConfig,
    error::{SegError, SegResult},
    features::{FeatureSet, FEATURE_NAMES},
    rng::{RngBank, RngSlot},
    types::{ClusterLabel, CustomerId},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Fitted model state ──────────────────────────────────────────────────────

/// Algorithm-specific fitted state, in standardized feature space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelState {
    /// One center per label (kmeans, hierarchical, spectral, meanshift).
    Centroids { centroids: Vec<Vec<f64>> },
    /// Density clustering keeps no centers, only its shape.
    Density { n_clusters: usize, n_noise: usize },
    /// Gaussian mixture weights and component means.
    Mixture {
        weights: Vec<f64>,
        means: Vec<Vec<f64>>,
    },
    /// BIRCH leaf subclusters and the global label of each.
    Subclusters {
        centroids: Vec<Vec<f64>>,
        labels: Vec<ClusterLabel>,
    },
    /// Affinity propagation exemplars (row indices into the matrix).
    Exemplars {
        indices: Vec<usize>,
        centers: Vec<Vec<f64>>,
    },
}

/// What a single algorithm function hands back.
#[derive(Debug, Clone)]
pub struct Fitted {
    pub labels: Vec<ClusterLabel>,
    pub state: ModelState,
    /// The AlgorithmSpec with every data-dependent default resolved.
    pub resolved: AlgorithmSpec,
}

// ── Summary ─────────────────────────────────────────────────────────────────

/// Mean raw (unscaled) feature values of one cluster.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureMeans {
    pub monetary: f64,
    pub recency: f64,
    pub length: f64,
    pub frequency: f64,
    pub variety: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterSummary {
    pub counts: BTreeMap<ClusterLabel, usize>,
    pub feature_means: BTreeMap<ClusterLabel, FeatureMeans>,
}

impl ClusterSummary {
    pub fn from_labels(features: &FeatureSet, labels: &[ClusterLabel]) -> Self {
        let mut sums: BTreeMap<ClusterLabel, [f64; 5]> = BTreeMap::new();
        let mut counts: BTreeMap<ClusterLabel, usize> = BTreeMap::new();
        for (v, &label) in features.vectors.iter().zip(labels) {
            let acc = sums.entry(label).or_insert([0.0; 5]);
            for (a, x) in acc.iter_mut().zip(v.values()) {
                *a += x;
            }
            *counts.entry(label).or_insert(0) += 1;
        }

        let feature_means = sums
            .into_iter()
            .map(|(label, s)| {
                let n = counts[&label] as f64;
                let means = FeatureMeans {
                    monetary: s[0] / n,
                    recency: s[1] / n,
                    length: s[2] / n,
                    frequency: s[3] / n,
                    variety: s[4] / n,
                };
                (label, means)
            })
            .collect();

        Self {
            counts,
            feature_means,
        }
    }

    pub fn n_clusters(&self) -> usize {
        self.counts.keys().filter(|l| **l >= 0).count()
    }
}

// ── Outcome ─────────────────────────────────────────────────────────────────

/// Everything a run produced, before any persistence decision.
#[derive(Debug, Clone)]
pub struct ClusteringOutcome {
    pub spec: AlgorithmSpec,
    pub customer_ids: Vec<CustomerId>,
    pub labels: Vec<ClusterLabel>,
    pub scaler: StandardScaler,
    pub state: ModelState,
    pub summary: ClusterSummary,
}

impl ClusteringOutcome {
    pub fn assignments(&self) -> impl Iterator<Item = (&str, ClusterLabel)> {
        self.customer_ids
            .iter()
            .map(String::as_str)
            .zip(self.labels.iter().copied())
    }
}

// ── Engine ──────────────────────────────────────────────────────────────────

pub struct ClusteringEngine<'a> {
    config: &'a PipelineConfig,
}

impl<'a> ClusteringEngine<'a> {
    pub fn new(config: &'a PipelineConfig) -> Self {
        Self { config }
    }

    pub fn cluster(&self, features: &FeatureSet, spec: &AlgorithmSpec) -> SegResult<ClusteringOutcome> {
        let n = features.len();
        if n == 0 {
            return Err(SegError::NoData("no customers to cluster".into()));
        }
        if let Some(k) = spec.n_clusters() {
            if k > n {
                return Err(SegError::InvalidInput(format!(
                    "n_clusters={k} exceeds the {n} customers available"
                )));
            }
        }

        let raw = features.to_matrix();
        let scaler = StandardScaler::fit(&raw)?;
        let x = scaler.transform(&raw);
        let bank = RngBank::new(self.config.seed);

        let fitted = match spec {
            AlgorithmSpec::KMeans(p) => {
                kmeans::fit(&x, p, &self.config.kmeans, bank.for_slot(RngSlot::KMeans))?
            }
            AlgorithmSpec::Dbscan(p) => dbscan::fit(&x, p)?,
            AlgorithmSpec::Hierarchical(p) => hierarchical::fit(&x, p)?,
            AlgorithmSpec::Gmm(p) => gmm::fit(&x, p, &self.config.gmm, bank.for_slot(RngSlot::Gmm))?,
            AlgorithmSpec::Spectral(p) => spectral::fit(
                &x,
                p,
                &self.config.spectral,
                &self.config.kmeans,
                bank.for_slot(RngSlot::Spectral),
            )?,
            AlgorithmSpec::Birch(p) => birch::fit(&x, p, &self.config.birch)?,
            AlgorithmSpec::MeanShift(p) => meanshift::fit(&x, p, &self.config.meanshift)?,
            AlgorithmSpec::AffinityPropagation(p) => affinity::fit(
                &x,
                p,
                &self.config.affinity_propagation,
                bank.for_slot(RngSlot::AffinityPropagation),
            )?,
        };

        if fitted.labels.len() != n {
            return Err(SegError::computation(
                spec.id(),
                format!("produced {} labels for {n} customers", fitted.labels.len()),
            ));
        }

        let summary = ClusterSummary::from_labels(features, &fitted.labels);
        log::info!(
            "{}: {} clusters over {n} customers ({} features)",
            spec.id(),
            summary.n_clusters(),
            FEATURE_NAMES.len()
        );

        Ok(ClusteringOutcome {
            spec: fitted.resolved,
            customer_ids: features.customer_ids(),
            labels: fitted.labels,
            scaler,
            state: fitted.state,
            summary,
        })
    }
}

/// usize labels from a library call to the stored integer form.
fn to_labels(raw: impl IntoIterator<Item = usize>) -> Vec<ClusterLabel> {
    raw.into_iter().map(|l| l as ClusterLabel).collect()
}
