//! The segmentation pipeline: the one entry point callers use.
//!
//! STAGE ORDER (fixed):
//!   1. Resolve the algorithm id and parameters.
//!   2. Capture the reference "now" once.
//!   3. Build features over the requested window.
//!   4. Standardize and cluster.
//!   5. Record the run (only when `save` is set).
//!
//! RULES:
//!   - Caller-input problems surface before any data is read.
//!   - Nothing is written unless every earlier stage succeeded.
//!   - All randomness flows through the RngBank seeded from the config.

use crate::{
    clock::ReferenceClock,
    clustering::{AlgorithmSpec, ClusteringEngine, FeatureMeans},
    config::PipelineConfig,
    error::{SegError, SegResult},
    features::{DateRange, FeatureBuilder, FeatureOutcome},
    recorder::RunRecorder,
    snapshot::{self, RlfmPage},
    store::{ClusterCustomer, DataSummary, RunRecord, RunSummary, SegStore},
    strategy::{SegmentClassifier, SegmentStrategy},
    types::{ClusterLabel, RunId},
};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use std::{collections::BTreeMap, path::Path};

/// One clustering request.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub algorithm: String,
    pub parameters: Map<String, Value>,
    pub run_name: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub save: bool,
}

impl RunRequest {
    /// Unsaved run over the whole history with default parameters.
    pub fn new(algorithm: &str, run_name: &str) -> Self {
        Self {
            algorithm: algorithm.to_string(),
            parameters: Map::new(),
            run_name: run_name.to_string(),
            start_date: None,
            end_date: None,
            save: false,
        }
    }

    pub fn param(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.to_string(), value.into());
        self
    }

    pub fn parameters(mut self, parameters: Map<String, Value>) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn between(mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        self.start_date = start;
        self.end_date = end;
        self
    }

    pub fn save(mut self, save: bool) -> Self {
        self.save = save;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PipelineResult {
    pub run_id: Option<RunId>,
    pub saved: bool,
    pub algorithm: String,
    /// Resolved parameters, defaults filled in.
    pub parameters: Value,
    pub customer_count: usize,
    pub per_cluster_counts: BTreeMap<ClusterLabel, usize>,
    pub per_cluster_feature_means: BTreeMap<ClusterLabel, FeatureMeans>,
    pub model_artifact: Option<String>,
}

pub struct Pipeline {
    store: SegStore,
    config: PipelineConfig,
    clock: ReferenceClock,
}

impl Pipeline {
    pub fn new(store: SegStore, config: PipelineConfig) -> Self {
        Self::with_clock(store, config, ReferenceClock::System)
    }

    pub fn with_clock(store: SegStore, config: PipelineConfig, clock: ReferenceClock) -> Self {
        Self {
            store,
            config,
            clock,
        }
    }

    pub fn store(&self) -> &SegStore {
        &self.store
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    // ── Clustering ─────────────────────────────────────────────

    pub fn run_pipeline(&self, request: &RunRequest) -> SegResult<PipelineResult> {
        let spec = AlgorithmSpec::resolve(&request.algorithm, &request.parameters)?;
        let range = DateRange::new(request.start_date, request.end_date)?;
        let now = self.clock.now();
        let run = &request.run_name;

        let features = match FeatureBuilder::new(now).build(&self.store, &range)? {
            FeatureOutcome::Built(f) => f,
            FeatureOutcome::NoData => {
                log::warn!("run={run} {}: no transactions in window", spec.id());
                return Err(SegError::NoData(format!(
                    "no transactions between {} and {}",
                    range.start.map_or("the beginning".to_string(), |d| d.to_string()),
                    range.end.map_or("now".to_string(), |d| d.to_string()),
                )));
            }
        };

        log::info!(
            "run={run} {}: clustering {} customers",
            spec.id(),
            features.len()
        );
        let outcome = ClusteringEngine::new(&self.config).cluster(&features, &spec)?;

        let recorder = RunRecorder::new(&self.store, Path::new(&self.config.model_store_dir));
        let recorded = recorder.record(&outcome, run, request.save, now)?;

        Ok(PipelineResult {
            run_id: recorded.run_id,
            saved: recorded.saved,
            algorithm: outcome.spec.id().to_string(),
            parameters: outcome.spec.parameters()?,
            customer_count: outcome.labels.len(),
            per_cluster_counts: outcome.summary.counts,
            per_cluster_feature_means: outcome.summary.feature_means,
            model_artifact: recorded.model_artifact,
        })
    }

    // ── RLFM snapshot ──────────────────────────────────────────

    pub fn recompute_rlfm_snapshot(&self) -> SegResult<usize> {
        snapshot::recompute(&self.store, self.clock.now())
    }

    pub fn rlfm_snapshot(&self, offset: usize, limit: usize) -> SegResult<RlfmPage> {
        snapshot::page(&self.store, offset, limit)
    }

    // ── Segments ───────────────────────────────────────────────

    pub fn classify_run(&self, run_id: RunId) -> SegResult<Vec<SegmentStrategy>> {
        SegmentClassifier::new(&self.store).classify_run(run_id)
    }

    pub fn cluster_customers(
        &self,
        run_id: RunId,
        cluster_label: ClusterLabel,
    ) -> SegResult<Vec<ClusterCustomer>> {
        self.get_run(run_id)?;
        self.store.cluster_customers(run_id, cluster_label)
    }

    // ── Run history ────────────────────────────────────────────

    pub fn list_runs(&self) -> SegResult<Vec<RunSummary>> {
        self.store.list_runs()
    }

    pub fn get_run(&self, run_id: RunId) -> SegResult<RunRecord> {
        self.store
            .get_run(run_id)?
            .ok_or(SegError::RunNotFound { run_id })
    }

    /// Delete the run, its assignments and its model artifact file.
    pub fn delete_run(&self, run_id: RunId) -> SegResult<()> {
        let run = self.get_run(run_id)?;
        if !self.store.delete_run(run_id)? {
            return Err(SegError::RunNotFound { run_id });
        }
        if let Some(location) = run.model_artifact.as_deref() {
            let path = Path::new(location);
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    log::warn!("run_id={run_id}: artifact {location} not removed: {e}");
                }
            }
        }
        log::info!("run_id={run_id} ({}): deleted", run.run_name);
        Ok(())
    }

    // ── Data overview ──────────────────────────────────────────

    pub fn data_summary(&self) -> SegResult<DataSummary> {
        self.store.data_summary()
    }

    pub fn monthly_revenue(&self) -> SegResult<Vec<(String, f64)>> {
        self.store.monthly_revenue()
    }

    pub fn category_breakdown(&self) -> SegResult<Vec<(String, i64)>> {
        self.store.category_breakdown()
    }
}
