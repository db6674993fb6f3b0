use crate::rng::DEFAULT_SEED;
use serde::{Deserialize, Serialize};

// ── Engine tuning ──────────────────────────────────────────────────
//
// These knobs are not part of an algorithm's parameter contract: a
// caller picks `n_clusters`, `eps`, ... per run; the values below are
// fixed per deployment and loaded from data/pipeline.json.

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansTuning {
    pub max_iterations: u64,
    pub tolerance: f64,
    pub n_runs: usize,
}

impl Default for KMeansTuning {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-4,
            n_runs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GmmTuning {
    pub max_iterations: u64,
    pub tolerance: f64,
    pub n_runs: u64,
}

impl Default for GmmTuning {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-3,
            n_runs: 1,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SpectralTuning {
    /// Kernel coefficient for the rbf affinity.
    pub gamma: f64,
    /// Neighbour count for the nearest_neighbors affinity.
    pub n_neighbors: usize,
}

impl Default for SpectralTuning {
    fn default() -> Self {
        Self {
            gamma: 1.0,
            n_neighbors: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeanShiftTuning {
    pub max_iterations: usize,
    /// Neighbour quantile used when the bandwidth is estimated.
    pub bandwidth_quantile: f64,
}

impl Default for MeanShiftTuning {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            bandwidth_quantile: 0.3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AffinityTuning {
    pub max_iterations: usize,
    /// Iterations without exemplar change that count as converged.
    pub convergence_iterations: usize,
}

impl Default for AffinityTuning {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            convergence_iterations: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BirchTuning {
    /// Maximum CF entries per tree node before it splits.
    pub branching_factor: usize,
}

impl Default for BirchTuning {
    fn default() -> Self {
        Self {
            branching_factor: 50,
        }
    }
}

// ── Pipeline config ────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Directory that receives serialized model artifacts.
    pub model_store_dir: String,
    /// Master seed for every seeded algorithm.
    pub seed: u64,
    pub kmeans: KMeansTuning,
    pub gmm: GmmTuning,
    pub spectral: SpectralTuning,
    pub meanshift: MeanShiftTuning,
    pub affinity_propagation: AffinityTuning,
    pub birch: BirchTuning,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model_store_dir: "model_store".into(),
            seed: DEFAULT_SEED,
            kmeans: KMeansTuning::default(),
            gmm: GmmTuning::default(),
            spectral: SpectralTuning::default(),
            meanshift: MeanShiftTuning::default(),
            affinity_propagation: AffinityTuning::default(),
            birch: BirchTuning::default(),
        }
    }
}

impl PipelineConfig {
    /// Load from the data/ directory.
    /// In tests, use PipelineConfig::default_test().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let path = format!("{data_dir}/pipeline.json");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Cannot parse {path}: {e}"))?;
        if config.seed != DEFAULT_SEED {
            log::info!("pipeline config: seed overridden to {}", config.seed);
        }
        Ok(config)
    }

    /// Config with hardcoded defaults for use in unit tests.
    /// Artifacts go to `model_store_dir`, normally a temp directory.
    pub fn default_test(model_store_dir: &str) -> Self {
        Self {
            model_store_dir: model_store_dir.to_string(),
            ..Self::default()
        }
    }
}
