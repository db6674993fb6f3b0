//! Algorithm catalog and per-algorithm parameter contracts.
//!
//! A caller hands in an algorithm id plus a loose JSON parameter bag.
//! `AlgorithmSpec::resolve` turns that into one closed variant whose
//! parameter struct has every default filled in. The resolved struct,
//! not the caller's bag, is what gets recorded on the run.

use crate::error::{SegError, SegResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Every recognised algorithm id, in catalog order.
pub const CATALOG: [&str; 8] = [
    "kmeans",
    "dbscan",
    "hierarchical",
    "gmm",
    "spectral",
    "birch",
    "meanshift",
    "affinity_propagation",
];

pub const DEFAULT_N_CLUSTERS: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansParams {
    pub n_clusters: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbscanParams {
    pub eps: f64,
    pub min_samples: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HierarchicalParams {
    pub n_clusters: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GmmParams {
    pub n_clusters: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Affinity {
    Rbf,
    NearestNeighbors,
}

impl Affinity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rbf => "rbf",
            Self::NearestNeighbors => "nearest_neighbors",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralParams {
    pub n_clusters: usize,
    pub affinity: Affinity,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BirchParams {
    pub n_clusters: usize,
    pub threshold: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeanShiftParams {
    /// None until fitted when the caller leaves it out; the fitted
    /// spec always carries the bandwidth that was actually used.
    pub bandwidth: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AffinityPropagationParams {
    pub damping: f64,
}

/// One catalog entry with its resolved parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum AlgorithmSpec {
    KMeans(KMeansParams),
    Dbscan(DbscanParams),
    Hierarchical(HierarchicalParams),
    Gmm(GmmParams),
    Spectral(SpectralParams),
    Birch(BirchParams),
    MeanShift(MeanShiftParams),
    AffinityPropagation(AffinityPropagationParams),
}

impl AlgorithmSpec {
    /// Resolve an algorithm id and a raw parameter bag.
    /// Unknown ids and malformed values are caller-input errors.
    pub fn resolve(algorithm: &str, raw: &Map<String, Value>) -> SegResult<Self> {
        let spec = match algorithm {
            "kmeans" => Self::KMeans(KMeansParams {
                n_clusters: count(raw, "n_clusters", DEFAULT_N_CLUSTERS)?,
            }),
            "dbscan" => {
                let eps = positive(raw, "eps", 0.5)?;
                let min_samples = count(raw, "min_samples", 5)?;
                Self::Dbscan(DbscanParams { eps, min_samples })
            }
            "hierarchical" => Self::Hierarchical(HierarchicalParams {
                n_clusters: count(raw, "n_clusters", DEFAULT_N_CLUSTERS)?,
            }),
            "gmm" => Self::Gmm(GmmParams {
                n_clusters: count(raw, "n_clusters", DEFAULT_N_CLUSTERS)?,
            }),
            "spectral" => Self::Spectral(SpectralParams {
                n_clusters: count(raw, "n_clusters", DEFAULT_N_CLUSTERS)?,
                affinity: affinity(raw)?,
            }),
            "birch" => Self::Birch(BirchParams {
                n_clusters: count(raw, "n_clusters", DEFAULT_N_CLUSTERS)?,
                threshold: positive(raw, "threshold", 0.5)?,
            }),
            "meanshift" => {
                let bandwidth = number(raw, "bandwidth")?;
                if let Some(b) = bandwidth {
                    if !(b > 0.0) {
                        return Err(SegError::invalid_parameter(
                            "bandwidth",
                            format!("must be > 0, got {b}"),
                        ));
                    }
                }
                Self::MeanShift(MeanShiftParams { bandwidth })
            }
            "affinity_propagation" => {
                let damping = number(raw, "damping")?.unwrap_or(0.5);
                if !(0.5..1.0).contains(&damping) {
                    return Err(SegError::invalid_parameter(
                        "damping",
                        format!("must be in [0.5, 1.0), got {damping}"),
                    ));
                }
                Self::AffinityPropagation(AffinityPropagationParams { damping })
            }
            other => {
                return Err(SegError::UnknownAlgorithm {
                    name: other.to_string(),
                })
            }
        };

        for key in raw.keys() {
            if !spec.parameter_names().contains(&key.as_str()) {
                log::debug!("{}: ignoring unrecognised parameter '{key}'", spec.id());
            }
        }
        Ok(spec)
    }

    /// Stable catalog id, as stored on the run.
    pub fn id(&self) -> &'static str {
        match self {
            Self::KMeans(_) => "kmeans",
            Self::Dbscan(_) => "dbscan",
            Self::Hierarchical(_) => "hierarchical",
            Self::Gmm(_) => "gmm",
            Self::Spectral(_) => "spectral",
            Self::Birch(_) => "birch",
            Self::MeanShift(_) => "meanshift",
            Self::AffinityPropagation(_) => "affinity_propagation",
        }
    }

    pub fn parameter_names(&self) -> &'static [&'static str] {
        match self {
            Self::KMeans(_) | Self::Hierarchical(_) | Self::Gmm(_) => &["n_clusters"],
            Self::Dbscan(_) => &["eps", "min_samples"],
            Self::Spectral(_) => &["n_clusters", "affinity"],
            Self::Birch(_) => &["n_clusters", "threshold"],
            Self::MeanShift(_) => &["bandwidth"],
            Self::AffinityPropagation(_) => &["damping"],
        }
    }

    /// Requested cluster count, for algorithms that take one.
    pub fn n_clusters(&self) -> Option<usize> {
        match self {
            Self::KMeans(p) => Some(p.n_clusters),
            Self::Hierarchical(p) => Some(p.n_clusters),
            Self::Gmm(p) => Some(p.n_clusters),
            Self::Spectral(p) => Some(p.n_clusters),
            Self::Birch(p) => Some(p.n_clusters),
            Self::Dbscan(_) | Self::MeanShift(_) | Self::AffinityPropagation(_) => None,
        }
    }

    /// The resolved parameter set as a JSON object.
    pub fn parameters(&self) -> SegResult<Value> {
        let value = match self {
            Self::KMeans(p) => serde_json::to_value(p)?,
            Self::Dbscan(p) => serde_json::to_value(p)?,
            Self::Hierarchical(p) => serde_json::to_value(p)?,
            Self::Gmm(p) => serde_json::to_value(p)?,
            Self::Spectral(p) => serde_json::to_value(p)?,
            Self::Birch(p) => serde_json::to_value(p)?,
            Self::MeanShift(p) => serde_json::to_value(p)?,
            Self::AffinityPropagation(p) => serde_json::to_value(p)?,
        };
        Ok(value)
    }
}

// ── Value parsing ───────────────────────────────────────────────────────────

/// Numbers may arrive as JSON numbers or numeric strings.
/// Absent, null and empty-string values all mean "not given".
fn number(raw: &Map<String, Value>, name: &str) -> SegResult<Option<f64>> {
    let parsed = match raw.get(name) {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().map_err(|_| {
            SegError::invalid_parameter(name, format!("'{s}' is not a number"))
        })?),
        Some(other) => {
            return Err(SegError::invalid_parameter(
                name,
                format!("expected a number, got {other}"),
            ))
        }
    };
    match parsed {
        Some(v) if !v.is_finite() => Err(SegError::invalid_parameter(name, "must be finite")),
        other => Ok(other),
    }
}

fn positive(raw: &Map<String, Value>, name: &str, default: f64) -> SegResult<f64> {
    let v = number(raw, name)?.unwrap_or(default);
    if v <= 0.0 {
        return Err(SegError::invalid_parameter(name, format!("must be > 0, got {v}")));
    }
    Ok(v)
}

fn count(raw: &Map<String, Value>, name: &str, default: usize) -> SegResult<usize> {
    match number(raw, name)? {
        None => Ok(default),
        Some(v) if v.fract() != 0.0 => Err(SegError::invalid_parameter(
            name,
            format!("must be a whole number, got {v}"),
        )),
        Some(v) if v < 1.0 => Err(SegError::invalid_parameter(
            name,
            format!("must be at least 1, got {v}"),
        )),
        Some(v) => Ok(v as usize),
    }
}

fn affinity(raw: &Map<String, Value>) -> SegResult<Affinity> {
    match raw.get("affinity") {
        None | Some(Value::Null) => Ok(Affinity::Rbf),
        Some(Value::String(s)) => match s.as_str() {
            "rbf" => Ok(Affinity::Rbf),
            "nearest_neighbors" => Ok(Affinity::NearestNeighbors),
            other => Err(SegError::invalid_parameter(
                "affinity",
                format!("unsupported affinity '{other}'"),
            )),
        },
        Some(other) => Err(SegError::invalid_parameter(
            "affinity",
            format!("expected a string, got {other}"),
        )),
    }
}
