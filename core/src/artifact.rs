//! Model artifact serialization: one fitted model to/from JSON.
//!
//! The artifact is self-describing: a format tag and version, the
//! algorithm id, the resolved parameters, the scaler fitted for that
//! run and the algorithm's fitted state. Reading rejects any other
//! format or version instead of guessing.

use crate::{
    clustering::{ClusteringOutcome, ModelState, StandardScaler},
    error::{SegError, SegResult},
    features::FEATURE_NAMES,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, OpenOptions},
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

pub const ARTIFACT_FORMAT: &str = "segment-model";
pub const ARTIFACT_VERSION: u32 = 1;

const MAX_NAME_ATTEMPTS: u32 = 1000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format: String,
    pub format_version: u32,
    pub algorithm: String,
    pub parameters: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub state: ModelState,
}

impl ModelArtifact {
    pub fn from_outcome(outcome: &ClusteringOutcome, created_at: DateTime<Utc>) -> SegResult<Self> {
        Ok(Self {
            format: ARTIFACT_FORMAT.to_string(),
            format_version: ARTIFACT_VERSION,
            algorithm: outcome.spec.id().to_string(),
            parameters: outcome.spec.parameters()?,
            created_at,
            feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
            scaler: outcome.scaler.clone(),
            state: outcome.state.clone(),
        })
    }

    /// `<run_name>_<algorithm>_<YYYYmmddHHMMSSmmm>.json`, with the run
    /// name reduced to filesystem-safe characters.
    pub fn file_name(run_name: &str, algorithm: &str, created_at: DateTime<Utc>) -> String {
        let safe: String = run_name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe = if safe.is_empty() { "run".to_string() } else { safe };
        format!(
            "{safe}_{algorithm}_{}.json",
            created_at.format("%Y%m%d%H%M%S%3f")
        )
    }

    /// Write into `dir`, creating it if needed. An existing file is never
    /// overwritten: a name collision gets a `-1`, `-2`, ... suffix.
    pub fn write(&self, dir: &Path, run_name: &str) -> SegResult<PathBuf> {
        fs::create_dir_all(dir)?;
        let base = Self::file_name(run_name, &self.algorithm, self.created_at);
        let stem = base.trim_end_matches(".json");
        let body = serde_json::to_vec_pretty(self)?;

        for attempt in 0..MAX_NAME_ATTEMPTS {
            let path = if attempt == 0 {
                dir.join(&base)
            } else {
                dir.join(format!("{stem}-{attempt}.json"))
            };
            let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(SegError::Persistence(format!(
                        "cannot create artifact {}: {e}",
                        path.display()
                    )))
                }
            };
            file.write_all(&body)?;
            file.sync_all()?;
            return Ok(path);
        }
        Err(SegError::Persistence(format!(
            "no free artifact name for {base} in {}",
            dir.display()
        )))
    }

    pub fn read(path: &Path) -> SegResult<Self> {
        let body = fs::read(path)?;
        let artifact: ModelArtifact = serde_json::from_slice(&body)?;
        if artifact.format != ARTIFACT_FORMAT || artifact.format_version != ARTIFACT_VERSION {
            return Err(SegError::Persistence(format!(
                "{}: unsupported artifact format {} v{}",
                path.display(),
                artifact.format,
                artifact.format_version
            )));
        }
        Ok(artifact)
    }
}
