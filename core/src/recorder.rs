//! Run recorder: optionally persist a clustering outcome.
//!
//! ORDER:
//!   1. Serialize the model artifact to the model store directory.
//!   2. Insert the run row and every assignment in one transaction.
//!   3. If step 2 fails, remove the artifact written in step 1.
//!
//! With `save = false` nothing touches the store or the filesystem.

use crate::{
    artifact::ModelArtifact,
    clustering::ClusteringOutcome,
    error::SegResult,
    store::{NewRun, SegStore},
    types::RunId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordedRun {
    pub run_id: Option<RunId>,
    pub saved: bool,
    pub model_artifact: Option<String>,
}

impl RecordedRun {
    pub fn unsaved() -> Self {
        Self {
            run_id: None,
            saved: false,
            model_artifact: None,
        }
    }
}

pub struct RunRecorder<'a> {
    store: &'a SegStore,
    model_store_dir: &'a Path,
}

impl<'a> RunRecorder<'a> {
    pub fn new(store: &'a SegStore, model_store_dir: &'a Path) -> Self {
        Self {
            store,
            model_store_dir,
        }
    }

    pub fn record(
        &self,
        outcome: &ClusteringOutcome,
        run_name: &str,
        save: bool,
        created_at: DateTime<Utc>,
    ) -> SegResult<RecordedRun> {
        if !save {
            log::debug!("run={run_name} {}: not saved", outcome.spec.id());
            return Ok(RecordedRun::unsaved());
        }

        let artifact = ModelArtifact::from_outcome(outcome, created_at)?;
        let path = artifact.write(self.model_store_dir, run_name)?;
        let location = path.to_string_lossy().into_owned();

        let parameters = outcome.spec.parameters()?;
        let new_run = NewRun {
            run_name,
            algorithm: outcome.spec.id(),
            parameters: &parameters,
            created_at,
            model_artifact: Some(&location),
        };

        match self
            .store
            .insert_run_with_assignments(&new_run, outcome.assignments())
        {
            Ok(run_id) => {
                log::info!(
                    "run={run_name} {}: saved as run {run_id} with {} assignments",
                    outcome.spec.id(),
                    outcome.labels.len()
                );
                Ok(RecordedRun {
                    run_id: Some(run_id),
                    saved: true,
                    model_artifact: Some(location),
                })
            }
            Err(e) => {
                if let Err(rm) = std::fs::remove_file(&path) {
                    log::warn!("run={run_name}: could not remove orphan artifact {location}: {rm}");
                }
                log::warn!("run={run_name} {}: not saved: {e}", outcome.spec.id());
                Err(e)
            }
        }
    }
}
