//! Run recording: all-or-nothing persistence and model artifacts.

use chrono::{Duration, TimeZone, Utc};
use segment_core::{
    artifact::{ModelArtifact, ARTIFACT_VERSION},
    clustering::{AlgorithmSpec, ClusteringEngine, ClusteringOutcome},
    config::PipelineConfig,
    error::ErrorKind,
    features::{FeatureBuilder, FeatureOutcome, TransactionRecord},
    recorder::RunRecorder,
    store::SegStore,
};
use serde_json::Map;
use std::path::Path;

// ── Helpers ──────────────────────────────────────────────────────────────────

const NOW: i64 = 1_717_200_000;

fn store() -> SegStore {
    let store = SegStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn records(customers: &[&str]) -> Vec<TransactionRecord> {
    let now = Utc.timestamp_opt(NOW, 0).unwrap();
    customers
        .iter()
        .enumerate()
        .flat_map(|(i, c)| {
            (0..=i).map(move |k| TransactionRecord {
                customer_id: c.to_string(),
                amount: 10.0 * (i + 1) as f64 + k as f64,
                occurred_at: now - Duration::days((3 * i + k) as i64),
                category: Some(format!("cat-{k}")),
                order_id: None,
            })
        })
        .collect()
}

fn outcome_for(recs: &[TransactionRecord]) -> ClusteringOutcome {
    let FeatureOutcome::Built(features) =
        FeatureBuilder::new(Utc.timestamp_opt(NOW, 0).unwrap()).build_from_records(recs)
    else {
        panic!("expected features");
    };
    let spec = AlgorithmSpec::resolve("hierarchical", &Map::new()).unwrap();
    ClusteringEngine::new(&PipelineConfig::default())
        .cluster(&features, &spec)
        .expect("cluster")
}

fn register(store: &SegStore, customers: &[&str]) {
    for c in customers {
        store
            .upsert_customer(c, Some("Test Customer"), Utc.timestamp_opt(NOW, 0).unwrap())
            .unwrap();
    }
}

fn files_in(dir: &Path) -> usize {
    std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn saved_run_has_one_assignment_per_customer_and_an_artifact() {
    let s = store();
    let customers = ["A", "B", "C", "D", "E"];
    register(&s, &customers);
    let outcome = outcome_for(&records(&customers));
    let dir = tempfile::tempdir().unwrap();

    let at = Utc.timestamp_opt(NOW, 0).unwrap();
    let recorded = RunRecorder::new(&s, dir.path())
        .record(&outcome, "weekly", true, at)
        .expect("record");

    assert!(recorded.saved);
    let run_id = recorded.run_id.expect("run id");
    let assignments = s.assignments(run_id).unwrap();
    assert_eq!(assignments.len(), customers.len());

    let location = recorded.model_artifact.expect("artifact path");
    assert!(location.ends_with("weekly_hierarchical_20240601000000000.json"));
    let artifact = ModelArtifact::read(Path::new(&location)).expect("artifact readable");
    assert_eq!(artifact.algorithm, "hierarchical");
    assert_eq!(artifact.format_version, ARTIFACT_VERSION);
    assert_eq!(artifact.parameters, serde_json::json!({ "n_clusters": 3 }));
    assert_eq!(artifact.feature_names.len(), 5);

    let run = s.get_run(run_id).unwrap().expect("run row");
    assert_eq!(run.model_artifact.as_deref(), Some(location.as_str()));
}

#[test]
fn unsaved_run_touches_nothing() {
    let s = store();
    let customers = ["A", "B", "C"];
    register(&s, &customers);
    let outcome = outcome_for(&records(&customers));
    let dir = tempfile::tempdir().unwrap();
    let model_dir = dir.path().join("models");

    let recorded = RunRecorder::new(&s, &model_dir)
        .record(&outcome, "dry", false, Utc::now())
        .unwrap();

    assert_eq!(recorded.run_id, None);
    assert!(!recorded.saved);
    assert_eq!(s.run_count().unwrap(), 0);
    assert!(!model_dir.exists());
}

#[test]
fn failing_assignment_leaves_no_run_and_no_artifact() {
    let s = store();
    // "ghost" has transactions but no customer row, so its assignment
    // violates the foreign key after the run row was inserted.
    register(&s, &["A", "B", "C"]);
    let outcome = outcome_for(&records(&["A", "B", "C", "ghost"]));
    let dir = tempfile::tempdir().unwrap();

    let err = RunRecorder::new(&s, dir.path())
        .record(&outcome, "broken", true, Utc::now())
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Persistence);
    assert_eq!(s.run_count().unwrap(), 0);
    assert!(s.list_runs().unwrap().is_empty());
    assert_eq!(files_in(dir.path()), 0);
}

#[test]
fn artifact_names_never_collide() {
    let s = store();
    let customers = ["A", "B", "C"];
    register(&s, &customers);
    let outcome = outcome_for(&records(&customers));
    let dir = tempfile::tempdir().unwrap();
    let at = Utc.timestamp_opt(NOW, 0).unwrap();
    let recorder = RunRecorder::new(&s, dir.path());

    let a = recorder.record(&outcome, "same", true, at).unwrap();
    let b = recorder.record(&outcome, "same", true, at).unwrap();

    assert_ne!(a.model_artifact, b.model_artifact);
    assert_ne!(a.run_id, b.run_id);
    assert_eq!(files_in(dir.path()), 2);
}

#[test]
fn artifact_with_unknown_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("old.json");
    std::fs::write(
        &path,
        r#"{"format":"segment-model","format_version":99,"algorithm":"kmeans","parameters":{},
            "created_at":"2024-06-01T00:00:00Z","feature_names":[],
            "scaler":{"mean":[],"scale":[]},"state":{"kind":"centroids","centroids":[]}}"#,
    )
    .unwrap();
    let err = ModelArtifact::read(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Persistence);
}

#[test]
fn second_connection_sees_only_committed_runs() {
    let dir = tempfile::tempdir().unwrap();
    let db = dir.path().join("segments.db");
    let writer = SegStore::open(&db.to_string_lossy()).unwrap();
    writer.migrate().unwrap();
    let reader = writer.reopen().unwrap();

    let customers = ["A", "B", "C"];
    register(&writer, &customers);
    for r in records(&customers) {
        writer.insert_transaction(&r).unwrap();
    }
    assert_eq!(reader.transaction_count().unwrap(), 6);

    let outcome = outcome_for(&records(&["A", "B", "C", "ghost"]));
    let models = dir.path().join("models");
    RunRecorder::new(&writer, &models)
        .record(&outcome, "broken", true, Utc::now())
        .unwrap_err();
    assert_eq!(reader.run_count().unwrap(), 0);

    let outcome = outcome_for(&records(&customers));
    let recorded = RunRecorder::new(&writer, &models)
        .record(&outcome, "ok", true, Utc::now())
        .unwrap();
    let run_id = recorded.run_id.unwrap();
    assert_eq!(reader.assignments(run_id).unwrap().len(), 3);
}
