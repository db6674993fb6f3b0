//! End-to-end runs: features, clustering and recording through Pipeline.

use chrono::{Duration, NaiveDate, TimeZone, Utc};
use segment_core::{
    clock::ReferenceClock,
    config::PipelineConfig,
    error::{ErrorKind, SegError},
    features::TransactionRecord,
    pipeline::{Pipeline, RunRequest},
    store::SegStore,
    types::ClusterLabel,
};
use std::collections::BTreeMap;

// ── Helpers ──────────────────────────────────────────────────────────────────

const NOW: i64 = 1_717_200_000;

/// Four customers, every purchase on the same day in one category:
/// only spend and frequency tell them apart.
fn four_customer_pipeline(model_dir: &tempfile::TempDir) -> Pipeline {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = SegStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    let now = Utc.timestamp_opt(NOW, 0).unwrap();
    let day = now - Duration::days(2);

    for (customer, spend, frequency) in [("A", 100.0, 2), ("B", 300.0, 4), ("C", 1500.0, 12), ("D", 50.0, 1)] {
        store.upsert_customer(customer, Some(customer), now - Duration::days(90)).unwrap();
        for _ in 0..frequency {
            store
                .insert_transaction(&TransactionRecord {
                    customer_id: customer.into(),
                    amount: spend / frequency as f64,
                    occurred_at: day,
                    category: Some("grocery".into()),
                    order_id: None,
                })
                .unwrap();
        }
    }

    let config = PipelineConfig::default_test(&model_dir.path().to_string_lossy());
    Pipeline::with_clock(store, config, ReferenceClock::fixed_at(NOW))
}

fn label_map(pipeline: &Pipeline, run_id: i64) -> BTreeMap<String, ClusterLabel> {
    pipeline.store().assignments(run_id).unwrap().into_iter().collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn kmeans_separates_the_big_spender() {
    let dir = tempfile::tempdir().unwrap();
    let p = four_customer_pipeline(&dir);
    let request = RunRequest::new("kmeans", "four").param("n_clusters", 2).save(true);

    let result = p.run_pipeline(&request).expect("run");
    assert!(result.saved);
    assert_eq!(result.customer_count, 4);
    assert_eq!(result.per_cluster_counts.len(), 2);
    assert_eq!(result.per_cluster_counts.values().sum::<usize>(), 4);

    let labels = label_map(&p, result.run_id.expect("run id"));
    assert_eq!(labels.len(), 4);
    assert_ne!(labels["C"], labels["A"]);
    assert_ne!(labels["C"], labels["D"]);

    let c_means = &result.per_cluster_feature_means[&labels["C"]];
    assert!(c_means.monetary >= 1500.0 / 2.0);
}

#[test]
fn unknown_algorithm_creates_no_run() {
    let dir = tempfile::tempdir().unwrap();
    let p = four_customer_pipeline(&dir);
    let err = p
        .run_pipeline(&RunRequest::new("foo", "bad").save(true))
        .unwrap_err();
    assert!(matches!(err, SegError::UnknownAlgorithm { .. }));
    assert_eq!(err.kind(), ErrorKind::CallerInput);
    assert_eq!(p.store().run_count().unwrap(), 0);
    assert!(p.list_runs().unwrap().is_empty());
}

#[test]
fn unsaved_run_still_reports_counts_and_means() {
    let dir = tempfile::tempdir().unwrap();
    let p = four_customer_pipeline(&dir);
    let result = p
        .run_pipeline(&RunRequest::new("hierarchical", "preview").param("n_clusters", 2))
        .expect("run");

    assert_eq!(result.run_id, None);
    assert!(!result.saved);
    assert_eq!(result.model_artifact, None);
    assert_eq!(result.per_cluster_counts.values().sum::<usize>(), 4);
    assert_eq!(result.per_cluster_feature_means.len(), 2);
    assert_eq!(p.store().run_count().unwrap(), 0);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn parameters_come_back_resolved() {
    let dir = tempfile::tempdir().unwrap();
    let p = four_customer_pipeline(&dir);
    let result = p
        .run_pipeline(&RunRequest::new("dbscan", "density").param("eps", "0.8"))
        .unwrap();
    assert_eq!(result.algorithm, "dbscan");
    assert_eq!(result.parameters["eps"], 0.8);
    assert_eq!(result.parameters["min_samples"], 5);
}

#[test]
fn bad_parameter_is_rejected_before_any_work() {
    let dir = tempfile::tempdir().unwrap();
    let p = four_customer_pipeline(&dir);
    let err = p
        .run_pipeline(&RunRequest::new("kmeans", "bad").param("n_clusters", 0).save(true))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::CallerInput);
    assert_eq!(p.store().run_count().unwrap(), 0);
}

#[test]
fn date_window_rules() {
    let dir = tempfile::tempdir().unwrap();
    let p = four_customer_pipeline(&dir);

    let early = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    let late = NaiveDate::from_ymd_opt(2020, 12, 31).unwrap();

    let inverted = RunRequest::new("kmeans", "inverted").between(Some(late), Some(early));
    let err = p.run_pipeline(&inverted).unwrap_err();
    assert!(matches!(err, SegError::InvalidInput(_)));

    let empty = RunRequest::new("kmeans", "empty").between(Some(early), Some(late));
    let err = p.run_pipeline(&empty).unwrap_err();
    assert!(matches!(err, SegError::NoData(_)));
    assert_eq!(err.kind(), ErrorKind::CallerInput);

    // The purchase day itself is inside an inclusive one-day window.
    let day = (Utc.timestamp_opt(NOW, 0).unwrap() - Duration::days(2)).date_naive();
    let exact = RunRequest::new("kmeans", "exact")
        .param("n_clusters", 2)
        .between(Some(day), Some(day));
    assert_eq!(p.run_pipeline(&exact).unwrap().customer_count, 4);
}

#[test]
fn saved_run_is_visible_in_history() {
    let dir = tempfile::tempdir().unwrap();
    let p = four_customer_pipeline(&dir);
    let result = p
        .run_pipeline(&RunRequest::new("birch", "tree").param("n_clusters", 2).save(true))
        .unwrap();
    let run = p.get_run(result.run_id.unwrap()).unwrap();
    assert_eq!(run.run_name, "tree");
    assert_eq!(run.algorithm, "birch");
    assert_eq!(run.parameters, result.parameters);
    assert_eq!(run.created_at, Utc.timestamp_opt(NOW, 0).unwrap());
    assert_eq!(run.model_artifact, result.model_artifact);
}
