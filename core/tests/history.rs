//! Run history: listing, lookup, deletion, cluster members, data overview.

use chrono::{Duration, TimeZone, Utc};
use segment_core::{
    clock::ReferenceClock,
    config::PipelineConfig,
    demo_data,
    error::{ErrorKind, SegError},
    features::TransactionRecord,
    pipeline::{Pipeline, RunRequest},
    store::SegStore,
    types::RunId,
};
use std::path::Path;

// ── Helpers ──────────────────────────────────────────────────────────────────

const NOW: i64 = 1_717_200_000;

fn demo_pipeline(model_dir: &tempfile::TempDir, clock: ReferenceClock) -> Pipeline {
    let store = SegStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    demo_data::seed_demo_transactions(&store, 40, 9, Utc.timestamp_opt(NOW, 0).unwrap())
        .expect("demo data");
    let config = PipelineConfig::default_test(&model_dir.path().to_string_lossy());
    Pipeline::with_clock(store, config, clock)
}

fn saved_run(p: &Pipeline, algorithm: &str, name: &str) -> RunId {
    p.run_pipeline(&RunRequest::new(algorithm, name).save(true))
        .expect("run")
        .run_id
        .expect("saved")
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn runs_are_listed_newest_first_with_counts() {
    let dir = tempfile::tempdir().unwrap();
    let p = demo_pipeline(&dir, ReferenceClock::fixed_at(NOW));
    let first = saved_run(&p, "kmeans", "first");
    let second = saved_run(&p, "hierarchical", "second");

    let runs = p.list_runs().unwrap();
    assert_eq!(runs.len(), 2);
    // Same created_at: the later insert still sorts first.
    assert_eq!(runs[0].run.run_id, second);
    assert_eq!(runs[1].run.run_id, first);
    assert!(runs.iter().all(|r| r.customer_count == 40));

    let json = serde_json::to_value(&runs[0]).unwrap();
    assert_eq!(json["run_name"], "second");
    assert_eq!(json["customer_count"], 40);
}

#[test]
fn get_run_returns_the_recorded_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let p = demo_pipeline(&dir, ReferenceClock::fixed_at(NOW));
    let run_id = saved_run(&p, "gmm", "mixture");

    let run = p.get_run(run_id).unwrap();
    assert_eq!(run.algorithm, "gmm");
    assert_eq!(run.parameters["n_clusters"], 3);
    assert!(run.model_artifact.is_some());

    let err = p.get_run(run_id + 100).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn delete_removes_run_assignments_and_artifact() {
    let dir = tempfile::tempdir().unwrap();
    let p = demo_pipeline(&dir, ReferenceClock::fixed_at(NOW));
    let keep = saved_run(&p, "kmeans", "keep");
    let doomed = saved_run(&p, "kmeans", "doomed");
    let artifact = p.get_run(doomed).unwrap().model_artifact.unwrap();
    assert!(Path::new(&artifact).exists());

    p.delete_run(doomed).expect("delete");

    assert!(matches!(p.get_run(doomed), Err(SegError::RunNotFound { .. })));
    assert!(p.store().assignments(doomed).unwrap().is_empty());
    assert!(!Path::new(&artifact).exists());
    assert_eq!(p.list_runs().unwrap().len(), 1);
    assert_eq!(p.store().assignments(keep).unwrap().len(), 40);

    let err = p.delete_run(doomed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn delete_tolerates_a_missing_artifact_file() {
    let dir = tempfile::tempdir().unwrap();
    let p = demo_pipeline(&dir, ReferenceClock::fixed_at(NOW));
    let run_id = saved_run(&p, "kmeans", "gone");
    let artifact = p.get_run(run_id).unwrap().model_artifact.unwrap();
    std::fs::remove_file(&artifact).unwrap();

    p.delete_run(run_id).expect("delete without artifact");
    assert_eq!(p.store().run_count().unwrap(), 0);
}

#[test]
fn cluster_members_are_sorted_by_lifetime_spend() {
    let dir = tempfile::tempdir().unwrap();
    let p = demo_pipeline(&dir, ReferenceClock::fixed_at(NOW));
    let run_id = saved_run(&p, "kmeans", "members");

    let mut seen = 0;
    for stats in p.store().cluster_stats(run_id).unwrap() {
        let members = p.cluster_customers(run_id, stats.cluster_label).unwrap();
        assert_eq!(members.len() as i64, stats.customer_count);
        assert!(!members.is_empty());
        assert!(members.windows(2).all(|w| w[0].total_spend >= w[1].total_spend));
        assert!(members.iter().all(|m| m.name.is_some()));
        seen += members.len();
    }
    assert_eq!(seen, 40);

    assert!(p.cluster_customers(run_id, 99).unwrap().is_empty());
    let err = p.cluster_customers(run_id + 1, 0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn data_overview_matches_inserted_history() {
    let store = SegStore::in_memory().unwrap();
    store.migrate().unwrap();
    let now = Utc.timestamp_opt(NOW, 0).unwrap();
    let rows = [
        ("A", 10.0, 40, Some("toys")),
        ("A", 30.0, 5, None),
        ("B", 20.0, 2, Some("toys")),
        ("B", 40.0, 1, Some("garden")),
    ];
    for (customer, amount, days_ago, category) in rows {
        store.upsert_customer(customer, None, now).unwrap();
        store
            .insert_transaction(&TransactionRecord {
                customer_id: customer.into(),
                amount,
                occurred_at: now - Duration::days(days_ago),
                category: category.map(Into::into),
                order_id: None,
            })
            .unwrap();
    }
    let p = Pipeline::with_clock(store, PipelineConfig::default(), ReferenceClock::fixed_at(NOW));

    let summary = p.data_summary().unwrap();
    assert_eq!(summary.total_customers, 2);
    assert_eq!(summary.total_transactions, 4);
    assert_eq!(summary.total_revenue, 100.0);
    assert_eq!(summary.avg_transaction_value, 25.0);
    assert_eq!(summary.missing_categories, 1);
    assert_eq!(summary.first_transaction, Some(now - Duration::days(40)));
    assert_eq!(summary.last_transaction, Some(now - Duration::days(1)));

    let categories = p.category_breakdown().unwrap();
    assert_eq!(categories[0], ("toys".to_string(), 2));
    assert!(categories.contains(&("Uncategorized".to_string(), 1)));

    let months = p.monthly_revenue().unwrap();
    assert_eq!(months, vec![("2024-04".to_string(), 10.0), ("2024-05".to_string(), 90.0)]);
}
