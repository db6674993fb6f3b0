//! Stored RLFM snapshot: idempotent recompute, paging, empty history.

use chrono::{Duration, TimeZone, Utc};
use segment_core::{
    clock::ReferenceClock,
    config::PipelineConfig,
    demo_data,
    error::{ErrorKind, SegError},
    features::{CustomerFeatureVector, TransactionRecord},
    pipeline::Pipeline,
    snapshot,
    store::SegStore,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

const NOW: i64 = 1_717_200_000;

fn store() -> SegStore {
    let store = SegStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn demo_pipeline(customers: usize) -> Pipeline {
    let s = store();
    let clock = ReferenceClock::fixed_at(NOW);
    demo_data::seed_demo_transactions(&s, customers, 5, clock.now()).expect("demo data");
    Pipeline::with_clock(s, PipelineConfig::default(), clock)
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn recompute_twice_gives_identical_snapshot() {
    let p = demo_pipeline(30);
    let first_count = p.recompute_rlfm_snapshot().expect("first recompute");
    let first = p.rlfm_snapshot(0, 1_000).unwrap();

    let second_count = p.recompute_rlfm_snapshot().expect("second recompute");
    let second = p.rlfm_snapshot(0, 1_000).unwrap();

    assert_eq!(first_count, 30);
    assert_eq!(first_count, second_count);
    assert_eq!(first.total, second.total);
    assert_eq!(first.rows, second.rows);
}

#[test]
fn snapshot_replaces_rather_than_appends() {
    let s = store();
    let now = Utc.timestamp_opt(NOW, 0).unwrap();
    for (customer, amount) in [("A", 10.0), ("B", 20.0)] {
        s.upsert_customer(customer, None, now).unwrap();
        s.insert_transaction(&TransactionRecord {
            customer_id: customer.into(),
            amount,
            occurred_at: now - Duration::days(3),
            category: None,
            order_id: None,
        })
        .unwrap();
    }
    assert_eq!(snapshot::recompute(&s, now).unwrap(), 2);

    s.upsert_customer("C", None, now).unwrap();
    s.insert_transaction(&TransactionRecord {
        customer_id: "C".into(),
        amount: 5.0,
        occurred_at: now - Duration::days(1),
        category: Some("toys".into()),
        order_id: None,
    })
    .unwrap();
    let later = now + Duration::days(1);
    assert_eq!(snapshot::recompute(&s, later).unwrap(), 3);

    let page = snapshot::page(&s, 0, 10).unwrap();
    assert_eq!(page.total, 3);
    assert!(page.rows.iter().all(|r| r.computed_at == later));
    let a = &page.rows[0];
    assert_eq!(a.customer_id, "A");
    assert_eq!(a.recency, 4);
    assert_eq!(a.monetary, 10.0);
    assert_eq!(a.variety, 0);
}

#[test]
fn empty_history_is_no_data_and_keeps_old_snapshot() {
    let s = store();
    let now = Utc.timestamp_opt(NOW, 0).unwrap();
    let earlier = now - Duration::days(7);
    s.upsert_customer("A", None, earlier).unwrap();
    let stored = CustomerFeatureVector {
        customer_id: "A".into(),
        monetary: 42.0,
        recency: 3,
        length: 10,
        frequency: 2,
        variety: 1,
    };
    assert_eq!(s.replace_rlfm_snapshot(&[stored], earlier).unwrap(), 1);

    let err = snapshot::recompute(&s, now).unwrap_err();
    assert!(matches!(err, SegError::NoData(_)));
    assert_eq!(err.kind(), ErrorKind::CallerInput);

    let page = snapshot::page(&s, 0, 10).unwrap();
    assert_eq!(page.total, 1);
    let row = &page.rows[0];
    assert_eq!(row.customer_id, "A");
    assert_eq!(row.monetary, 42.0);
    assert_eq!(row.frequency, 2);
    assert_eq!(row.computed_at, earlier);
}

#[test]
fn pages_walk_the_snapshot_in_customer_order() {
    let p = demo_pipeline(12);
    p.recompute_rlfm_snapshot().unwrap();

    let first = p.rlfm_snapshot(0, 5).unwrap();
    let second = p.rlfm_snapshot(5, 5).unwrap();
    let last = p.rlfm_snapshot(10, 5).unwrap();

    assert_eq!(first.total, 12);
    assert_eq!(first.rows.len(), 5);
    assert_eq!(second.rows.len(), 5);
    assert_eq!(last.rows.len(), 2);
    assert!(first.rows[4].customer_id < second.rows[0].customer_id);
    assert!(p.rlfm_snapshot(50, 5).unwrap().rows.is_empty());
}
