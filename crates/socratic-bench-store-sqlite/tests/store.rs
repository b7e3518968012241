// crates/socratic-bench-store-sqlite/tests/store.rs
// ============================================================================
// Module: SQLite Index Store Tests
// Description: Verifies conditional writes and the supported query patterns.
// ============================================================================
//! ## Overview
//! Exercises the store through the core interface: conditional creates,
//! versioned writes, partition queries with sort prefixes, secondary-index
//! run lookups, and the summary scan.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use serde_json::json;
use socratic_bench_core::CasOutcome;
use socratic_bench_core::CreateOutcome;
use socratic_bench_core::IndexKey;
use socratic_bench_core::IndexRecord;
use socratic_bench_core::IndexStore;
use socratic_bench_core::Timestamp;
use socratic_bench_store_sqlite::SqliteIndexStore;
use socratic_bench_store_sqlite::SqliteStoreConfig;

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds a record with the given key parts and payload marker.
fn record(partition: &str, sort: &str, marker: u32) -> IndexRecord {
    IndexRecord {
        key: IndexKey::new(partition, sort),
        payload: json!({ "marker": marker }),
        blob_pointer: None,
        model_id: None,
        manifest_id: None,
        revision: 0,
        written_at: Timestamp::from_unix_millis(i64::from(marker)),
    }
}

/// Builds a run metadata record carrying secondary-index attributes.
fn run_meta(run_id: &str, model_id: &str, manifest_id: &str) -> IndexRecord {
    IndexRecord {
        key: IndexKey::new(format!("RUN#{run_id}"), "META"),
        payload: json!({ "run_id": run_id }),
        blob_pointer: None,
        model_id: Some(model_id.to_string()),
        manifest_id: Some(manifest_id.to_string()),
        revision: 0,
        written_at: Timestamp::from_unix_millis(0),
    }
}

// ============================================================================
// SECTION: Conditional Writes
// ============================================================================

#[test]
fn create_is_conditional_on_absence() {
    let store = SqliteIndexStore::open_in_memory().expect("store");
    let first = record("RUN#a", "TURN#000", 1);

    assert_eq!(store.create(&first).expect("first create"), CreateOutcome::Created);
    let duplicate = record("RUN#a", "TURN#000", 2);
    assert_eq!(store.create(&duplicate).expect("second create"), CreateOutcome::AlreadyExists);

    let stored = store.get(&first.key).expect("get").expect("present");
    assert_eq!(stored.payload, json!({ "marker": 1 }));
    assert_eq!(stored.revision, 1);
}

#[test]
fn put_overwrites_and_bumps_revision() {
    let store = SqliteIndexStore::open_in_memory().expect("store");
    let key = IndexKey::new("RUN#a", "META");
    store.put(&record("RUN#a", "META", 1)).expect("first put");
    store.put(&record("RUN#a", "META", 2)).expect("second put");

    let stored = store.get(&key).expect("get").expect("present");
    assert_eq!(stored.payload, json!({ "marker": 2 }));
    assert_eq!(stored.revision, 2);
}

#[test]
fn put_versioned_applies_only_on_matching_revision() {
    let store = SqliteIndexStore::open_in_memory().expect("store");
    let key = IndexKey::new("WEEK#2023-W46#MODEL#m", "SUMMARY");

    let outcome = store.put_versioned(&record("WEEK#2023-W46#MODEL#m", "SUMMARY", 1), 0)
        .expect("initial cas");
    assert_eq!(outcome, CasOutcome::Applied);

    let conflict = store.put_versioned(&record("WEEK#2023-W46#MODEL#m", "SUMMARY", 2), 0)
        .expect("stale create cas");
    assert_eq!(conflict, CasOutcome::Conflict);

    let applied = store.put_versioned(&record("WEEK#2023-W46#MODEL#m", "SUMMARY", 3), 1)
        .expect("update cas");
    assert_eq!(applied, CasOutcome::Applied);

    let stale = store.put_versioned(&record("WEEK#2023-W46#MODEL#m", "SUMMARY", 4), 1)
        .expect("stale update cas");
    assert_eq!(stale, CasOutcome::Conflict);

    let stored = store.get(&key).expect("get").expect("present");
    assert_eq!(stored.payload, json!({ "marker": 3 }));
    assert_eq!(stored.revision, 2);
}

// ============================================================================
// SECTION: Query Patterns
// ============================================================================

#[test]
fn partition_queries_order_by_sort_key() {
    let store = SqliteIndexStore::open_in_memory().expect("store");
    store.create(&record("RUN#a", "TURN#002", 2)).expect("turn 2");
    store.create(&record("RUN#a", "TURN#000", 0)).expect("turn 0");
    store.create(&record("RUN#a", "TURN#001", 1)).expect("turn 1");
    store.create(&record("RUN#a", "JUDGE#000", 10)).expect("judge 0");
    store.create(&record("RUN#b", "TURN#000", 9)).expect("other run");

    let turns = store.query_partition("RUN#a", "TURN#").expect("turns");
    let sorts: Vec<&str> = turns.iter().map(|entry| entry.key.sort_key.as_str()).collect();
    assert_eq!(sorts, vec!["TURN#000", "TURN#001", "TURN#002"]);

    assert_eq!(store.count_partition("RUN#a", "TURN#").expect("turn count"), 3);
    assert_eq!(store.count_partition("RUN#a", "JUDGE#").expect("judge count"), 1);
}

#[test]
fn secondary_indexes_list_runs_by_model_and_manifest() {
    let store = SqliteIndexStore::open_in_memory().expect("store");
    store.create(&run_meta("r1", "model-a", "mf-1")).expect("r1");
    store.create(&run_meta("r2", "model-a", "mf-2")).expect("r2");
    store.create(&run_meta("r3", "model-b", "mf-1")).expect("r3");
    store.create(&record("RUN#r1", "TURN#000", 1)).expect("turn noise");

    let by_model = store.query_runs_by_model("model-a").expect("by model");
    let partitions: Vec<&str> =
        by_model.iter().map(|entry| entry.key.partition_key.as_str()).collect();
    assert_eq!(partitions, vec!["RUN#r1", "RUN#r2"]);

    let by_manifest = store.query_runs_by_manifest("mf-1").expect("by manifest");
    let partitions: Vec<&str> =
        by_manifest.iter().map(|entry| entry.key.partition_key.as_str()).collect();
    assert_eq!(partitions, vec!["RUN#r1", "RUN#r3"]);
}

#[test]
fn scan_sort_key_lists_all_summaries() {
    let store = SqliteIndexStore::open_in_memory().expect("store");
    store.put(&record("RUN#r1", "SUMMARY", 1)).expect("s1");
    store.put(&record("RUN#r2", "SUMMARY", 2)).expect("s2");
    store.put(&record("RUN#r1", "META", 3)).expect("meta noise");

    let summaries = store.scan_sort_key("SUMMARY").expect("scan");
    assert_eq!(summaries.len(), 2);
}

// ============================================================================
// SECTION: Durability
// ============================================================================

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = SqliteStoreConfig::new(dir.path().join("index.sqlite"));
    {
        let store = SqliteIndexStore::open(&config).expect("open");
        store.create(&record("RUN#a", "META", 7)).expect("create");
    }
    let store = SqliteIndexStore::open(&config).expect("reopen");
    let stored =
        store.get(&IndexKey::new("RUN#a", "META")).expect("get").expect("present");
    assert_eq!(stored.payload, json!({ "marker": 7 }));
    store.readiness().expect("ready");
}
