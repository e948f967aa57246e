// runlog-store-sqlite/tests/store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SqliteStore behavior against the Store contract.
// Purpose: Ensure durable persistence, content-addressed dedup, sequence
//          assignment, and write contention signaling all hold against a
//          real on-disk database.
// Dependencies: runlog-store-sqlite, runlog-core, tempfile
// ============================================================================

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::missing_docs_in_private_items,
    clippy::missing_panics_doc,
    missing_docs,
    reason = "Test-only assertions and helpers are permitted."
)]

use runlog_core::Actor;
use runlog_core::Artifact;
use runlog_core::Event;
use runlog_core::Id;
use runlog_core::Pins;
use runlog_core::Privacy;
use runlog_core::Run;
use runlog_core::RunId;
use runlog_core::RunMetrics;
use runlog_core::RunStatus;
use runlog_core::Store;
use runlog_core::StoreError;
use runlog_core::ThreadId;
use runlog_core::Timestamp;
use runlog_core::UserId;
use runlog_store_sqlite::SqliteStore;
use runlog_store_sqlite::SqliteStoreConfig;
use tempfile::TempDir;

fn open_store() -> (TempDir, SqliteStore) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("runlog.sqlite3");
    let store = SqliteStore::new(SqliteStoreConfig::new(path)).expect("open store");
    (dir, store)
}

fn fresh_run(store: &SqliteStore, raw: u128) -> Run {
    let run = Run {
        run_id: RunId::new(Id::from_raw(raw)),
        thread_id: ThreadId::new(Id::from_raw(raw + 1)),
        status: RunStatus::Running,
        created_by_user_id: UserId::new(Id::from_raw(raw + 2)),
        pins: Pins::default(),
        created_at: Timestamp::from_millis(1_000),
    };
    store.create_run(run).expect("create run")
}

#[test]
fn create_and_fetch_run_round_trips() {
    let (_dir, store) = open_store();
    let run = fresh_run(&store, 1);
    let fetched = store.get_run(run.run_id).expect("get run");
    assert_eq!(fetched.run_id, run.run_id);
    assert_eq!(fetched.status, RunStatus::Running);
    let metrics = store.get_run_metrics(run.run_id).expect("get metrics");
    assert_eq!(metrics.event_count, 0);
}

#[test]
fn get_run_missing_is_not_found() {
    let (_dir, store) = open_store();
    let err = store.get_run(RunId::new(Id::from_raw(9999))).unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[test]
fn begin_run_write_assigns_increasing_seq_and_commits() {
    let (_dir, store) = open_store();
    let run = fresh_run(&store, 10);

    let tx = store.begin_run_write(run.run_id).expect("begin write 1");
    assert_eq!(tx.current_seq(), 0);
    let next_seq = tx.current_seq() + 1;
    let event = Event {
        event_id: runlog_core::EventId::new(Id::from_raw(20)),
        run_id: run.run_id,
        thread_id: run.thread_id,
        project_id: None,
        seq: next_seq,
        ts: Timestamp::from_millis(2_000),
        kind: "user_message".to_string(),
        payload: serde_json::json!({"text": "hi"}),
        parent_event_id: None,
        correlation_id: None,
        actor: Actor::User,
        privacy: Privacy::Standard,
        pins: Pins::default(),
    };
    let mut metrics = tx.current_metrics();
    metrics.event_count += 1;
    let committed = tx.commit(event, metrics).expect("commit");
    assert_eq!(committed.seq, 1);

    let tx2 = store.begin_run_write(run.run_id).expect("begin write 2");
    assert_eq!(tx2.current_seq(), 1);
    assert_eq!(tx2.current_metrics().event_count, 1);
    drop(tx2);

    let events = store.list_events(run.run_id, 0).expect("list events");
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].seq, 1);
}

#[test]
fn dropped_transaction_rolls_back_without_committing() {
    let (_dir, store) = open_store();
    let run = fresh_run(&store, 30);

    {
        let tx = store.begin_run_write(run.run_id).expect("begin write");
        drop(tx);
    }

    assert_eq!(store.run_last_seq(run.run_id).expect("last seq"), 0);
    let tx = store.begin_run_write(run.run_id).expect("begin write after rollback");
    assert_eq!(tx.current_seq(), 0);
}

#[test]
fn put_artifact_dedups_by_content_hash() {
    let (_dir, store) = open_store();
    let created_by = UserId::new(Id::from_raw(40));
    let artifact = Artifact {
        artifact_id: runlog_core::ArtifactId::new(Id::from_raw(41)),
        kind: "document".to_string(),
        media_type: "text/plain".to_string(),
        size: 3,
        content_hash: "deadbeef".to_string(),
        storage_ref: "blob://one".to_string(),
        created_by,
    };
    let first = store.put_artifact(artifact.clone()).expect("put artifact");
    let mut duplicate = artifact;
    duplicate.artifact_id = runlog_core::ArtifactId::new(Id::from_raw(42));
    duplicate.storage_ref = "blob://two".to_string();
    let second = store.put_artifact(duplicate).expect("put duplicate artifact");
    assert_eq!(first.artifact_id, second.artifact_id);
    assert_eq!(second.storage_ref, "blob://one");
}

#[test]
fn notifications_get_increasing_per_user_sequence() {
    let (_dir, store) = open_store();
    let user_id = UserId::new(Id::from_raw(50));
    for i in 0..3u128 {
        let notification = runlog_core::Notification {
            notification_id: runlog_core::NotificationId::new(Id::from_raw(51 + i)),
            notification_seq: 0,
            user_id,
            kind: "tool_error".to_string(),
            payload: serde_json::json!({"i": i}),
            project_id: None,
            run_id: None,
            read_at: None,
        };
        let stored = store.append_notification(notification).expect("append notification");
        assert_eq!(stored.notification_seq, u64::try_from(i + 1).expect("seq fits"));
    }
    let all = store.list_notifications(user_id, false, 0).expect("list notifications");
    assert_eq!(all.len(), 3);
}

#[test]
fn counters_accumulate_across_calls() {
    let (_dir, store) = open_store();
    assert_eq!(store.increment_counter("events_committed", 1).expect("incr"), 1);
    assert_eq!(store.increment_counter("events_committed", 4).expect("incr"), 5);
}

#[test]
fn reopening_existing_database_preserves_schema_and_data() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("runlog.sqlite3");
    let run_id;
    {
        let store = SqliteStore::new(SqliteStoreConfig::new(path.clone())).expect("open store");
        let run = fresh_run(&store, 60);
        run_id = run.run_id;
    }
    let store = SqliteStore::new(SqliteStoreConfig::new(path)).expect("reopen store");
    let run = store.get_run(run_id).expect("get run after reopen");
    assert_eq!(run.status, RunStatus::Running);
}
