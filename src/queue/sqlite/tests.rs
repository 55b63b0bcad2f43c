//! SQLite persistence tests.

use super::*;
use serde_json::json;
use std::time::Duration;
use tempfile::NamedTempFile;

/// Helper to create a test SQLite storage with temp file.
fn create_test_storage() -> (SqliteStorage, NamedTempFile) {
    let temp_file = NamedTempFile::new().expect("Failed to create temp file");
    let config = SqliteConfig {
        path: temp_file.path().to_path_buf(),
        wal_mode: true,
        synchronous: 0, // OFF for test speed
        cache_size: -2000,
        busy_timeout: Duration::from_secs(1),
    };
    let storage = SqliteStorage::open(&config).expect("Failed to create storage");
    storage.migrate().expect("Failed to migrate");
    (storage, temp_file)
}

/// Helper to create a test item.
fn create_test_item(job_id: &str, priority: i64) -> QueueItem {
    QueueItem::new(job_id, priority, json!({"job": job_id})).with_workflow("wf-a", "Workflow A")
}

#[test]
fn test_sqlite_storage_creation() {
    let (storage, _temp) = create_test_storage();
    assert!(storage.path.exists());
}

#[test]
fn test_sqlite_migrate_is_idempotent() {
    let (storage, _temp) = create_test_storage();
    storage.migrate().expect("Second migrate failed");
    storage.migrate().expect("Third migrate failed");
}

#[test]
fn test_sqlite_upsert_and_first_pending() {
    let (storage, _temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("a", 5)).unwrap();
    storage.upsert_pending(&create_test_item("b", 3)).unwrap();
    storage.upsert_pending(&create_test_item("c", 10)).unwrap();

    let first = storage.first_pending().unwrap().expect("No pending row");
    assert_eq!(first.job_id, "b");
    assert_eq!(first.priority, 3);
    assert_eq!(first.status, JobStatus::Pending);
    assert_eq!(first.name.as_deref(), Some("Workflow A"));
    assert_eq!(first.workflow_id.as_deref(), Some("wf-a"));
    assert_eq!(first.item.spec, json!({"job": "b"}));
}

#[test]
fn test_sqlite_priority_ties_use_insertion_order() {
    let (storage, _temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("first", 1)).unwrap();
    storage.upsert_pending(&create_test_item("second", 1)).unwrap();

    let first = storage.first_pending().unwrap().unwrap();
    assert_eq!(first.job_id, "first");
}

#[test]
fn test_sqlite_upsert_keeps_row_id() {
    let (storage, _temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("a", 5)).unwrap();
    let before = storage.first_pending().unwrap().unwrap();

    storage.upsert_pending(&create_test_item("a", 2)).unwrap();
    let after = storage.first_pending().unwrap().unwrap();

    assert_eq!(before.id, after.id);
    assert_eq!(after.priority, 2);
    assert_eq!(storage.count_remaining().unwrap(), 1);
}

#[test]
fn test_sqlite_status_transitions() {
    let (storage, _temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("a", 1)).unwrap();

    // Finishing a pending row is a no-op
    assert_eq!(storage.mark_finished("a").unwrap(), 0);

    assert_eq!(storage.mark_running("a").unwrap(), 1);
    assert_eq!(storage.mark_running("a").unwrap(), 0);
    assert!(storage.first_pending().unwrap().is_none());
    assert_eq!(storage.count_remaining().unwrap(), 1);

    assert_eq!(storage.mark_finished("a").unwrap(), 1);
    assert_eq!(storage.count_remaining().unwrap(), 0);
    assert_eq!(
        storage
            .count_scope(Scope::Completed, &QueueFilter::default())
            .unwrap(),
        1
    );
}

#[test]
fn test_sqlite_updated_at_touched_by_trigger() {
    let (storage, _temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("a", 1)).unwrap();
    let before = storage.first_pending().unwrap().unwrap();

    std::thread::sleep(Duration::from_millis(20));
    storage.mark_running("a").unwrap();

    let entries = storage
        .list_scope(Scope::Queue, &QueueFilter::default())
        .unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].status, JobStatus::Running);
    assert!(entries[0].updated_at > before.updated_at);
    assert_eq!(entries[0].created_at, before.created_at);
}

#[test]
fn test_sqlite_insert_ignore_batch() {
    let (storage, _temp) = create_test_storage();
    let items: Vec<QueueItem> = (1..=5)
        .map(|i| create_test_item(&format!("job-{}", i), i))
        .collect();

    let inserted = storage
        .insert_ignore_batch(&items, JobStatus::Pending)
        .unwrap();
    assert_eq!(inserted, 5);

    let inserted = storage
        .insert_ignore_batch(&items, JobStatus::Pending)
        .unwrap();
    assert_eq!(inserted, 0);
    assert_eq!(storage.count_remaining().unwrap(), 5);
}

#[test]
fn test_sqlite_page_scope_with_filter() {
    let (storage, _temp) = create_test_storage();
    for i in 0..6 {
        let item = QueueItem::new(format!("job-{}", i), i, json!({}))
            .with_workflow(if i % 2 == 0 { "even" } else { "odd" }, "W");
        storage.upsert_pending(&item).unwrap();
    }

    let even = QueueFilter::workflow("even");
    assert_eq!(storage.count_scope(Scope::Queue, &even).unwrap(), 3);

    let page = storage.page_scope(Scope::Queue, &even, 1, 2).unwrap();
    let ids: Vec<&str> = page.iter().map(|e| e.job_id.as_str()).collect();
    assert_eq!(ids, vec!["job-2", "job-4"]);
}

#[test]
fn test_sqlite_archive_and_requeue() {
    let (storage, _temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("a", 1)).unwrap();
    storage.upsert_pending(&create_test_item("b", 2)).unwrap();

    let archived = storage.archive_pending(&QueueFilter::default()).unwrap();
    assert_eq!(archived, 2);
    assert!(storage.first_pending().unwrap().is_none());

    let rows = storage.load_archived(&QueueFilter::default()).unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].job_id, "a");

    let mut item = rows[1].item.clone();
    item.priority = 42;
    assert_eq!(storage.requeue_items(&[(rows[1].id, item)]).unwrap(), 1);

    let first = storage.first_pending().unwrap().unwrap();
    assert_eq!(first.job_id, "b");
    assert_eq!(first.priority, 42);
}

#[test]
fn test_sqlite_archive_ids_skips_finished() {
    let (storage, _temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("a", 1)).unwrap();
    let id = storage.first_pending().unwrap().unwrap().id;
    storage.mark_running("a").unwrap();
    storage.mark_finished("a").unwrap();

    assert_eq!(storage.archive_ids(&[id]).unwrap(), 0);
    assert_eq!(storage.archive_ids(&[]).unwrap(), 0);
}

#[test]
fn test_sqlite_delete_running() {
    let (storage, _temp) = create_test_storage();
    for (job, p) in [("a", 1), ("b", 2), ("c", 3)] {
        storage.upsert_pending(&create_test_item(job, p)).unwrap();
    }
    storage.mark_running("a").unwrap();
    storage.mark_running("b").unwrap();

    assert_eq!(storage.delete_running(Some("zzz")).unwrap(), 0);
    assert_eq!(storage.delete_running(Some("a")).unwrap(), 1);
    assert_eq!(storage.delete_running(None).unwrap(), 1);
    assert_eq!(storage.count_remaining().unwrap(), 1);
}

#[test]
fn test_sqlite_requeue_orphans_preserves_order() {
    let (storage, _temp) = create_test_storage();
    for (job, p) in [("r1", 7), ("r2", 8), ("p1", 20), ("p2", 30)] {
        storage.upsert_pending(&create_test_item(job, p)).unwrap();
    }
    storage.mark_running("r1").unwrap();
    storage.mark_running("r2").unwrap();

    assert_eq!(storage.requeue_orphans(&[]).unwrap(), 2);

    let page = storage
        .page_scope(Scope::Queue, &QueueFilter::default(), 0, 10)
        .unwrap();
    let order: Vec<(&str, i64)> = page
        .iter()
        .map(|e| (e.job_id.as_str(), e.priority))
        .collect();
    assert_eq!(order, vec![("r1", 18), ("r2", 19), ("p1", 20), ("p2", 30)]);
    assert_eq!(storage.max_active_priority().unwrap(), Some(30));
}

#[test]
fn test_sqlite_requeue_orphans_without_running_rows() {
    let (storage, _temp) = create_test_storage();
    assert_eq!(storage.requeue_orphans(&[]).unwrap(), 0);
    assert_eq!(storage.max_active_priority().unwrap(), None);
}

#[test]
fn test_sqlite_options_roundtrip() {
    let (storage, _temp) = create_test_storage();
    assert!(storage.load_option("queue_paused").unwrap().is_none());

    storage.save_option("queue_paused", "true", 100).unwrap();
    storage.save_option("queue_paused", "false", 200).unwrap();

    let (value, updated_at) = storage.load_option("queue_paused").unwrap().unwrap();
    assert_eq!(value.as_deref(), Some("false"));
    assert_eq!(updated_at, 200);
}

#[test]
fn test_sqlite_second_connection_sees_writes() {
    let (storage, temp) = create_test_storage();
    storage.upsert_pending(&create_test_item("a", 1)).unwrap();

    let config = SqliteConfig::default().with_path(temp.path());
    let other = SqliteStorage::open(&config).unwrap();
    assert_eq!(other.count_remaining().unwrap(), 1);
}

#[test]
fn test_sqlite_requeue_orphans_skips_live_jobs() {
    let (storage, _temp) = create_test_storage();
    for (job, p) in [("live", 1), ("dead", 2), ("p1", 5)] {
        storage.upsert_pending(&create_test_item(job, p)).unwrap();
    }
    storage.mark_running("live").unwrap();
    storage.mark_running("dead").unwrap();

    assert_eq!(storage.requeue_orphans(&["live".to_string()]).unwrap(), 1);

    let first = storage.first_pending().unwrap().unwrap();
    assert_eq!(first.job_id, "dead");
    assert_eq!(first.priority, 4);
    assert_eq!(storage.mark_finished("live").unwrap(), 1);
}

#[test]
fn test_sqlite_open_reports_unusable_parent_dir() {
    let blocker = NamedTempFile::new().expect("Failed to create temp file");
    let config = SqliteConfig {
        path: blocker.path().join("nested").join("queue.db"),
        ..SqliteConfig::default()
    };

    let err = SqliteStorage::open(&config).err().expect("open should fail");
    assert!(matches!(err, crate::error::QueueError::Io(_)));
}
