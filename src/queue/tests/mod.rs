//! QueueController tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::json;
use tempfile::TempDir;

use super::sqlite::SqliteConfig;
use super::*;
use crate::error::QueueError;
use crate::protocol::*;


const CLIENT: &str = "0123456789abcdef0123456789abcdef";

fn config_for(dir: &TempDir) -> ControllerConfig {
    ControllerConfig::default().with_sqlite(SqliteConfig {
        path: dir.path().join("queue.db"),
        synchronous: 0, // OFF for test speed
        ..SqliteConfig::default()
    })
}

fn setup() -> (Arc<QueueController>, TempDir) {
    let dir = TempDir::new().unwrap();
    let qc = QueueController::open(config_for(&dir)).unwrap();
    (qc, dir)
}

/// Open a second controller on the same database, as after a restart.
fn reopen(dir: &TempDir) -> Arc<QueueController> {
    QueueController::open(config_for(dir)).unwrap()
}

/// Reopen without recovering in `open`; the first operation that needs it
/// recovers instead.
fn reopen_lazy(dir: &TempDir) -> Arc<QueueController> {
    QueueController::open(config_for(dir).with_recover_on_open(false)).unwrap()
}

fn item(job_id: &str, priority: i64) -> QueueItem {
    QueueItem::new(job_id, priority, json!({"job": job_id})).with_workflow("wf-1", "Workflow One")
}

fn no_wait() -> Option<Duration> {
    Some(Duration::ZERO)
}

fn short() -> Option<Duration> {
    Some(Duration::from_millis(50))
}

/// Acquire and unwrap the job id.
fn next_job(qc: &QueueController) -> String {
    qc.acquire(short())
        .unwrap()
        .expect("expected a job")
        .job_id
}

/// Row id of `job_id` in the queue scope (Pending or Running).
fn row_id(qc: &QueueController, job_id: &str) -> i64 {
    qc.full_listing(Scope::Queue, &QueueFilter::default())
        .unwrap()
        .into_iter()
        .chain(
            qc.full_listing(Scope::Archive, &QueueFilter::default())
                .unwrap(),
        )
        .find(|entry| entry.job_id == job_id)
        .map(|entry| entry.id)
        .expect("row not found")
}

fn wait_for(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    condition()
}
