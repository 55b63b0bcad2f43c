//! Criterion benchmarks for stashQ queue operations.
//!
//! Run with: cargo bench
//! Results saved to: target/criterion/

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use stashq::protocol::{ExecutionStatus, JobStatus, PageRequest, QueueItem, Scope};
use stashq::queue::sqlite::SqliteConfig;
use stashq::queue::{ControllerConfig, QueueController};

static NEXT_ID: AtomicU64 = AtomicU64::new(0);

/// Create a benchmark job with a unique id.
fn create_item(priority: i64) -> QueueItem {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    QueueItem::new(
        format!("bench-{}", id),
        priority,
        json!({"task": "benchmark", "value": 42}),
    )
    .with_workflow("bench", "Benchmark")
}

fn open_controller() -> (Arc<QueueController>, TempDir) {
    let dir = TempDir::new().unwrap();
    let config = ControllerConfig::default().with_sqlite(SqliteConfig {
        path: dir.path().join("bench.db"),
        ..SqliteConfig::default()
    });
    (QueueController::open(config).unwrap(), dir)
}

/// Benchmark single submit.
fn bench_submit(c: &mut Criterion) {
    let (qc, _dir) = open_controller();

    let mut group = c.benchmark_group("queue_submit");
    group.throughput(Throughput::Elements(1));

    group.bench_function("single", |b| {
        b.iter(|| qc.submit(create_item(10)).unwrap())
    });

    group.finish();
}

/// Benchmark batch import.
fn bench_import_batch(c: &mut Criterion) {
    let (qc, _dir) = open_controller();

    let mut group = c.benchmark_group("queue_import_batch");

    for batch_size in [10, 100, 1000].iter() {
        group.throughput(Throughput::Elements(*batch_size as u64));

        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            batch_size,
            |b, &size| {
                b.iter(|| {
                    let items: Vec<QueueItem> = (0..size).map(|_| create_item(0)).collect();
                    qc.import_batch(items, None, JobStatus::Archived).unwrap()
                })
            },
        );
    }

    group.finish();
}

/// Benchmark submit -> acquire -> complete.
fn bench_full_lifecycle(c: &mut Criterion) {
    let (qc, _dir) = open_controller();

    let mut group = c.benchmark_group("queue_lifecycle");
    group.throughput(Throughput::Elements(1));

    group.bench_function("submit_acquire_complete", |b| {
        b.iter(|| {
            qc.submit(create_item(1)).unwrap();
            let item = qc
                .acquire(Some(Duration::from_millis(100)))
                .unwrap()
                .unwrap();
            qc.complete(&item.job_id, None, ExecutionStatus::Success)
                .unwrap()
        })
    });

    group.finish();
}

/// Benchmark paging over a populated queue.
fn bench_page(c: &mut Criterion) {
    let (qc, _dir) = open_controller();
    qc.pause().unwrap();
    let items: Vec<QueueItem> = (0..10_000).map(|_| create_item(0)).collect();
    qc.import_batch(items, None, JobStatus::Pending).unwrap();

    let mut group = c.benchmark_group("queue_page");

    for page in [0_i64, 50, 99].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(page), page, |b, &page| {
            b.iter(|| qc.page(&PageRequest::new(Scope::Queue, page, 100)).unwrap())
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_submit,
    bench_import_batch,
    bench_full_lifecycle,
    bench_page,
);
criterion_main!(benches);
