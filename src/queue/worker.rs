//! Worker loop: acquire, execute, complete.
//!
//! The worker owns a dedicated thread and only sees the queue through
//! [`DispatchQueue`], so any implementation can be injected.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use serde_json::Value;
use tracing::{error, info, warn};

use super::dispatch::DispatchQueue;
use crate::protocol::{ExecutionStatus, QueueItem};

/// What an executor reports back for one job.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub result: Option<Value>,
    pub status: ExecutionStatus,
}

impl JobOutcome {
    pub fn success(result: Option<Value>) -> Self {
        Self {
            result,
            status: ExecutionStatus::Success,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            result: None,
            status: ExecutionStatus::Error {
                message: message.into(),
            },
        }
    }

    pub fn interrupted() -> Self {
        Self {
            result: None,
            status: ExecutionStatus::Interrupted,
        }
    }
}

/// Runs one job to completion on the worker thread.
pub trait JobExecutor: Send + Sync {
    fn execute(&self, item: &QueueItem) -> JobOutcome;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Thread name
    pub name: String,
    /// Acquire timeout between shutdown checks
    pub poll_interval: Duration,
    /// Pause after a queue error before retrying
    pub error_backoff: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "stashq-worker".to_string(),
            poll_interval: Duration::from_millis(500),
            error_backoff: Duration::from_secs(1),
        }
    }
}

pub struct Worker;

impl Worker {
    /// Start a worker thread.
    pub fn spawn(
        queue: Arc<dyn DispatchQueue>,
        executor: Arc<dyn JobExecutor>,
        config: WorkerConfig,
    ) -> std::io::Result<WorkerHandle> {
        let shutdown = Arc::new(AtomicBool::new(false));
        let processed = Arc::new(AtomicU64::new(0));

        let thread = {
            let shutdown = Arc::clone(&shutdown);
            let processed = Arc::clone(&processed);
            let config = config.clone();
            thread::Builder::new()
                .name(config.name.clone())
                .spawn(move || run(queue, executor, config, shutdown, processed))?
        };

        info!(name = %config.name, "Worker started");
        Ok(WorkerHandle {
            name: config.name,
            shutdown,
            processed,
            thread: Some(thread),
        })
    }
}

fn run(
    queue: Arc<dyn DispatchQueue>,
    executor: Arc<dyn JobExecutor>,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
) {
    while !shutdown.load(Ordering::Acquire) {
        let item = match queue.acquire(Some(config.poll_interval)) {
            Ok(Some(item)) => item,
            Ok(None) => continue,
            Err(e) => {
                error!(error = %e, "Failed to acquire job");
                thread::sleep(config.error_backoff);
                continue;
            }
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| executor.execute(&item)))
            .unwrap_or_else(|_| {
                warn!(job_id = %item.job_id, "Executor panicked");
                JobOutcome::error("executor panicked")
            });

        if let Err(e) = queue.complete(&item.job_id, outcome.result, outcome.status) {
            error!(job_id = %item.job_id, error = %e, "Failed to complete job");
        }
        processed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Handle to a running worker. Dropping it stops the worker.
pub struct WorkerHandle {
    name: String,
    shutdown: Arc<AtomicBool>,
    processed: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl WorkerHandle {
    /// Jobs executed so far.
    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    /// Ask the loop to exit after the current acquire or job.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    /// Stop the worker and wait for its thread. Returns jobs executed.
    pub fn stop(mut self) -> u64 {
        self.join();
        self.processed()
    }

    fn join(&mut self) {
        self.shutdown();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!(name = %self.name, "Worker thread panicked");
            } else {
                info!(name = %self.name, processed = self.processed(), "Worker stopped");
            }
        }
    }
}

impl Drop for WorkerHandle {
    fn drop(&mut self) {
        self.join();
    }
}
