//! The capability set handed to the execution engine.

use std::time::Duration;

use serde_json::Value;

use super::manager::QueueController;
use crate::error::QueueResult;
use crate::protocol::{ExecutionStatus, PageRequest, QueueItem, QueuePage};

/// Blocking single-slot dispatch queue consumed by a worker loop.
pub trait DispatchQueue: Send + Sync {
    /// Wait up to `timeout` for the next job (`None` waits forever).
    fn acquire(&self, timeout: Option<Duration>) -> QueueResult<Option<QueueItem>>;

    fn submit(&self, item: QueueItem) -> QueueResult<()>;

    fn page(&self, request: &PageRequest) -> QueueResult<QueuePage>;

    fn remaining_count(&self) -> QueueResult<u64>;

    fn complete(
        &self,
        job_id: &str,
        result: Option<Value>,
        status: ExecutionStatus,
    ) -> QueueResult<usize>;
}

impl DispatchQueue for QueueController {
    fn acquire(&self, timeout: Option<Duration>) -> QueueResult<Option<QueueItem>> {
        QueueController::acquire(self, timeout)
    }

    fn submit(&self, item: QueueItem) -> QueueResult<()> {
        QueueController::submit(self, item)
    }

    fn page(&self, request: &PageRequest) -> QueueResult<QueuePage> {
        QueueController::page(self, request)
    }

    fn remaining_count(&self) -> QueueResult<u64> {
        QueueController::remaining_count(self)
    }

    fn complete(
        &self,
        job_id: &str,
        result: Option<Value>,
        status: ExecutionStatus,
    ) -> QueueResult<usize> {
        QueueController::complete(self, job_id, result, status)
    }
}
