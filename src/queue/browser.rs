//! Read side: paging, full listings, counts and a status summary.

use serde::Serialize;

use super::manager::QueueController;
use crate::error::QueueResult;
use crate::protocol::{
    PageInfo, PageRequest, QueueEntry, QueueFilter, QueueItem, QueuePage, Scope, TakeoverClient,
};

/// Snapshot of queue sizes and controller state.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub paused: bool,
    pub pending: u64,
    /// Pending plus Running rows
    pub remaining: u64,
    pub archived: u64,
    pub completed: u64,
    pub running: Vec<String>,
    pub priority_counter: i64,
    pub task_counter: u64,
    pub recovered: bool,
    pub takeover: Option<TakeoverClient>,
}

impl QueueController {
    /// One page of `request.scope`, clamped to the last page.
    ///
    /// `running` is only filled for the queue scope.
    pub fn page(&self, request: &PageRequest) -> QueueResult<QueuePage> {
        let state = self.state.lock();
        let page_size = request.page_size;

        let total = state.storage.count_scope(request.scope, &request.filter)?;
        let last_page = if page_size == 0 || total == 0 {
            0
        } else {
            ((total - 1) / page_size) as i64
        };
        let page = request.page.clamp(0, last_page);

        let pending = if page_size == 0 {
            Vec::new()
        } else {
            state.storage.page_scope(
                request.scope,
                &request.filter,
                page as u64 * page_size,
                page_size,
            )?
        };

        let running: Vec<QueueItem> = if request.scope == Scope::Queue {
            let mut jobs: Vec<_> = state.running.values().collect();
            jobs.sort_by_key(|job| job.task_id);
            jobs.into_iter().map(|job| job.item.clone()).collect()
        } else {
            Vec::new()
        };

        Ok(QueuePage {
            running,
            pending,
            info: PageInfo {
                total,
                page,
                page_size,
                last_page,
            },
        })
    }

    /// First page of `scope` with the configured default page size.
    pub fn first_page(&self, scope: Scope, filter: QueueFilter) -> QueueResult<QueuePage> {
        self.page(&PageRequest::new(scope, 0, self.config.default_page_size).with_filter(filter))
    }

    /// Every row in `scope`, newest first. The queue scope includes Running rows.
    pub fn full_listing(&self, scope: Scope, filter: &QueueFilter) -> QueueResult<Vec<QueueEntry>> {
        Ok(self.state.lock().storage.list_scope(scope, filter)?)
    }

    /// Pending plus Running rows.
    pub fn remaining_count(&self) -> QueueResult<u64> {
        Ok(self.state.lock().storage.count_remaining()?)
    }

    pub fn status(&self) -> QueueResult<QueueStatus> {
        let state = self.state.lock();
        let all = QueueFilter::default();

        let mut running: Vec<_> = state.running.values().collect();
        running.sort_by_key(|job| job.task_id);

        Ok(QueueStatus {
            paused: state.paused,
            pending: state.storage.count_scope(Scope::Queue, &all)?,
            remaining: state.storage.count_remaining()?,
            archived: state.storage.count_scope(Scope::Archive, &all)?,
            completed: state.storage.count_scope(Scope::Completed, &all)?,
            running: running.iter().map(|job| job.item.job_id.clone()).collect(),
            priority_counter: state.priority_counter,
            task_counter: state.task_counter,
            recovered: self.is_recovered(),
            takeover: state.takeover.clone(),
        })
    }
}
