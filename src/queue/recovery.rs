//! Once-per-process recovery of orphaned Running rows.
//!
//! Rows left Running by a previous process go back to Pending ahead of
//! every Pending row, then the global priority counter is reseeded. The
//! `recovered` flag is only ever read and set while the controller lock is
//! held, so concurrent first callers cannot both run it.

use std::sync::atomic::Ordering;

use serde::Serialize;
use tracing::{debug, info};

use super::manager::{ControllerState, QueueController};
use crate::error::QueueResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecoveryReport {
    /// Running rows moved back to Pending
    pub requeued: usize,
    /// Priority counter after reseeding
    pub priority_counter: i64,
}

impl QueueController {
    /// Run recovery if it has not run yet in this process.
    ///
    /// Returns `None` when recovery already happened.
    pub fn recover(&self) -> QueueResult<Option<RecoveryReport>> {
        let mut state = self.state.lock();
        let report = self.recover_locked(&mut state)?;
        if report.is_some_and(|r| r.requeued > 0) && !state.paused {
            if self.promote_locked(&mut state)? {
                self.item_ready.notify_one();
            }
        }
        Ok(report)
    }

    pub fn is_recovered(&self) -> bool {
        self.recovered.load(Ordering::Acquire)
    }

    /// What recovery did in this process, once it has run.
    pub fn recovery_report(&self) -> Option<RecoveryReport> {
        self.state.lock().recovery
    }

    pub(crate) fn recover_locked(
        &self,
        state: &mut ControllerState,
    ) -> QueueResult<Option<RecoveryReport>> {
        if self.recovered.load(Ordering::Acquire) {
            return Ok(None);
        }

        // Jobs dispatched by this process are not orphans
        let live: Vec<String> = state.running.keys().cloned().collect();
        let requeued = state.storage.requeue_orphans(&live)?;
        if requeued > 0 {
            state.front.clear();
        }

        let seeded = state
            .storage
            .max_active_priority()?
            .map_or(1, |max| max.saturating_add(1));
        state.priority_counter = state.priority_counter.max(seeded);

        // Only flip the flag once the counter is in place
        self.recovered.store(true, Ordering::Release);

        if requeued > 0 {
            info!(
                requeued,
                priority_counter = state.priority_counter,
                "Recovered orphaned jobs"
            );
        } else {
            debug!(
                priority_counter = state.priority_counter,
                "Recovery found no orphaned jobs"
            );
        }

        let report = RecoveryReport {
            requeued,
            priority_counter: state.priority_counter,
        };
        state.recovery = Some(report);
        Ok(Some(report))
    }
}
