//! Acquire: the blocking single-slot dispatch path.
//!
//! Promotion and pop both happen under the controller lock, and the row is
//! marked Running before the lock is released, so two acquirers never see
//! the same job.

use std::time::{Duration, Instant};

use tracing::debug;

use super::manager::{ControllerState, QueueController, RunningJob};
use super::types::FrontItem;
use crate::error::QueueResult;
use crate::protocol::{QueueEvent, QueueItem};

impl QueueController {
    /// Wait for the next job, up to `timeout` (`None` waits forever).
    ///
    /// Returns `Ok(None)` on timeout; callers retry.
    pub fn acquire(&self, timeout: Option<Duration>) -> QueueResult<Option<QueueItem>> {
        let deadline = timeout.map(|t| Instant::now() + t);
        let mut state = self.state.lock();

        loop {
            // Pause gate
            while state.paused {
                match deadline {
                    Some(deadline) => {
                        let timed_out = self.unpaused.wait_until(&mut state, deadline).timed_out();
                        if timed_out && state.paused {
                            return Ok(None);
                        }
                    }
                    None => self.unpaused.wait(&mut state),
                }
            }

            // Orphans go back to Pending before anything is dispatched
            self.recover_locked(&mut state)?;
            if state.front.is_empty() {
                self.promote_locked(&mut state)?;
            }

            if let Some(front) = state.front.pop() {
                match self.dispatch_locked(&mut state, front)? {
                    Some(item) => return Ok(Some(item)),
                    None => continue,
                }
            }

            let timed_out = match deadline {
                Some(deadline) => self.item_ready.wait_until(&mut state, deadline).timed_out(),
                None => {
                    self.item_ready.wait(&mut state);
                    false
                }
            };
            if timed_out && (state.paused || state.front.is_empty()) {
                return Ok(None);
            }
        }
    }

    /// Rebuild the front queue from the Pending row with the smallest priority.
    ///
    /// Returns true if an item was promoted.
    pub(crate) fn promote_locked(&self, state: &mut ControllerState) -> QueueResult<bool> {
        state.front.clear();
        match state.storage.first_pending()? {
            Some(entry) => {
                debug!(job_id = %entry.job_id, priority = entry.priority, "Promoted job");
                state.front.push(FrontItem::from(entry));
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Refill an empty front queue and wake one consumer if something arrived.
    pub(crate) fn fill_front_locked(&self, state: &mut ControllerState) -> QueueResult<()> {
        if !state.paused && state.front.is_empty() && self.promote_locked(state)? {
            self.item_ready.notify_one();
        }
        Ok(())
    }

    /// Hand a popped item to the caller. `None` means the row was no longer
    /// Pending and the mirror was stale.
    fn dispatch_locked(
        &self,
        state: &mut ControllerState,
        front: FrontItem,
    ) -> QueueResult<Option<QueueItem>> {
        let mut item = front.item;

        if state.storage.mark_running(&item.job_id)? == 0 {
            debug!(job_id = %item.job_id, "Discarded stale front item");
            return Ok(None);
        }

        if let Some(takeover) = &state.takeover {
            if takeover.timestamp > front.updated_at {
                item.options.client_id = Some(takeover.client_id.clone());
            }
        }

        state.task_counter += 1;
        let task_id = state.task_counter;
        state.running.insert(
            item.job_id.clone(),
            RunningJob {
                task_id,
                item: item.clone(),
            },
        );

        debug!(job_id = %item.job_id, task_id, "Dispatching job");
        self.notify(QueueEvent::Executing {
            job_id: item.job_id.clone(),
            name: item.workflow_name().to_string(),
        });

        Ok(Some(item))
    }
}
