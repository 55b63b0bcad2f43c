//! Submit: persist a job as Pending and keep the front queue honest.

use tracing::debug;

use super::manager::QueueController;
use crate::error::{QueueError, QueueResult};
use crate::protocol::{QueueEvent, QueueItem};

impl QueueController {
    /// Upsert `item` by job id with status Pending.
    ///
    /// When dispatch is live and the front queue is empty (or the new item
    /// should go ahead of the mirrored one), the front queue is rebuilt from
    /// the store minimum rather than from `item` itself.
    pub fn submit(&self, item: QueueItem) -> QueueResult<()> {
        if item.job_id.is_empty() {
            return Err(QueueError::invalid_input("job id must not be empty"));
        }

        let mut state = self.state.lock();
        self.recover_locked(&mut state)?;
        state.storage.upsert_pending(&item)?;

        if item.priority > state.priority_counter {
            state.priority_counter = item.priority;
        }

        let promote = !state.paused
            && (state.front.is_empty()
                || state.front.peek_priority().is_some_and(|p| item.priority < p)
                || state.front.contains(&item.job_id));
        if promote && self.promote_locked(&mut state)? {
            self.item_ready.notify_one();
        }
        drop(state);

        debug!(job_id = %item.job_id, priority = item.priority, promote, "Submitted job");
        self.notify(QueueEvent::QueueUpdated);
        Ok(())
    }
}
