//! Completion of dispatched jobs.

use serde_json::Value;
use tracing::{debug, info};

use super::manager::QueueController;
use crate::error::QueueResult;
use crate::protocol::{ExecutionStatus, QueueEvent};

impl QueueController {
    /// Mark the Running row for `job_id` Finished, then run the completion hook.
    ///
    /// Returns rows updated; 0 when the job was no longer Running (deleted,
    /// archived or already completed).
    pub fn complete(
        &self,
        job_id: &str,
        result: Option<Value>,
        status: ExecutionStatus,
    ) -> QueueResult<usize> {
        let (updated, job) = {
            let mut state = self.state.lock();
            let job = state.running.remove(job_id);
            let updated = state.storage.mark_finished(job_id)?;
            (updated, job)
        };

        // Hook runs outside the lock
        match &job {
            Some(job) => {
                self.run_completion_hook(&job.item, result.as_ref(), &status);
                info!(job_id, task_id = job.task_id, ?status, "Job completed");
            }
            None => debug!(job_id, updated, "Completed job was not in the running registry"),
        }

        self.notify(QueueEvent::Completed {
            job_id: job_id.to_string(),
            status,
        });
        Ok(updated)
    }
}
