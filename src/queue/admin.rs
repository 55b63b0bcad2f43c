//! Administrative mutations: archive, play, delete, import, takeover.
//!
//! Every operation returns an affected-row count. Anything that could touch
//! the mirrored front item clears the front queue and lets it be rebuilt
//! from the store.

use tracing::info;

use super::manager::QueueController;
use super::options::TAKEOVER_CLIENT;
use crate::error::{QueueError, QueueResult};
use crate::protocol::{
    ImportOutcome, JobStatus, QueueEvent, QueueFilter, QueueItem, Scope, TakeoverClient,
};

/// Client ids are 32 lowercase hex characters.
pub fn validate_client_id(client_id: &str) -> QueueResult<()> {
    let valid = client_id.len() == 32
        && client_id
            .bytes()
            .all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
    if valid {
        Ok(())
    } else {
        Err(QueueError::InvalidClientId(client_id.to_string()))
    }
}

impl QueueController {
    // ============== Archive ==============

    /// Move every Pending row matching `filter` to the archive.
    pub fn archive(&self, filter: &QueueFilter) -> QueueResult<usize> {
        let total = {
            let mut state = self.state.lock();
            let total = state.storage.archive_pending(filter)?;
            state.front.clear();
            self.fill_front_locked(&mut state)?;
            total
        };

        info!(total, workflow_id = ?filter.workflow_id, "Archived pending jobs");
        self.notify(QueueEvent::ItemsMoved { total });
        Ok(total)
    }

    /// Archive the given row ids (Pending or Running).
    pub fn archive_by_ids(&self, ids: &[i64]) -> QueueResult<usize> {
        let total = {
            let mut state = self.state.lock();
            let total = state.storage.archive_ids(ids)?;
            state.front.clear();
            self.fill_front_locked(&mut state)?;
            total
        };

        info!(total, "Archived jobs by id");
        self.notify(QueueEvent::ItemsMoved { total });
        Ok(total)
    }

    // ============== Play ==============

    /// Put the given rows back in the queue with fresh priorities.
    ///
    /// Rows keep the order of `ids`. With `to_front` the priorities are
    /// negative so the batch runs before everything already queued.
    pub fn play_items(
        &self,
        ids: &[i64],
        to_front: bool,
        client_id: Option<&str>,
    ) -> QueueResult<usize> {
        if let Some(client_id) = client_id {
            validate_client_id(client_id)?;
        }

        let total = {
            let mut state = self.state.lock();
            self.recover_locked(&mut state)?;

            let mut rows = Vec::with_capacity(ids.len());
            for &id in ids {
                if let Some(entry) = state.storage.load_playable(id)? {
                    rows.push((entry.id, entry.item));
                }
            }

            if to_front {
                // Last row gets the counter value closest to zero
                for (_, item) in rows.iter_mut().rev() {
                    item.priority = -state.next_priority()?;
                }
            } else {
                for (_, item) in rows.iter_mut() {
                    item.priority = state.next_priority()?;
                }
            }
            if let Some(client_id) = client_id {
                for (_, item) in rows.iter_mut() {
                    item.options.client_id = Some(client_id.to_string());
                }
            }

            let total = state.storage.requeue_items(&rows)?;
            state.front.clear();
            self.fill_front_locked(&mut state)?;
            total
        };

        info!(total, to_front, "Played jobs");
        self.notify(QueueEvent::ItemsMoved { total });
        Ok(total)
    }

    /// Put every archived row matching `filter` back in the queue, in
    /// creation order.
    pub fn play_archive(&self, client_id: Option<&str>, filter: &QueueFilter) -> QueueResult<usize> {
        if let Some(client_id) = client_id {
            validate_client_id(client_id)?;
        }

        let total = {
            let mut state = self.state.lock();
            self.recover_locked(&mut state)?;
            let archived = state.storage.load_archived(filter)?;

            let mut rows = Vec::with_capacity(archived.len());
            for entry in archived {
                let mut item = entry.item;
                item.priority = state.next_priority()?;
                if let Some(client_id) = client_id {
                    item.options.client_id = Some(client_id.to_string());
                }
                rows.push((entry.id, item));
            }

            let total = state.storage.requeue_items(&rows)?;
            if total > 0 {
                self.fill_front_locked(&mut state)?;
            }
            total
        };

        info!(total, workflow_id = ?filter.workflow_id, "Played archive");
        self.notify(QueueEvent::ItemsMoved { total });
        Ok(total)
    }

    // ============== Delete ==============

    /// Delete rows by job id, whatever their status.
    pub fn delete_items(&self, job_ids: &[String]) -> QueueResult<usize> {
        let deleted = {
            let mut state = self.state.lock();
            let deleted = state.storage.delete_job_ids(job_ids)?;
            state.front.clear();
            self.fill_front_locked(&mut state)?;
            deleted
        };

        info!(deleted, "Deleted jobs");
        self.notify(QueueEvent::ItemsDeleted { deleted });
        Ok(deleted)
    }

    /// Delete every row in `scope` matching `filter`. The queue scope only
    /// covers Pending rows.
    pub fn delete_scope(&self, scope: Scope, filter: &QueueFilter) -> QueueResult<usize> {
        let deleted = {
            let mut state = self.state.lock();
            let deleted = state.storage.delete_scope(scope, filter)?;
            state.front.clear();
            self.fill_front_locked(&mut state)?;
            deleted
        };

        info!(deleted, scope = %scope.as_str(), "Deleted scope");
        self.notify(QueueEvent::ItemsDeleted { deleted });
        Ok(deleted)
    }

    /// Delete every Pending row.
    pub fn wipe_pending(&self) -> QueueResult<usize> {
        self.delete_scope(Scope::Queue, &QueueFilter::default())
    }

    /// Delete the given Running job, or every Running row when `job_id` is
    /// `None`. Used to interrupt the current job.
    pub fn delete_running(&self, job_id: Option<&str>) -> QueueResult<usize> {
        let deleted = self.state.lock().storage.delete_running(job_id)?;

        info!(deleted, job_id = ?job_id, "Deleted running jobs");
        self.notify(QueueEvent::ItemsDeleted { deleted });
        Ok(deleted)
    }

    // ============== Import ==============

    /// Insert-or-ignore a batch with ascending fresh priorities.
    ///
    /// `target` must be Pending or Archived. Duplicate job ids are skipped.
    pub fn import_batch(
        &self,
        items: Vec<QueueItem>,
        client_id: Option<&str>,
        target: JobStatus,
    ) -> QueueResult<ImportOutcome> {
        if !matches!(target, JobStatus::Pending | JobStatus::Archived) {
            return Err(QueueError::invalid_input(format!(
                "cannot import into status {}",
                target
            )));
        }
        if let Some(client_id) = client_id {
            validate_client_id(client_id)?;
        }
        if items.iter().any(|item| item.job_id.is_empty()) {
            return Err(QueueError::invalid_input("job id must not be empty"));
        }

        let submitted = items.len();
        let inserted = {
            let mut state = self.state.lock();
            self.recover_locked(&mut state)?;

            let mut items = items;
            for item in items.iter_mut() {
                item.priority = state.next_priority()?;
                if let Some(client_id) = client_id {
                    item.options.client_id = Some(client_id.to_string());
                }
            }

            let inserted = state.storage.insert_ignore_batch(&items, target)?;
            if inserted > 0 && target == JobStatus::Pending {
                self.fill_front_locked(&mut state)?;
            }
            inserted
        };

        info!(inserted, submitted, target = %target, "Imported jobs");
        self.notify(QueueEvent::ItemsImported { total: inserted });
        Ok(ImportOutcome {
            inserted,
            submitted,
        })
    }

    // ============== Takeover ==============

    /// Make `client_id` the owner of every job not yet started.
    pub fn takeover(&self, client_id: &str) -> QueueResult<TakeoverClient> {
        validate_client_id(client_id)?;

        let mut state = self.state.lock();
        let timestamp = self.options.set(TAKEOVER_CLIENT, &Some(client_id))?;
        let takeover = TakeoverClient {
            client_id: client_id.to_string(),
            timestamp,
        };
        state.takeover = Some(takeover.clone());
        drop(state);

        info!(client_id, timestamp, "Client takeover requested");
        self.notify(QueueEvent::QueueUpdated);
        Ok(takeover)
    }
}
