//! Core QueueController struct and constructors.
//!
//! One process-wide lock (`state`) guards the front queue, the pause gate,
//! the counters and the controller's store connection. Two condition
//! variables hang off that lock: `unpaused` (pause gate) and `item_ready`
//! (front queue non-empty).

use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use parking_lot::{Condvar, Mutex, RwLock};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::options::{Options, QUEUE_PAUSED, TAKEOVER_CLIENT};
use super::recovery::RecoveryReport;
use super::sqlite::{SqliteConfig, SqliteStorage};
use super::types::FrontQueue;
use crate::error::{QueueError, QueueResult};
use crate::protocol::{ExecutionStatus, QueueEvent, QueueItem, TakeoverClient};

/// Downstream hook invoked after a job is marked Finished.
pub trait CompletionHook: Send + Sync {
    fn on_complete(&self, item: &QueueItem, result: Option<&Value>, status: &ExecutionStatus);
}

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub sqlite: SqliteConfig,
    /// Buffered events per observer before the slowest one lags
    pub event_capacity: usize,
    /// Page size used when a caller passes none
    pub default_page_size: u64,
    /// Run recovery inside `open`. When off, the first operation that
    /// dispatches or hands out priorities runs it instead.
    pub recover_on_open: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sqlite: SqliteConfig::default(),
            event_capacity: 1024,
            default_page_size: 100,
            recover_on_open: true,
        }
    }
}

impl ControllerConfig {
    /// Create config from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            sqlite: SqliteConfig::from_env(),
            event_capacity: defaults.event_capacity,
            default_page_size: std::env::var("STASHQ_PAGE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.default_page_size),
            recover_on_open: std::env::var("STASHQ_RECOVER_ON_OPEN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.recover_on_open),
        }
    }

    pub fn with_sqlite(mut self, sqlite: SqliteConfig) -> Self {
        self.sqlite = sqlite;
        self
    }

    pub fn with_recover_on_open(mut self, recover_on_open: bool) -> Self {
        self.recover_on_open = recover_on_open;
        self
    }
}

/// A job handed to the executor and not yet completed.
#[derive(Debug, Clone)]
pub(crate) struct RunningJob {
    pub(crate) task_id: u64,
    pub(crate) item: QueueItem,
}

/// Everything mutated under the controller lock.
pub(crate) struct ControllerState {
    pub(crate) storage: SqliteStorage,
    pub(crate) front: FrontQueue,
    pub(crate) paused: bool,
    /// Global priority counter
    pub(crate) priority_counter: i64,
    /// Dispatches handed out by this process
    pub(crate) task_counter: u64,
    pub(crate) running: HashMap<String, RunningJob>,
    pub(crate) takeover: Option<TakeoverClient>,
    /// Outcome of this process's recovery run, once it has happened
    pub(crate) recovery: Option<RecoveryReport>,
}

impl ControllerState {
    #[inline]
    pub(crate) fn next_priority(&mut self) -> QueueResult<i64> {
        self.priority_counter = self
            .priority_counter
            .checked_add(1)
            .ok_or(QueueError::CounterExhausted)?;
        Ok(self.priority_counter)
    }
}

pub struct QueueController {
    pub(crate) state: Mutex<ControllerState>,
    pub(crate) item_ready: Condvar,
    pub(crate) unpaused: Condvar,
    /// Set once recovery has completed in this process.
    pub(crate) recovered: AtomicBool,
    pub(crate) options: Options,
    pub(crate) event_tx: broadcast::Sender<QueueEvent>,
    pub(crate) completion_hook: RwLock<Option<Arc<dyn CompletionHook>>>,
    pub(crate) config: ControllerConfig,
}

impl QueueController {
    /// Open (or create) the durable store and build the controller.
    ///
    /// Restores the persisted pause flag and takeover client, then runs
    /// recovery unless `recover_on_open` is off. A controller that starts
    /// paused always recovers here.
    pub fn open(config: ControllerConfig) -> QueueResult<Arc<Self>> {
        let storage = SqliteStorage::open(&config.sqlite)?;
        storage.migrate()?;

        let options = Options::new(SqliteStorage::open(&config.sqlite)?);
        let paused: bool = options.get(QUEUE_PAUSED, false)?;
        let (takeover_id, takeover_at): (Option<String>, i64) =
            options.get_with_timestamp(TAKEOVER_CLIENT, None)?;
        let takeover = takeover_id.map(|client_id| TakeoverClient {
            client_id,
            timestamp: takeover_at,
        });

        let (event_tx, _) = broadcast::channel(config.event_capacity.max(1));

        let controller = Arc::new(Self {
            state: Mutex::new(ControllerState {
                storage,
                front: FrontQueue::new(),
                paused,
                priority_counter: 0,
                task_counter: 0,
                running: HashMap::new(),
                takeover,
                recovery: None,
            }),
            item_ready: Condvar::new(),
            unpaused: Condvar::new(),
            recovered: AtomicBool::new(false),
            options,
            event_tx,
            completion_hook: RwLock::new(None),
            config,
        });

        info!(
            path = %controller.config.sqlite.path.display(),
            paused,
            "Queue controller ready"
        );

        if paused || controller.config.recover_on_open {
            controller.recover()?;
        }

        Ok(controller)
    }

    /// Open using configuration from the environment.
    pub fn from_env() -> QueueResult<Arc<Self>> {
        Self::open(ControllerConfig::from_env())
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Install the downstream completion hook, replacing any previous one.
    pub fn set_completion_hook(&self, hook: Arc<dyn CompletionHook>) {
        *self.completion_hook.write() = Some(hook);
    }

    /// Subscribe to change notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    #[inline]
    pub(crate) fn notify(&self, event: QueueEvent) {
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    /// Advance the global priority counter and return the new value.
    pub fn next_priority(&self) -> QueueResult<i64> {
        let mut state = self.state.lock();
        self.recover_locked(&mut state)?;
        state.next_priority()
    }

    pub fn priority_counter(&self) -> i64 {
        self.state.lock().priority_counter
    }

    /// Number of jobs dispatched by this process.
    pub fn task_counter(&self) -> u64 {
        self.state.lock().task_counter
    }

    /// Job ids currently executing.
    pub fn running_job_ids(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut running: Vec<&RunningJob> = state.running.values().collect();
        running.sort_by_key(|job| job.task_id);
        running.iter().map(|job| job.item.job_id.clone()).collect()
    }

    pub fn takeover_client(&self) -> Option<TakeoverClient> {
        self.state.lock().takeover.clone()
    }

    pub(crate) fn run_completion_hook(
        &self,
        item: &QueueItem,
        result: Option<&Value>,
        status: &ExecutionStatus,
    ) {
        let hook = self.completion_hook.read().clone();
        if let Some(hook) = hook {
            hook.on_complete(item, result, status);
        } else if matches!(status, ExecutionStatus::Error { .. }) {
            warn!(job_id = %item.job_id, ?status, "Job finished with error");
        }
    }
}
