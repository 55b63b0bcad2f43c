//! Queue module - persistent priority queue with a single-slot front queue.
//!
//! ## Module Organization
//!
//! - `manager.rs` - Core QueueController struct, config, counters, events
//! - `types/` - FrontQueue and time helpers
//! - `sqlite/` - SQLite durable store (queue rows + options)
//! - `options.rs` - Read-through cached option store
//!
//! ### Core operations
//!
//! - `push.rs` - Submit
//! - `pull.rs` - Acquire, promotion and dispatch
//! - `ack.rs` - Complete
//! - `recovery.rs` - Once-per-process orphan recovery
//!
//! ### Administration
//!
//! - `queue_control.rs` - Pause, resume, toggle
//! - `admin.rs` - Archive, play, delete, import, takeover
//! - `browser.rs` - Paging, full listings, status
//!
//! ### Execution
//!
//! - `dispatch.rs` - DispatchQueue trait handed to the engine
//! - `worker.rs` - Worker thread loop

mod manager;
mod options;
pub mod sqlite;
pub mod types;

// Core operations
mod ack;
mod pull;
mod push;
mod recovery;

// Administration
mod admin;
mod browser;
mod queue_control;

// Execution
mod dispatch;
mod worker;

#[cfg(test)]
mod tests;

pub use admin::validate_client_id;
pub use browser::QueueStatus;
pub use dispatch::DispatchQueue;
pub use manager::{CompletionHook, ControllerConfig, QueueController};
pub use options::{Options, QUEUE_PAUSED, TAKEOVER_CLIENT};
pub use recovery::RecoveryReport;
pub use worker::{JobExecutor, JobOutcome, Worker, WorkerConfig, WorkerHandle};
