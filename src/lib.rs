//! stashQ - persistent priority job queue with a single-slot front queue.
//!
//! The durable store (SQLite) is the source of truth; a small in-memory
//! front queue feeds one blocking consumer. See [`queue::QueueController`].

pub mod cli;
pub mod error;
pub mod protocol;
pub mod queue;
pub mod telemetry;

pub use error::{QueueError, QueueResult};
pub use queue::{DispatchQueue, QueueController};
