//! Type definitions for the stashQ queue system.
//!
//! Module organization:
//! - `front_queue.rs` - Volatile single-slot front queue (min-heap)
//! - `time.rs` - Millisecond timestamps

mod front_queue;
mod time;

pub use front_queue::{FrontItem, FrontQueue};
pub use time::{format_ms, now_ms};
