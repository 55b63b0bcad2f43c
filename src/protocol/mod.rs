//! Protocol types shared by the queue, the dispatch interface and the CLI.

mod types;

pub use types::*;
