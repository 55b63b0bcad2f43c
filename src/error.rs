//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid route: {0}")]
    InvalidScope(String),

    #[error("Invalid filter format: {0}")]
    InvalidFilter(String),

    #[error("Invalid client ID: {0}")]
    InvalidClientId(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Priority counter exhausted")]
    CounterExhausted,
}

impl QueueError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Errors raised before the store is touched; the caller sent bad input.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidScope(_)
                | Self::InvalidFilter(_)
                | Self::InvalidClientId(_)
                | Self::InvalidInput(_)
        )
    }
}
