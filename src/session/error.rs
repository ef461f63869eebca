//! Session Store Error Types

use std::io;
use thiserror::Error;

use crate::timeout::TimeoutError;

/// Session store errors
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O error on the local session document
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Redis command or connection failure
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// The backend did not answer in time
    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl StoreError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) => true,
            StoreError::Redis(e) => {
                e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
            }
            StoreError::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ),
            StoreError::Json(_) => false,
        }
    }
}

/// Result type for session store operations
pub type StoreResult<T> = Result<T, StoreError>;
