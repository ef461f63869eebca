//! Vector Store Error Types

use std::io;
use thiserror::Error;

use crate::llm::ModelError;
use crate::timeout::TimeoutError;

/// Vector store errors
#[derive(Error, Debug)]
pub enum VectorStoreError {
    /// Transport-level failure talking to the remote index
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote index answered with a non-success status
    #[error("Vector index returned {status}: {message}")]
    Remote { status: u16, message: String },

    /// I/O error on the embedded index files
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Embedding the texts failed
    #[error("Embedding failed: {0}")]
    Embedding(#[from] ModelError),

    /// Vector does not match the index dimension
    #[error("Dimension mismatch: index has dimension {expected}, got vector of dimension {got}")]
    DimensionMismatch { expected: usize, got: usize },

    /// `add_texts` called with differently sized inputs
    #[error("Got {texts} texts but {metadatas} metadata entries")]
    LengthMismatch { texts: usize, metadatas: usize },

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl VectorStoreError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            VectorStoreError::Http(e) => e.is_timeout() || e.is_connect(),
            VectorStoreError::Remote { status, .. } => *status == 429 || *status >= 500,
            VectorStoreError::Embedding(e) => e.is_retryable(),
            VectorStoreError::Timeout(_) => true,
            VectorStoreError::Io(_)
            | VectorStoreError::Json(_)
            | VectorStoreError::DimensionMismatch { .. }
            | VectorStoreError::LengthMismatch { .. } => false,
        }
    }
}

/// Result type for vector store operations
pub type VectorResult<T> = Result<T, VectorStoreError>;
