//! Crate-level error type.

use crate::config::ConfigError;
use crate::ingest::IngestError;
use crate::llm::ModelError;
use crate::session::StoreError;
use crate::vector::VectorStoreError;

/// Every error a docchat operation can surface
#[derive(Debug, thiserror::Error)]
pub enum DocChatError {
    // Layer errors
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    #[error("Vector store error: {0}")]
    Vector(#[from] VectorStoreError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Domain errors
    /// Unknown or evicted session
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// File is not part of the session
    #[error("File '{file_name}' not found in session {session_id}")]
    FileNotFound {
        session_id: String,
        file_name: String,
    },

    /// Chat requested before any document was uploaded
    #[error("Please upload and process documents before asking questions.")]
    NoDocuments,

    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// A blocking worker panicked or was cancelled
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DocChatError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DocChatError::Store(e) => e.is_retryable(),
            DocChatError::Vector(e) => e.is_retryable(),
            DocChatError::Model(e) => e.is_retryable(),
            _ => false,
        }
    }

    /// Whether the root cause is a backend that did not answer in time
    pub fn is_timeout(&self) -> bool {
        match self {
            DocChatError::Store(StoreError::Timeout(_))
            | DocChatError::Vector(VectorStoreError::Timeout(_))
            | DocChatError::Model(ModelError::Timeout(_)) => true,
            DocChatError::Vector(VectorStoreError::Http(e)) | DocChatError::Model(ModelError::Http(e)) => {
                e.is_timeout()
            }
            DocChatError::Vector(VectorStoreError::Embedding(ModelError::Http(e))) => e.is_timeout(),
            DocChatError::Vector(VectorStoreError::Embedding(ModelError::Timeout(_))) => true,
            DocChatError::Store(StoreError::Redis(e)) => e.is_timeout(),
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for DocChatError {
    fn from(e: tokio::task::JoinError) -> Self {
        DocChatError::Internal {
            message: format!("worker task failed: {e}"),
        }
    }
}

pub type DocChatResult<T> = Result<T, DocChatError>;
