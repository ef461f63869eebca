//! Model API Error Types

use thiserror::Error;

use crate::timeout::TimeoutError;

/// Errors from the embedding and completion APIs
#[derive(Error, Debug)]
pub enum ModelError {
    /// Transport-level failure
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-success status
    #[error("Model API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// The API answered but carried no usable content
    #[error("Model API returned an empty response")]
    EmptyResponse,

    /// No API key configured for a provider that needs one
    #[error("No API key configured for {provider}")]
    MissingApiKey { provider: &'static str },

    #[error(transparent)]
    Timeout(#[from] TimeoutError),
}

impl ModelError {
    /// Whether retrying the same call may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelError::Http(e) => e.is_timeout() || e.is_connect(),
            ModelError::Api { status, .. } => *status == 429 || *status >= 500,
            ModelError::Timeout(_) => true,
            ModelError::EmptyResponse | ModelError::MissingApiKey { .. } => false,
        }
    }
}

pub type ModelResult<T> = Result<T, ModelError>;
