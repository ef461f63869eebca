//! REST API Error Types
//!
//! Provides error types and conversions for the REST API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use super::dto::ApiResponse;
use crate::error::DocChatError;
use crate::llm::ModelError;

/// API error response
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub code: String,
    pub message: String,
}

impl ApiError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

/// REST API error that can be returned from handlers
#[derive(Debug)]
pub struct RestError {
    pub status: StatusCode,
    pub error: ApiError,
}

impl RestError {
    pub fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            error: ApiError::new(code, message),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "BAD_REQUEST", message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, "CONFLICT", message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "SERVICE_UNAVAILABLE", message)
    }

    pub fn bad_gateway(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl IntoResponse for RestError {
    fn into_response(self) -> Response {
        let body = ApiResponse::error(self.error.code, self.error.message);
        (self.status, Json(body)).into_response()
    }
}

// Conversions from domain errors
impl From<DocChatError> for RestError {
    fn from(err: DocChatError) -> Self {
        if err.is_timeout() || err.is_retryable() {
            tracing::warn!(error = %err, "backend unavailable");
            return RestError::unavailable(err.to_string());
        }
        match err {
            DocChatError::SessionNotFound { .. } | DocChatError::FileNotFound { .. } => {
                RestError::not_found(err.to_string())
            }
            DocChatError::NoDocuments => RestError::conflict(err.to_string()),
            DocChatError::InvalidRequest { .. } | DocChatError::Ingest(_) => {
                RestError::bad_request(err.to_string())
            }
            DocChatError::Model(ModelError::Api { .. } | ModelError::EmptyResponse) => {
                RestError::bad_gateway(err.to_string())
            }
            other => {
                tracing::error!(error = %other, "request failed");
                RestError::internal(other.to_string())
            }
        }
    }
}
