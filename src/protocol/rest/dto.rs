//! REST API Data Transfer Objects
//!
//! Defines request/response types for the REST API endpoints.

use serde::{Deserialize, Serialize};

use crate::llm::ChatMessage;

/// JSON response: { success, data?, error? }
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiErrorDto>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(ApiErrorDto {
                code: code.into(),
                message: message.into(),
            }),
        }
    }
}

/// Error details in API response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDto {
    pub code: String,
    pub message: String,
}

// Admin DTOs
/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDto {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub session_backend: String,
    pub vector_backend: String,
    pub chats: u64,
    pub uploads: u64,
}

// Session DTOs
/// Session init request; `session_id` is the id the client remembered, if any
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

// Chat DTOs
#[derive(Debug, Serialize, Deserialize)]
pub struct ChatRequest {
    pub query: String,
    /// Earlier turns of the conversation, oldest first
    #[serde(default)]
    pub history: Vec<ChatMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::de::DeserializeOwned;

    fn decode<T: DeserializeOwned>(raw: &str) -> ApiResponse<T> {
        serde_json::from_str(raw).unwrap()
    }

    #[test]
    fn test_error_envelope_decodes_without_data() {
        let raw = serde_json::to_string(&ApiResponse::error("NOT_FOUND", "gone")).unwrap();
        assert_eq!(raw, r#"{"success":false,"error":{"code":"NOT_FOUND","message":"gone"}}"#);

        let body: ApiResponse<ChatResponse> = decode(&raw);
        assert!(!body.success);
        assert!(body.data.is_none());
        assert_eq!(body.error.unwrap().message, "gone");
    }

    #[test]
    fn test_success_envelope_decodes_data() {
        let raw = serde_json::to_string(&ApiResponse::success(ChatResponse {
            session_id: "s".into(),
            answer: "42".into(),
        }))
        .unwrap();
        let body: ApiResponse<ChatResponse> = decode(&raw);
        assert_eq!(body.data.unwrap().answer, "42");
        assert!(body.error.is_none());
    }
}
