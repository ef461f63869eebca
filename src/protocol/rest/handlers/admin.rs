//! Admin Handlers
//!
//! Health check endpoint.

use std::sync::Arc;

use axum::{Extension, Json};

use crate::protocol::rest::dto::{ApiResponse, HealthDto};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;

/// Health check endpoint
pub async fn health(
    Extension(handler): Extension<Arc<Handler>>,
) -> Result<Json<ApiResponse<HealthDto>>, RestError> {
    let lifecycle = handler.service().lifecycle();
    let health = HealthDto {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: handler.uptime_seconds(),
        session_backend: lifecycle.store().backend_name().to_string(),
        vector_backend: lifecycle.coordinator().index().backend_name().to_string(),
        chats: handler.total_chats(),
        uploads: handler.total_uploads(),
    };

    Ok(Json(ApiResponse::success(health)))
}
