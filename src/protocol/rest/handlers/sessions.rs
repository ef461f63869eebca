//! Session Handlers
//!
//! Session initialization (reuse or create with eviction) and removal.

use std::sync::Arc;

use axum::{extract::Path, Extension, Json};

use crate::protocol::rest::dto::{ApiResponse, CreateSessionRequest};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;
use crate::session::SessionInit;

/// Reuse the remembered session or open a new one
pub async fn create_session(
    Extension(handler): Extension<Arc<Handler>>,
    body: Option<Json<CreateSessionRequest>>,
) -> Result<Json<ApiResponse<SessionInit>>, RestError> {
    let request = body.map(|Json(r)| r).unwrap_or_default();
    let init = handler
        .service()
        .initialize_session(request.session_id.as_deref())
        .await?;

    Ok(Json(ApiResponse::success(init)))
}

/// Remove a session and all of its documents
pub async fn delete_session(
    Extension(handler): Extension<Arc<Handler>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<String>>, RestError> {
    handler.service().delete_session(&id).await?;

    Ok(Json(ApiResponse::success(format!("Session {id} removed"))))
}
