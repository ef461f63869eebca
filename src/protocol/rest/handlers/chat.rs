//! Chat Handler

use std::sync::Arc;

use axum::{extract::Path, Extension, Json};

use crate::protocol::rest::dto::{ApiResponse, ChatRequest, ChatResponse};
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;

/// Answer a question from the session's documents
pub async fn chat(
    Extension(handler): Extension<Arc<Handler>>,
    Path(id): Path<String>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ApiResponse<ChatResponse>>, RestError> {
    handler.inc_chat_count();
    let answer = handler
        .service()
        .chat(&id, &request.query, &request.history)
        .await?;

    Ok(Json(ApiResponse::success(ChatResponse {
        session_id: id,
        answer,
    })))
}
