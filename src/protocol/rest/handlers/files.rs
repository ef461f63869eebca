//! File Handlers
//!
//! Listing, uploading and deleting the documents of a session. Uploads are
//! one file per request with the raw bytes as the body.

use std::sync::Arc;

use axum::{body::Bytes, extract::Path, Extension, Json};

use crate::protocol::rest::dto::ApiResponse;
use crate::protocol::rest::error::RestError;
use crate::protocol::Handler;
use crate::service::{SessionFiles, Upload, UploadReport};

pub async fn list_files(
    Extension(handler): Extension<Arc<Handler>>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<SessionFiles>>, RestError> {
    let files = handler.service().session_files(&id).await?;
    Ok(Json(ApiResponse::success(files)))
}

/// Store, chunk and index one document
pub async fn upload_file(
    Extension(handler): Extension<Arc<Handler>>,
    Path((id, name)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<ApiResponse<UploadReport>>, RestError> {
    if body.is_empty() {
        return Err(RestError::bad_request(format!("Upload {name} is empty")));
    }

    let report = handler
        .service()
        .upload_files(&id, vec![Upload::new(name, body.to_vec())])
        .await?;
    handler.inc_upload_count(report.accepted.len());

    Ok(Json(ApiResponse::success(report)))
}

pub async fn delete_file(
    Extension(handler): Extension<Arc<Handler>>,
    Path((id, name)): Path<(String, String)>,
) -> Result<Json<ApiResponse<String>>, RestError> {
    handler.service().delete_file(&id, &name).await?;
    Ok(Json(ApiResponse::success(format!("Deleted {name}"))))
}
