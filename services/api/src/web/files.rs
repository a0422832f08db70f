//! services/api/src/web/files.rs
//!
//! File upload, signed download links, and the public blob route the
//! links point at.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use skilldeck_core::domain::Principal;
use skilldeck_core::ops::courses;

use crate::error::{to_http, ErrorBody, HttpError};
use crate::web::courses::FileResponse;
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct DownloadUrlResponse {
    pub file_name: String,
    pub url: String,
}

#[derive(Deserialize)]
pub struct DownloadQuery {
    pub name: String,
    pub exp: i64,
    pub sig: String,
}

fn bad_request(message: &str) -> HttpError {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_string(),
        }),
    )
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/files/upload - Attach a file to a course or task
///
/// Accepts multipart/form-data with a `course_id` field, an optional
/// `task_id` field, and a single `file` part. Parts may arrive in any
/// order, but the ids must precede the file part.
#[utoipa::path(
    post,
    path = "/api/files/upload",
    request_body(content_type = "multipart/form-data", description = "course_id, optional task_id, and the file."),
    responses(
        (status = 201, description = "File stored", body = FileResponse),
        (status = 400, description = "Malformed multipart body", body = ErrorBody),
        (status = 403, description = "Course-creation capability required", body = ErrorBody),
        (status = 404, description = "No such course or task in this company", body = ErrorBody)
    )
)]
pub async fn upload_file_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, HttpError> {
    let mut course_id: Option<Uuid> = None;
    let mut task_id: Option<Uuid> = None;
    let mut file: Option<(String, String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(&format!("failed to read multipart data: {e}")))?
    {
        let field_name = field.name().map(|s| s.to_string());
        match field_name.as_deref() {
            Some("course_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(&format!("failed to read course_id: {e}")))?;
                course_id =
                    Some(Uuid::parse_str(text.trim()).map_err(|_| bad_request("invalid course_id"))?);
            }
            Some("task_id") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| bad_request(&format!("failed to read task_id: {e}")))?;
                let text = text.trim();
                if !text.is_empty() {
                    task_id =
                        Some(Uuid::parse_str(text).map_err(|_| bad_request("invalid task_id"))?);
                }
            }
            Some("file") => {
                let name = field.file_name().unwrap_or("untitled").to_string();
                let mime = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| bad_request(&format!("failed to read file bytes: {e}")))?;
                file = Some((name, mime, data.to_vec()));
            }
            _ => {}
        }
    }

    let course_id = course_id.ok_or_else(|| bad_request("course_id field is required"))?;
    let (file_name, mime_type, bytes) =
        file.ok_or_else(|| bad_request("multipart form must include a file"))?;

    let stored = courses::attach_file(
        state.store.as_ref(),
        state.blob.as_ref(),
        &principal,
        course_id,
        task_id,
        &file_name,
        &bytes,
        &mime_type,
    )
    .await
    .map_err(to_http)?;

    Ok((StatusCode::CREATED, Json(FileResponse::from_file(&stored))))
}

/// GET /api/files/{id} - Get a short-lived signed download URL
#[utoipa::path(
    get,
    path = "/api/files/{id}",
    responses(
        (status = 200, description = "Signed URL, valid for one hour", body = DownloadUrlResponse),
        (status = 404, description = "No such file in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The file id.")
    )
)]
pub async fn file_download_url_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let (url, file_name) = courses::file_download_url(
        state.store.as_ref(),
        state.blob.as_ref(),
        &principal,
        file_id,
    )
    .await
    .map_err(to_http)?;
    Ok(Json(DownloadUrlResponse { file_name, url }))
}

/// DELETE /api/files/{id} - Remove a stored file
#[utoipa::path(
    delete,
    path = "/api/files/{id}",
    responses(
        (status = 204, description = "File deleted"),
        (status = 403, description = "Course-creation capability required", body = ErrorBody),
        (status = 404, description = "No such file in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The file id.")
    )
)]
pub async fn delete_file_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(file_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    courses::delete_file(state.store.as_ref(), state.blob.as_ref(), &principal, file_id)
        .await
        .map_err(to_http)?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/blob/{*key} - Serve file bytes for a signed URL
///
/// Public by design: the signature in the query string is the
/// authorization. Tampering with the key, name, or expiry invalidates it.
pub async fn blob_download_handler(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(query): Query<DownloadQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let path = state
        .blob
        .verify_download(&key, &query.name, query.exp, &query.sig)
        .map_err(to_http)?;

    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        error!("Failed to read blob {}: {:?}", key, e);
        to_http(skilldeck_core::ports::PortError::NotFound(
            "file not found".to_string(),
        ))
    })?;

    let disposition = format!("attachment; filename=\"{}\"", query.name.replace('"', ""));
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}
