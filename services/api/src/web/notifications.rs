//! services/api/src/web/notifications.rs
//!
//! Notification feed endpoint.

use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use skilldeck_core::domain::Principal;
use skilldeck_core::ops::notifications;

use crate::error::{to_http, ErrorBody, HttpError};
use crate::web::state::AppState;

#[derive(Serialize, ToSchema)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub kind: String,
    pub course_id: Uuid,
    pub course_title: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// GET /api/notifications - The caller's feed, newest first
///
/// Fetching marks everything read, so `is_read` reflects whether the
/// item had been seen before this request.
#[utoipa::path(
    get,
    path = "/api/notifications",
    responses(
        (status = 200, description = "Recent notifications", body = [NotificationResponse]),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn list_notifications_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, HttpError> {
    let items = notifications::fetch_and_mark_read(state.store.as_ref(), principal.user_id)
        .await
        .map_err(to_http)?;
    let body: Vec<NotificationResponse> = items
        .iter()
        .map(|n| NotificationResponse {
            id: n.id,
            kind: n.kind.as_str().to_string(),
            course_id: n.course_id,
            course_title: n.course_title.clone(),
            is_read: n.is_read,
            created_at: n.created_at,
        })
        .collect();
    Ok(Json(body))
}
