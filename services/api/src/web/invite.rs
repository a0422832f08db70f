//! services/api/src/web/invite.rs
//!
//! Public invite-token endpoints used by the registration landing page.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

use skilldeck_core::ops::invites;

use crate::error::{to_http, ErrorBody, HttpError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct InvitePreviewResponse {
    pub full_name: String,
    pub email: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct AcceptInviteRequest {
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AcceptInviteResponse {
    pub email: Option<String>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/invite/{token} - Preview who an invite belongs to
///
/// Distinguishes the failure modes so the landing page can explain them:
/// 404 for an unknown token, 410 for used, expired, or already-registered.
#[utoipa::path(
    get,
    path = "/api/invite/{token}",
    responses(
        (status = 200, description = "Invite is valid", body = InvitePreviewResponse),
        (status = 404, description = "Unknown token", body = ErrorBody),
        (status = 410, description = "Invite no longer usable", body = ErrorBody)
    ),
    params(
        ("token" = String, Path, description = "The opaque invite token.")
    )
)]
pub async fn inspect_invite_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, HttpError> {
    let preview = invites::inspect(state.store.as_ref(), &token)
        .await
        .map_err(to_http)?;
    Ok(Json(InvitePreviewResponse {
        full_name: preview.full_name,
        email: preview.email,
    }))
}

/// POST /api/invite/{token} - Set a password and finish registration
#[utoipa::path(
    post,
    path = "/api/invite/{token}",
    request_body = AcceptInviteRequest,
    responses(
        (status = 200, description = "Registration complete", body = AcceptInviteResponse),
        (status = 400, description = "Password too weak", body = ErrorBody),
        (status = 404, description = "Unknown token", body = ErrorBody),
        (status = 410, description = "Invite no longer usable", body = ErrorBody)
    ),
    params(
        ("token" = String, Path, description = "The opaque invite token.")
    )
)]
pub async fn accept_invite_handler(
    State(state): State<Arc<AppState>>,
    Path(token): Path<String>,
    Json(req): Json<AcceptInviteRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let email = invites::consume(
        state.store.as_ref(),
        state.hasher.as_ref(),
        &token,
        &req.password,
    )
    .await
    .map_err(to_http)?;
    Ok((StatusCode::OK, Json(AcceptInviteResponse { email })))
}
