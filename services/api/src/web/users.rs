//! services/api/src/web/users.rs
//!
//! Admin-only employee management endpoints.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use skilldeck_core::domain::{Principal, User};
use skilldeck_core::ops::{identity, invites};
use skilldeck_core::ports::UserPatch;

use crate::error::{to_http, ErrorBody, HttpError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub role: String,
    pub can_create_courses: bool,
    pub is_active: bool,
    pub is_registered: bool,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id,
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            role: user.role.as_str().to_string(),
            can_create_courses: user.can_create_courses,
            is_active: user.is_active,
            is_registered: user.is_registered(),
            created_at: user.created_at,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct CreateUserRequest {
    pub full_name: String,
    pub email: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct CreatedUserResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub invite_link: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateUserRequest {
    pub full_name: Option<String>,
    // Double option: absent leaves the email alone, null clears it.
    #[serde(default, deserialize_with = "double_option")]
    pub email: Option<Option<String>>,
    pub can_create_courses: Option<bool>,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

#[derive(Serialize, ToSchema)]
pub struct InviteLinkResponse {
    pub invite_link: String,
    pub expires_at: DateTime<Utc>,
}

fn invite_link(state: &AppState, token: &str) -> String {
    format!("{}/invite/{}", state.config.base_url, token)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/users - List all employees in the caller's company
#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "Employees of the company", body = [UserResponse]),
        (status = 401, description = "Not logged in", body = ErrorBody),
        (status = 403, description = "Admin role required", body = ErrorBody)
    )
)]
pub async fn list_users_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, HttpError> {
    principal.require_admin().map_err(to_http)?;
    let users = identity::list_employees(state.store.as_ref(), principal.company_id)
        .await
        .map_err(to_http)?;
    let body: Vec<UserResponse> = users.iter().map(UserResponse::from_user).collect();
    Ok(Json(body))
}

/// POST /api/users - Create an employee and their invite link
#[utoipa::path(
    post,
    path = "/api/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "Employee created", body = CreatedUserResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Admin role required", body = ErrorBody),
        (status = 409, description = "Email already used in this company", body = ErrorBody)
    )
)]
pub async fn create_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, HttpError> {
    principal.require_admin().map_err(to_http)?;
    let (user, invite) = identity::create_employee(
        state.store.as_ref(),
        principal.company_id,
        &req.full_name,
        req.email.as_deref(),
    )
    .await
    .map_err(to_http)?;

    Ok((
        StatusCode::CREATED,
        Json(CreatedUserResponse {
            user: UserResponse::from_user(&user),
            invite_link: invite_link(&state, &invite.token),
        }),
    ))
}

/// PATCH /api/users/{id} - Update an employee's profile or capabilities
#[utoipa::path(
    patch,
    path = "/api/users/{id}",
    request_body = UpdateUserRequest,
    responses(
        (status = 200, description = "Employee updated", body = UserResponse),
        (status = 403, description = "Admin role required", body = ErrorBody),
        (status = 404, description = "No such employee in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The employee's id.")
    )
)]
pub async fn update_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
    Json(req): Json<UpdateUserRequest>,
) -> Result<impl IntoResponse, HttpError> {
    principal.require_admin().map_err(to_http)?;
    let user = identity::update_employee(
        state.store.as_ref(),
        principal.company_id,
        user_id,
        UserPatch {
            full_name: req.full_name,
            email: req.email,
            can_create_courses: req.can_create_courses,
        },
    )
    .await
    .map_err(to_http)?;
    Ok(Json(UserResponse::from_user(&user)))
}

/// DELETE /api/users/{id} - Terminate an employee
///
/// Deactivation, not deletion: history stays. Terminating an already
/// inactive employee is a no-op; terminating yourself is refused.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    responses(
        (status = 204, description = "Employee terminated"),
        (status = 403, description = "Admin role required or self-termination", body = ErrorBody),
        (status = 404, description = "No such employee in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The employee's id.")
    )
)]
pub async fn terminate_user_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    principal.require_admin().map_err(to_http)?;
    identity::terminate_employee(
        state.store.as_ref(),
        principal.user_id,
        principal.company_id,
        user_id,
    )
    .await
    .map_err(to_http)?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/users/{id}/invite - Issue a fresh invite link
#[utoipa::path(
    post,
    path = "/api/users/{id}/invite",
    responses(
        (status = 201, description = "New invite issued", body = InviteLinkResponse),
        (status = 403, description = "Admin role required", body = ErrorBody),
        (status = 404, description = "No such active employee", body = ErrorBody),
        (status = 409, description = "Employee already registered", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The employee's id.")
    )
)]
pub async fn reissue_invite_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let invite = invites::reissue(state.store.as_ref(), &principal, user_id)
        .await
        .map_err(to_http)?;
    Ok((
        StatusCode::CREATED,
        Json(InviteLinkResponse {
            invite_link: invite_link(&state, &invite.token),
            expires_at: invite.expires_at,
        }),
    ))
}
