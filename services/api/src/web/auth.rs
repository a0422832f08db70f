//! services/api/src/web/auth.rs
//!
//! Public endpoints: company registration, login, and logout.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use skilldeck_core::ops::identity;

use crate::error::{to_http, ErrorBody, HttpError};
use crate::web::middleware::session_id_from_headers;
use crate::web::state::AppState;

const SESSION_TTL_DAYS: i64 = 30;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct RegisterCompanyRequest {
    pub company_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Serialize, ToSchema)]
pub struct AuthResponse {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role: String,
    pub can_create_courses: bool,
}

//=========================================================================================
// Session Helpers
//=========================================================================================

fn session_cookie(session_id: &str) -> String {
    format!(
        "session={}; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age={}",
        session_id,
        Duration::days(SESSION_TTL_DAYS).num_seconds()
    )
}

async fn open_session(state: &AppState, user_id: Uuid) -> Result<String, HttpError> {
    let session_id = Uuid::new_v4().to_string();
    let expires_at: DateTime<Utc> = Utc::now() + Duration::days(SESSION_TTL_DAYS);
    state
        .store
        .create_session(&session_id, user_id, expires_at)
        .await
        .map_err(to_http)?;
    Ok(session_id)
}

//=========================================================================================
// Handlers
//=========================================================================================

/// POST /api/companies - Register a company and its first admin account
#[utoipa::path(
    post,
    path = "/api/companies",
    request_body = RegisterCompanyRequest,
    responses(
        (status = 201, description = "Company registered", body = AuthResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 409, description = "Email already registered", body = ErrorBody)
    )
)]
pub async fn register_company_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterCompanyRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let registered = identity::register_company(
        state.store.as_ref(),
        state.hasher.as_ref(),
        &req.company_name,
        &req.email,
        &req.password,
    )
    .await
    .map_err(to_http)?;

    // Registering logs the admin straight in.
    let session_id = open_session(&state, registered.user_id).await?;

    let response = AuthResponse {
        user_id: registered.user_id,
        company_id: registered.company_id,
        role: "ADMIN".to_string(),
        can_create_courses: true,
    };

    Ok((
        StatusCode::CREATED,
        [(header::SET_COOKIE, session_cookie(&session_id))],
        Json(response),
    ))
}

/// POST /api/auth/login - Login with an existing account
#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 401, description = "Invalid credentials", body = ErrorBody)
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let user = identity::verify_credential(
        state.store.as_ref(),
        state.hasher.as_ref(),
        &req.email,
        &req.password,
    )
    .await
    .map_err(to_http)?
    .ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "invalid email or password".to_string(),
            }),
        )
    })?;

    let session_id = open_session(&state, user.id).await?;

    let response = AuthResponse {
        user_id: user.id,
        company_id: user.company_id,
        role: user.role.as_str().to_string(),
        can_create_courses: user.role == skilldeck_core::domain::Role::Admin
            || user.can_create_courses,
    };

    Ok((
        StatusCode::OK,
        [(header::SET_COOKIE, session_cookie(&session_id))],
        Json(response),
    ))
}

/// POST /api/auth/logout - Logout and invalidate the session
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    responses(
        (status = 200, description = "Logout successful"),
        (status = 401, description = "No active session", body = ErrorBody)
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, HttpError> {
    let session_id = session_id_from_headers(&headers).ok_or_else(|| {
        (
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "no session found".to_string(),
            }),
        )
    })?;

    if let Err(e) = state.store.delete_session(session_id).await {
        error!("Failed to delete auth session: {:?}", e);
        return Err(to_http(e));
    }

    let cookie = "session=; HttpOnly; Secure; SameSite=Lax; Path=/; Max-Age=0";

    Ok((StatusCode::OK, [(header::SET_COOKIE, cookie.to_string())]))
}
