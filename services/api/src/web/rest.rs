//! services/api/src/web/rest.rs
//!
//! Assembles the Axum router and holds the master definition for the
//! OpenAPI specification.

use axum::{
    extract::DefaultBodyLimit,
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use utoipa::OpenApi;

use crate::web::middleware::require_auth;
use crate::web::state::AppState;
use crate::web::{auth, courses, files, invite, my_courses, notifications, users};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        auth::register_company_handler,
        auth::login_handler,
        auth::logout_handler,
        invite::inspect_invite_handler,
        invite::accept_invite_handler,
        users::list_users_handler,
        users::create_user_handler,
        users::update_user_handler,
        users::terminate_user_handler,
        users::reissue_invite_handler,
        courses::list_courses_handler,
        courses::create_course_handler,
        courses::course_detail_handler,
        courses::update_course_handler,
        courses::delete_course_handler,
        courses::create_task_handler,
        courses::update_task_handler,
        courses::delete_task_handler,
        courses::assign_course_handler,
        my_courses::my_courses_handler,
        my_courses::open_course_handler,
        my_courses::complete_course_handler,
        notifications::list_notifications_handler,
        files::upload_file_handler,
        files::file_download_url_handler,
        files::delete_file_handler,
    ),
    components(
        schemas(
            crate::error::ErrorBody,
            auth::RegisterCompanyRequest,
            auth::LoginRequest,
            auth::AuthResponse,
            invite::InvitePreviewResponse,
            invite::AcceptInviteRequest,
            invite::AcceptInviteResponse,
            users::UserResponse,
            users::CreateUserRequest,
            users::CreatedUserResponse,
            users::UpdateUserRequest,
            users::InviteLinkResponse,
            courses::CourseResponse,
            courses::CourseSummaryResponse,
            courses::CourseDetailResponse,
            courses::TaskResponse,
            courses::FileResponse,
            courses::AssignmentEntry,
            courses::CreateCourseRequest,
            courses::UpdateCourseRequest,
            courses::CreateTaskRequest,
            courses::UpdateTaskRequest,
            courses::AssignCourseRequest,
            courses::AssignCourseResponse,
            my_courses::MyCourseResponse,
            my_courses::MyCourseDetailResponse,
            notifications::NotificationResponse,
            files::DownloadUrlResponse,
        )
    ),
    tags(
        (name = "SkillDeck API", description = "API endpoints for the corporate training backend.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// Router Assembly
//=========================================================================================

/// Builds the full API router over a prepared `AppState`.
///
/// Shared by the binary and the integration tests, so the tests exercise
/// the exact routing and middleware the server runs.
pub fn build_router(app_state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("http://localhost:3000"))
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // Public routes (no auth required)
    let public_routes = Router::new()
        .route("/api/companies", post(auth::register_company_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route(
            "/api/invite/{token}",
            get(invite::inspect_invite_handler).post(invite::accept_invite_handler),
        )
        .route("/api/blob/{*key}", get(files::blob_download_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route(
            "/api/users",
            get(users::list_users_handler).post(users::create_user_handler),
        )
        .route(
            "/api/users/{id}",
            patch(users::update_user_handler).delete(users::terminate_user_handler),
        )
        .route("/api/users/{id}/invite", post(users::reissue_invite_handler))
        .route(
            "/api/courses",
            get(courses::list_courses_handler).post(courses::create_course_handler),
        )
        .route(
            "/api/courses/{id}",
            get(courses::course_detail_handler)
                .patch(courses::update_course_handler)
                .delete(courses::delete_course_handler),
        )
        .route("/api/courses/{id}/tasks", post(courses::create_task_handler))
        .route(
            "/api/courses/{id}/tasks/{task_id}",
            patch(courses::update_task_handler).delete(courses::delete_task_handler),
        )
        .route("/api/courses/{id}/assign", post(courses::assign_course_handler))
        .route("/api/my-courses", get(my_courses::my_courses_handler))
        .route("/api/my-courses/{id}", get(my_courses::open_course_handler))
        .route(
            "/api/my-courses/{id}/complete",
            post(my_courses::complete_course_handler),
        )
        .route(
            "/api/notifications",
            get(notifications::list_notifications_handler),
        )
        .route("/api/files/upload", post(files::upload_file_handler))
        .route(
            "/api/files/{id}",
            get(files::file_download_url_handler).delete(files::delete_file_handler),
        )
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(DefaultBodyLimit::max(10 * 1024 * 1024))
        .layer(cors)
        .with_state(app_state)
}
