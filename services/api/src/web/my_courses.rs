//! services/api/src/web/my_courses.rs
//!
//! The employee-facing side of assignments: listing assigned courses,
//! opening one, and marking it complete.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

use skilldeck_core::domain::Principal;
use skilldeck_core::ops::assignments;

use crate::error::{to_http, ErrorBody, HttpError};
use crate::web::courses::{CourseResponse, FileResponse, TaskResponse};
use crate::web::state::AppState;

//=========================================================================================
// Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct MyCourseResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub status: String,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub task_count: i64,
}

#[derive(Serialize, ToSchema)]
pub struct MyCourseDetailResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub status: String,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tasks: Vec<TaskResponse>,
    pub files: Vec<FileResponse>,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /api/my-courses - List the caller's assigned courses
#[utoipa::path(
    get,
    path = "/api/my-courses",
    responses(
        (status = 200, description = "The caller's assignments, newest first", body = [MyCourseResponse]),
        (status = 401, description = "Not logged in", body = ErrorBody)
    )
)]
pub async fn my_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, HttpError> {
    let rows = assignments::my_courses(state.store.as_ref(), principal.user_id)
        .await
        .map_err(to_http)?;
    let body: Vec<MyCourseResponse> = rows
        .iter()
        .map(|(assignment, course, task_count)| MyCourseResponse {
            course: CourseResponse::from_course(course),
            status: assignment.status.as_str().to_string(),
            assigned_at: assignment.assigned_at,
            started_at: assignment.started_at,
            completed_at: assignment.completed_at,
            task_count: *task_count,
        })
        .collect();
    Ok(Json(body))
}

/// GET /api/my-courses/{id} - Open an assigned course
///
/// Opening a course the first time moves the assignment to IN_PROGRESS.
/// Completed assignments never regress.
#[utoipa::path(
    get,
    path = "/api/my-courses/{id}",
    responses(
        (status = 200, description = "Course content", body = MyCourseDetailResponse),
        (status = 404, description = "Not assigned or not published", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn open_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let view = assignments::open_course(state.store.as_ref(), principal.user_id, course_id)
        .await
        .map_err(to_http)?;
    Ok(Json(MyCourseDetailResponse {
        course: CourseResponse::from_course(&view.course),
        status: view.assignment.status.as_str().to_string(),
        started_at: view.assignment.started_at,
        completed_at: view.assignment.completed_at,
        tasks: view
            .tasks
            .iter()
            .map(|(task, files)| TaskResponse::from_task(task, files))
            .collect(),
        files: view.files.iter().map(FileResponse::from_file).collect(),
    }))
}

/// POST /api/my-courses/{id}/complete - Mark an assigned course complete
#[utoipa::path(
    post,
    path = "/api/my-courses/{id}/complete",
    responses(
        (status = 204, description = "Marked complete (idempotent)"),
        (status = 404, description = "Course is not assigned", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn complete_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    assignments::complete(state.store.as_ref(), principal.user_id, course_id)
        .await
        .map_err(to_http)?;
    Ok(StatusCode::NO_CONTENT)
}
