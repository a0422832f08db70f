//! services/api/src/web/courses.rs
//!
//! Course, task, and assignment management endpoints. Everything here
//! except the course detail view requires the course-creation capability.

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

use skilldeck_core::domain::{Course, CourseAssignment, FileRef, Principal, Task};
use skilldeck_core::ops::{assignments, courses};
use skilldeck_core::ports::{CoursePatch, TaskPatch};

use crate::error::{to_http, ErrorBody, HttpError};
use crate::web::state::AppState;

//=========================================================================================
// Request/Response Types
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct CourseResponse {
    pub id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

impl CourseResponse {
    pub fn from_course(course: &Course) -> Self {
        Self {
            id: course.id,
            title: course.title.clone(),
            description: course.description.clone(),
            is_published: course.is_published,
            created_at: course.created_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CourseSummaryResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub task_count: i64,
    pub assignment_count: i64,
}

#[derive(Serialize, ToSchema)]
pub struct FileResponse {
    pub id: Uuid,
    pub task_id: Option<Uuid>,
    pub file_name: String,
    pub file_size: i64,
    pub mime_type: String,
}

impl FileResponse {
    pub fn from_file(file: &FileRef) -> Self {
        Self {
            id: file.id,
            task_id: file.task_id,
            file_name: file.file_name.clone(),
            file_size: file.file_size,
            mime_type: file.mime_type.clone(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct TaskResponse {
    pub id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub order: i32,
    pub files: Vec<FileResponse>,
}

impl TaskResponse {
    pub fn from_task(task: &Task, files: &[FileRef]) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            content: task.content.clone(),
            order: task.order,
            files: files.iter().map(FileResponse::from_file).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct AssignmentEntry {
    pub user_id: Uuid,
    pub full_name: String,
    pub status: String,
    pub assigned_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Serialize, ToSchema)]
pub struct CourseDetailResponse {
    #[serde(flatten)]
    pub course: CourseResponse,
    pub tasks: Vec<TaskResponse>,
    pub files: Vec<FileResponse>,
    pub assignments: Vec<AssignmentEntry>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCourseRequest {
    pub title: String,
    pub description: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateCourseRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    pub is_published: Option<bool>,
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub title: String,
    pub content: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub content: Option<Option<String>>,
    pub order: Option<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct AssignCourseRequest {
    pub user_ids: Vec<Uuid>,
}

#[derive(Serialize, ToSchema)]
pub struct AssignCourseResponse {
    pub assigned: usize,
}

fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn status_str(assignment: &CourseAssignment) -> String {
    assignment.status.as_str().to_string()
}

//=========================================================================================
// Course Handlers
//=========================================================================================

/// GET /api/courses - List the company's courses with counts
#[utoipa::path(
    get,
    path = "/api/courses",
    responses(
        (status = 200, description = "Courses of the company", body = [CourseSummaryResponse]),
        (status = 403, description = "Course-creation capability required", body = ErrorBody)
    )
)]
pub async fn list_courses_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
) -> Result<impl IntoResponse, HttpError> {
    let summaries = courses::list_courses(state.store.as_ref(), &principal)
        .await
        .map_err(to_http)?;
    let body: Vec<CourseSummaryResponse> = summaries
        .iter()
        .map(|s| CourseSummaryResponse {
            course: CourseResponse::from_course(&s.course),
            task_count: s.task_count,
            assignment_count: s.assignment_count,
        })
        .collect();
    Ok(Json(body))
}

/// POST /api/courses - Create a draft course
#[utoipa::path(
    post,
    path = "/api/courses",
    request_body = CreateCourseRequest,
    responses(
        (status = 201, description = "Course created", body = CourseResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 403, description = "Course-creation capability required", body = ErrorBody)
    )
)]
pub async fn create_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Json(req): Json<CreateCourseRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let course = courses::create_course(
        state.store.as_ref(),
        &principal,
        &req.title,
        req.description.as_deref(),
    )
    .await
    .map_err(to_http)?;
    Ok((StatusCode::CREATED, Json(CourseResponse::from_course(&course))))
}

/// GET /api/courses/{id} - Full course view
///
/// Readable with any session in the course's company; employees land
/// here from their assignments.
#[utoipa::path(
    get,
    path = "/api/courses/{id}",
    responses(
        (status = 200, description = "Course detail", body = CourseDetailResponse),
        (status = 404, description = "No such course in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn course_detail_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    let detail = courses::course_detail(state.store.as_ref(), &principal, course_id)
        .await
        .map_err(to_http)?;
    Ok(Json(CourseDetailResponse {
        course: CourseResponse::from_course(&detail.course),
        tasks: detail
            .tasks
            .iter()
            .map(|(task, files)| TaskResponse::from_task(task, files))
            .collect(),
        files: detail.files.iter().map(FileResponse::from_file).collect(),
        assignments: detail
            .assignments
            .iter()
            .map(|(assignment, user)| AssignmentEntry {
                user_id: user.id,
                full_name: user.full_name.clone(),
                status: status_str(assignment),
                assigned_at: assignment.assigned_at,
                completed_at: assignment.completed_at,
            })
            .collect(),
    }))
}

/// PATCH /api/courses/{id} - Edit or publish a course
#[utoipa::path(
    patch,
    path = "/api/courses/{id}",
    request_body = UpdateCourseRequest,
    responses(
        (status = 200, description = "Course updated", body = CourseResponse),
        (status = 403, description = "Course-creation capability required", body = ErrorBody),
        (status = 404, description = "No such course in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn update_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<UpdateCourseRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let course = courses::update_course(
        state.store.as_ref(),
        &principal,
        course_id,
        CoursePatch {
            title: req.title,
            description: req.description,
            is_published: req.is_published,
        },
    )
    .await
    .map_err(to_http)?;
    Ok(Json(CourseResponse::from_course(&course)))
}

/// DELETE /api/courses/{id} - Delete a course and everything under it
#[utoipa::path(
    delete,
    path = "/api/courses/{id}",
    responses(
        (status = 204, description = "Course deleted"),
        (status = 403, description = "Course-creation capability required", body = ErrorBody),
        (status = 404, description = "No such course in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn delete_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpError> {
    courses::delete_course(state.store.as_ref(), &principal, course_id)
        .await
        .map_err(to_http)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Task Handlers
//=========================================================================================

/// POST /api/courses/{id}/tasks - Append a task to a course
#[utoipa::path(
    post,
    path = "/api/courses/{id}/tasks",
    request_body = CreateTaskRequest,
    responses(
        (status = 201, description = "Task created", body = TaskResponse),
        (status = 400, description = "Invalid request", body = ErrorBody),
        (status = 404, description = "No such course in this company", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn create_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let task = courses::add_task(
        state.store.as_ref(),
        &principal,
        course_id,
        &req.title,
        req.content.as_deref(),
    )
    .await
    .map_err(to_http)?;
    Ok((StatusCode::CREATED, Json(TaskResponse::from_task(&task, &[]))))
}

/// PATCH /api/courses/{id}/tasks/{task_id} - Edit a task
#[utoipa::path(
    patch,
    path = "/api/courses/{id}/tasks/{task_id}",
    request_body = UpdateTaskRequest,
    responses(
        (status = 200, description = "Task updated", body = TaskResponse),
        (status = 404, description = "No such task", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id."),
        ("task_id" = Uuid, Path, description = "The task id.")
    )
)]
pub async fn update_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((course_id, task_id)): Path<(Uuid, Uuid)>,
    Json(req): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let task = courses::update_task(
        state.store.as_ref(),
        &principal,
        course_id,
        task_id,
        TaskPatch {
            title: req.title,
            content: req.content,
            order: req.order,
        },
    )
    .await
    .map_err(to_http)?;
    Ok(Json(TaskResponse::from_task(&task, &[])))
}

/// DELETE /api/courses/{id}/tasks/{task_id} - Remove a task
#[utoipa::path(
    delete,
    path = "/api/courses/{id}/tasks/{task_id}",
    responses(
        (status = 204, description = "Task deleted"),
        (status = 404, description = "No such task", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id."),
        ("task_id" = Uuid, Path, description = "The task id.")
    )
)]
pub async fn delete_task_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path((course_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<impl IntoResponse, HttpError> {
    courses::delete_task(state.store.as_ref(), &principal, course_id, task_id)
        .await
        .map_err(to_http)?;
    Ok(StatusCode::NO_CONTENT)
}

//=========================================================================================
// Assignment Handler
//=========================================================================================

/// POST /api/courses/{id}/assign - Assign a course to a set of employees
///
/// All-or-nothing: one invalid target rejects the whole batch. Employees
/// already assigned keep their progress. The response counts only the
/// newly created assignments.
#[utoipa::path(
    post,
    path = "/api/courses/{id}/assign",
    request_body = AssignCourseRequest,
    responses(
        (status = 200, description = "Batch assigned", body = AssignCourseResponse),
        (status = 400, description = "Empty target list", body = ErrorBody),
        (status = 404, description = "Course or a target employee not found", body = ErrorBody)
    ),
    params(
        ("id" = Uuid, Path, description = "The course id.")
    )
)]
pub async fn assign_course_handler(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(course_id): Path<Uuid>,
    Json(req): Json<AssignCourseRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let assigned = assignments::assign(state.store.as_ref(), &principal, course_id, &req.user_ids)
        .await
        .map_err(to_http)?;
    Ok(Json(AssignCourseResponse { assigned }))
}
