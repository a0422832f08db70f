//! crates/skilldeck_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases,
//! password hashing, or blob storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Company, Course, CourseAssignment, CourseSummary, FileRef, InviteToken, Notification,
    NotificationKind, Principal, Task, User,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error taxonomy shared by every port and operation.
///
/// Each variant maps to one stable, machine-readable failure kind; the
/// HTTP layer decides how to render them. Cross-tenant access is always
/// reported as `NotFound`, never `Forbidden`.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Invalid input: {0}")]
    Validation(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Gone: {0}")]
    Gone(String),
    #[error("Expired: {0}")]
    Expired(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Patch and Outcome Value Types
//=========================================================================================

/// Admin edit of an employee. `email` distinguishes "leave untouched"
/// (outer `None`) from "clear" (inner `None`).
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub full_name: Option<String>,
    pub email: Option<Option<String>>,
    pub can_create_courses: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct CoursePatch {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub is_published: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub content: Option<Option<String>>,
    pub order: Option<i32>,
}

/// Input for recording an uploaded file; the store assigns id and timestamp.
#[derive(Debug, Clone)]
pub struct NewFileRef {
    pub course_id: Uuid,
    pub task_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub file_key: String,
    pub file_size: i64,
    pub mime_type: String,
}

/// Result of the conditional COMPLETED transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// The assignment was moved to COMPLETED by this call.
    Completed,
    /// Already terminal; nothing was written.
    AlreadyCompleted,
    /// No assignment exists for the pair.
    NotAssigned,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// The durable-storage port.
///
/// Every method that spans a multi-field invariant (company + admin
/// bootstrap, user + invite creation, token consumption, assignment
/// upserts and transitions, notification dedup) is required to be atomic
/// in the implementation: either a transaction or an equivalent
/// conditional write. Methods taking a `company_id` are tenant-scoped and
/// must treat rows of other companies as absent.
#[async_trait]
pub trait Store: Send + Sync {
    // --- Companies and users ---
    async fn create_company_with_admin(
        &self,
        name: &str,
        admin_full_name: &str,
        admin_email: &str,
        password_hash: &str,
    ) -> PortResult<(Company, User)>;

    /// Global email lookup regardless of activity, used for the
    /// registration-time uniqueness check.
    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>>;

    /// Global lookup of an active user by email, used for login.
    async fn find_active_user_by_email(&self, email: &str) -> PortResult<Option<User>>;

    /// Creates an unregistered user together with their first invite token.
    async fn create_employee_with_invite(
        &self,
        company_id: Uuid,
        full_name: &str,
        email: Option<&str>,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<(User, InviteToken)>;

    async fn find_user(&self, company_id: Uuid, user_id: Uuid) -> PortResult<Option<User>>;

    /// True if any user (active or not) of the company already has the email.
    async fn email_in_company(&self, company_id: Uuid, email: &str) -> PortResult<bool>;

    /// Roster ordered active-first, then by creation time.
    async fn list_users(&self, company_id: Uuid) -> PortResult<Vec<User>>;

    async fn update_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        patch: &UserPatch,
    ) -> PortResult<Option<User>>;

    /// Soft delete. Returns false when the user is not in the company.
    async fn deactivate_user(&self, company_id: Uuid, user_id: Uuid) -> PortResult<bool>;

    // --- Invite tokens ---
    async fn create_invite(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<InviteToken>;

    async fn find_invite(&self, token: &str) -> PortResult<Option<(InviteToken, User)>>;

    /// Atomically marks the token used and sets the owner's password hash.
    ///
    /// All validity conditions are re-checked inside the same atomic unit,
    /// so two racing calls produce exactly one success; the loser receives
    /// the same failure kind a later sequential caller would.
    async fn consume_invite(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<()>;

    // --- Auth sessions ---
    async fn create_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// Resolves a session id into a principal, re-deriving capabilities
    /// from the current user row. Expired sessions and inactive users
    /// resolve to `None`.
    async fn resolve_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Principal>>;

    async fn delete_session(&self, session_id: &str) -> PortResult<()>;

    // --- Courses ---
    async fn create_course(
        &self,
        company_id: Uuid,
        created_by: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> PortResult<Course>;

    async fn list_courses(&self, company_id: Uuid) -> PortResult<Vec<CourseSummary>>;

    async fn find_course(&self, company_id: Uuid, course_id: Uuid) -> PortResult<Option<Course>>;

    /// Unscoped lookup for flows where membership is proven by an
    /// assignment row rather than by the caller's company.
    async fn get_course(&self, course_id: Uuid) -> PortResult<Option<Course>>;

    async fn update_course(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        patch: &CoursePatch,
    ) -> PortResult<Option<Course>>;

    /// Deletes the course and everything hanging off it.
    async fn delete_course(&self, company_id: Uuid, course_id: Uuid) -> PortResult<bool>;

    // --- Tasks ---
    /// Appends a task with order = max(existing) + 1, atomically.
    async fn create_task(
        &self,
        course_id: Uuid,
        title: &str,
        content: Option<&str>,
    ) -> PortResult<Task>;

    async fn list_tasks(&self, course_id: Uuid) -> PortResult<Vec<Task>>;

    async fn find_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
    ) -> PortResult<Option<Task>>;

    async fn update_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> PortResult<Option<Task>>;

    async fn delete_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
    ) -> PortResult<bool>;

    // --- Files ---
    async fn create_file(&self, new_file: NewFileRef) -> PortResult<FileRef>;

    /// Returns the file together with the owning course's company id so
    /// callers can apply the tenant check themselves.
    async fn get_file(&self, file_id: Uuid) -> PortResult<Option<(FileRef, Uuid)>>;

    async fn delete_file(&self, file_id: Uuid) -> PortResult<()>;

    /// All files of a course, both course-level and per-task.
    async fn list_course_files(&self, course_id: Uuid) -> PortResult<Vec<FileRef>>;

    // --- Assignments ---
    /// How many of the given ids are active members of the company.
    async fn count_active_users(&self, company_id: Uuid, user_ids: &[Uuid]) -> PortResult<usize>;

    /// Insert-if-absent: an existing row is left completely untouched.
    /// Returns true when a new assignment was created.
    async fn assign_if_absent(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<bool>;

    async fn find_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<Option<CourseAssignment>>;

    /// The user's assignments, newest-first, with course and task count.
    async fn list_user_assignments(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<(CourseAssignment, Course, i64)>>;

    async fn list_course_assignments(
        &self,
        course_id: Uuid,
    ) -> PortResult<Vec<(CourseAssignment, User)>>;

    /// Compare-and-set ASSIGNED -> IN_PROGRESS, stamping started_at.
    /// Returns true only when this call performed the transition.
    async fn start_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<bool>;

    /// Conditional move to COMPLETED, backfilling started_at when the
    /// course was never opened. Never regresses a terminal row.
    async fn complete_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<CompletionOutcome>;

    // --- Notifications ---
    /// Dedup insert keyed on (user_id, kind, course_id). Returns false
    /// when an equal notification already exists.
    async fn push_notification(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        course_id: Uuid,
        course_title: &str,
        now: DateTime<Utc>,
    ) -> PortResult<bool>;

    /// Most recent notifications (bounded), marking all unread ones read
    /// as a side effect. The read and the mark are two steps; concurrent
    /// fetches only converge eventually.
    async fn fetch_notifications_marking_read(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<Notification>>;
}

/// One-way credential hashing. Implementations are expected to be
/// deliberately expensive; the domain only sees opaque strings.
pub trait PasswordHashService: Send + Sync {
    fn hash(&self, plaintext: &str) -> PortResult<String>;
    fn verify(&self, plaintext: &str, hash: &str) -> bool;
}

/// External byte storage. Keys are namespaced
/// `{company_id}/{course_id}/{opaque}.{ext}`.
#[async_trait]
pub trait BlobStoreService: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8], content_type: &str) -> PortResult<()>;

    async fn delete(&self, key: &str) -> PortResult<()>;

    /// A time-limited download URL forcing the given filename.
    async fn signed_download_url(
        &self,
        key: &str,
        file_name: &str,
        ttl_seconds: u64,
    ) -> PortResult<String>;
}
