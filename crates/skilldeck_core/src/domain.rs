//! crates/skilldeck_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format.
//! Every entity except `Company` is owned by exactly one company; that
//! ownership is the tenant boundary enforced throughout the crate.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::ports::{PortError, PortResult};

/// The tenant root. Companies never share data.
#[derive(Debug, Clone)]
pub struct Company {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// The closed set of user roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Employee,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Employee => "EMPLOYEE",
        }
    }

    pub fn parse(value: &str) -> Option<Role> {
        match value {
            "ADMIN" => Some(Role::Admin),
            "EMPLOYEE" => Some(Role::Employee),
            _ => None,
        }
    }
}

/// A member of a company.
///
/// `password_hash` is `None` until the user completes invite registration.
/// `is_active = false` is a soft delete: the row survives for history but
/// the user is excluded from rosters, login, and assignment targeting.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub company_id: Uuid,
    pub full_name: String,
    pub email: Option<String>,
    pub password_hash: Option<String>,
    pub role: Role,
    pub can_create_courses: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A user counts as registered once a credential has been set.
    pub fn is_registered(&self) -> bool {
        self.password_hash.is_some()
    }
}

/// Single-use, time-limited registration token for a provisioned user.
///
/// Valid iff `used_at` is unset, `expires_at` has not passed, and the
/// owning user has no password hash yet. Several tokens may coexist for
/// one user; consuming any of them makes the rest unusable through the
/// password-hash guard.
#[derive(Debug, Clone)]
pub struct InviteToken {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct Course {
    pub id: Uuid,
    pub company_id: Uuid,
    pub created_by: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub is_published: bool,
    pub created_at: DateTime<Utc>,
}

/// A course plus the counts shown in management listings.
#[derive(Debug, Clone)]
pub struct CourseSummary {
    pub course: Course,
    pub task_count: i64,
    pub assignment_count: i64,
}

/// An ordered step inside a course. `order` is assigned as max+1 at
/// creation and never renumbered, so gaps are expected after deletions.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: Uuid,
    pub course_id: Uuid,
    pub title: String,
    pub content: Option<String>,
    pub order: i32,
}

/// Metadata for a stored file. The bytes live in the blob store under
/// `file_key`; `task_id = None` means a course-level shared file.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub id: Uuid,
    pub course_id: Uuid,
    pub task_id: Option<Uuid>,
    pub uploaded_by: Uuid,
    pub file_name: String,
    pub file_key: String,
    pub file_size: i64,
    pub mime_type: String,
    pub created_at: DateTime<Utc>,
}

/// Progress states, in order. Transitions only ever move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
}

impl AssignmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssignmentStatus::Assigned => "ASSIGNED",
            AssignmentStatus::InProgress => "IN_PROGRESS",
            AssignmentStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse(value: &str) -> Option<AssignmentStatus> {
        match value {
            "ASSIGNED" => Some(AssignmentStatus::Assigned),
            "IN_PROGRESS" => Some(AssignmentStatus::InProgress),
            "COMPLETED" => Some(AssignmentStatus::Completed),
            _ => None,
        }
    }
}

/// Per-(user, course) progress record. At most one exists per pair.
#[derive(Debug, Clone)]
pub struct CourseAssignment {
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: AssignmentStatus,
    pub assigned_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// The closed set of notification kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    CourseAssigned,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::CourseAssigned => "COURSE_ASSIGNED",
        }
    }

    pub fn parse(value: &str) -> Option<NotificationKind> {
        match value {
            "COURSE_ASSIGNED" => Some(NotificationKind::CourseAssigned),
            _ => None,
        }
    }
}

/// Best-effort event for a user. Duplicates are suppressed at creation
/// on the (user_id, kind, course_id) key.
#[derive(Debug, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub course_id: Uuid,
    pub course_title: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// Represents a browser login session (auth cookie)
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub id: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// The authenticated actor resolved for one operation.
///
/// Built from the user row at session-resolution time; never cached
/// across requests. An admin always has the course-creation capability
/// regardless of the stored flag.
#[derive(Debug, Clone, Copy)]
pub struct Principal {
    pub user_id: Uuid,
    pub company_id: Uuid,
    pub role: Role,
    pub can_create_courses: bool,
}

impl Principal {
    pub fn from_user(user: &User) -> Self {
        Principal {
            user_id: user.id,
            company_id: user.company_id,
            role: user.role,
            // Derived, not trusted from storage: ADMIN implies the capability.
            can_create_courses: user.role == Role::Admin || user.can_create_courses,
        }
    }

    pub fn require_admin(&self) -> PortResult<()> {
        if self.role != Role::Admin {
            return Err(PortError::Forbidden("admin role required".to_string()));
        }
        Ok(())
    }

    pub fn require_course_creator(&self) -> PortResult<()> {
        if !self.can_create_courses {
            return Err(PortError::Forbidden(
                "course creation capability required".to_string(),
            ));
        }
        Ok(())
    }

    /// Tenant check. Fails with `NotFound` rather than `Forbidden` so a
    /// cross-tenant probe cannot distinguish "exists elsewhere" from
    /// "does not exist".
    pub fn scope_to_company(&self, entity_company_id: Uuid) -> PortResult<()> {
        if entity_company_id != self.company_id {
            return Err(PortError::NotFound("not found".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user_with(role: Role, can_create_courses: bool) -> User {
        User {
            id: Uuid::new_v4(),
            company_id: Uuid::new_v4(),
            full_name: "Test".to_string(),
            email: None,
            password_hash: None,
            role,
            can_create_courses,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn admin_implies_course_creation_capability() {
        // The stored flag is stale on purpose; the derived principal wins.
        let principal = Principal::from_user(&user_with(Role::Admin, false));
        assert!(principal.can_create_courses);
        assert!(principal.require_course_creator().is_ok());
    }

    #[test]
    fn employee_without_capability_is_rejected() {
        let principal = Principal::from_user(&user_with(Role::Employee, false));
        assert!(matches!(
            principal.require_course_creator(),
            Err(PortError::Forbidden(_))
        ));
        assert!(matches!(
            principal.require_admin(),
            Err(PortError::Forbidden(_))
        ));
    }

    #[test]
    fn cross_tenant_scope_check_reports_not_found() {
        let principal = Principal::from_user(&user_with(Role::Admin, true));
        assert!(principal.scope_to_company(principal.company_id).is_ok());
        assert!(matches!(
            principal.scope_to_company(Uuid::new_v4()),
            Err(PortError::NotFound(_))
        ));
    }
}
