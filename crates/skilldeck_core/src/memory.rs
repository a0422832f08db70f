//! crates/skilldeck_core/src/memory.rs
//!
//! An in-memory implementation of the `Store` port. One mutex guards the
//! whole data set, so every trait method is atomic in exactly the way the
//! port contract demands of the SQL adapter's transactions. Used by the
//! unit and integration tests, and handy for local runs without Postgres.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    AssignmentStatus, AuthSession, Company, Course, CourseAssignment, CourseSummary, FileRef,
    InviteToken, Notification, NotificationKind, Principal, Role, Task, User,
};
use crate::ports::{
    CompletionOutcome, CoursePatch, NewFileRef, PortError, PortResult, Store, TaskPatch, UserPatch,
};

#[derive(Default)]
struct Inner {
    companies: HashMap<Uuid, Company>,
    users: HashMap<Uuid, User>,
    invites: HashMap<String, InviteToken>,
    sessions: HashMap<String, AuthSession>,
    courses: HashMap<Uuid, Course>,
    tasks: HashMap<Uuid, Task>,
    files: HashMap<Uuid, FileRef>,
    assignments: HashMap<(Uuid, Uuid), CourseAssignment>,
    notifications: Vec<Notification>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> PortResult<MutexGuard<'_, Inner>> {
        self.inner
            .lock()
            .map_err(|_| PortError::Unexpected("store mutex poisoned".to_string()))
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_company_with_admin(
        &self,
        name: &str,
        admin_full_name: &str,
        admin_email: &str,
        password_hash: &str,
    ) -> PortResult<(Company, User)> {
        let mut inner = self.lock()?;
        // Re-checked under the lock so the company and admin rows can never
        // be created against a concurrently-taken email.
        if inner
            .users
            .values()
            .any(|u| u.email.as_deref() == Some(admin_email))
        {
            return Err(PortError::Conflict("email already registered".to_string()));
        }
        let now = Utc::now();
        let company = Company {
            id: Uuid::new_v4(),
            name: name.to_string(),
            created_at: now,
        };
        let admin = User {
            id: Uuid::new_v4(),
            company_id: company.id,
            full_name: admin_full_name.to_string(),
            email: Some(admin_email.to_string()),
            password_hash: Some(password_hash.to_string()),
            role: Role::Admin,
            can_create_courses: true,
            is_active: true,
            created_at: now,
        };
        inner.companies.insert(company.id, company.clone());
        inner.users.insert(admin.id, admin.clone());
        Ok((company, admin))
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .find(|u| u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn find_active_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .find(|u| u.is_active && u.email.as_deref() == Some(email))
            .cloned())
    }

    async fn create_employee_with_invite(
        &self,
        company_id: Uuid,
        full_name: &str,
        email: Option<&str>,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<(User, InviteToken)> {
        let mut inner = self.lock()?;
        let now = Utc::now();
        let user = User {
            id: Uuid::new_v4(),
            company_id,
            full_name: full_name.to_string(),
            email: email.map(|e| e.to_string()),
            password_hash: None,
            role: Role::Employee,
            can_create_courses: false,
            is_active: true,
            created_at: now,
        };
        let invite = InviteToken {
            token: token.to_string(),
            user_id: user.id,
            created_at: now,
            expires_at,
            used_at: None,
        };
        inner.users.insert(user.id, user.clone());
        inner.invites.insert(invite.token.clone(), invite.clone());
        Ok((user, invite))
    }

    async fn find_user(&self, company_id: Uuid, user_id: Uuid) -> PortResult<Option<User>> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .get(&user_id)
            .filter(|u| u.company_id == company_id)
            .cloned())
    }

    async fn email_in_company(&self, company_id: Uuid, email: &str) -> PortResult<bool> {
        let inner = self.lock()?;
        Ok(inner
            .users
            .values()
            .any(|u| u.company_id == company_id && u.email.as_deref() == Some(email)))
    }

    async fn list_users(&self, company_id: Uuid) -> PortResult<Vec<User>> {
        let inner = self.lock()?;
        let mut users: Vec<User> = inner
            .users
            .values()
            .filter(|u| u.company_id == company_id)
            .cloned()
            .collect();
        users.sort_by(|a, b| {
            b.is_active
                .cmp(&a.is_active)
                .then(a.created_at.cmp(&b.created_at))
        });
        Ok(users)
    }

    async fn update_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        patch: &UserPatch,
    ) -> PortResult<Option<User>> {
        let mut inner = self.lock()?;
        let Some(user) = inner
            .users
            .get_mut(&user_id)
            .filter(|u| u.company_id == company_id)
        else {
            return Ok(None);
        };
        if let Some(full_name) = &patch.full_name {
            user.full_name = full_name.clone();
        }
        if let Some(email) = &patch.email {
            user.email = email.clone();
        }
        if let Some(flag) = patch.can_create_courses {
            user.can_create_courses = flag;
        }
        Ok(Some(user.clone()))
    }

    async fn deactivate_user(&self, company_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        let mut inner = self.lock()?;
        match inner
            .users
            .get_mut(&user_id)
            .filter(|u| u.company_id == company_id)
        {
            Some(user) => {
                user.is_active = false;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn create_invite(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<InviteToken> {
        let mut inner = self.lock()?;
        let invite = InviteToken {
            token: token.to_string(),
            user_id,
            created_at: Utc::now(),
            expires_at,
            used_at: None,
        };
        inner.invites.insert(invite.token.clone(), invite.clone());
        Ok(invite)
    }

    async fn find_invite(&self, token: &str) -> PortResult<Option<(InviteToken, User)>> {
        let inner = self.lock()?;
        let Some(invite) = inner.invites.get(token) else {
            return Ok(None);
        };
        let user = inner
            .users
            .get(&invite.user_id)
            .ok_or_else(|| PortError::Unexpected("invite without owner".to_string()))?;
        Ok(Some((invite.clone(), user.clone())))
    }

    async fn consume_invite(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut inner = self.lock()?;
        // All validity conditions re-checked inside the same critical
        // section that applies the write: the consumption race leaves
        // exactly one winner.
        let invite = inner
            .invites
            .get(token)
            .cloned()
            .ok_or_else(|| PortError::NotFound("invite link is invalid".to_string()))?;
        if invite.used_at.is_some() {
            return Err(PortError::Gone("invite link already used".to_string()));
        }
        if invite.expires_at < now {
            return Err(PortError::Expired("invite link expired".to_string()));
        }
        let user = inner
            .users
            .get_mut(&invite.user_id)
            .ok_or_else(|| PortError::Unexpected("invite without owner".to_string()))?;
        if user.password_hash.is_some() {
            return Err(PortError::Gone("user already registered".to_string()));
        }
        user.password_hash = Some(password_hash.to_string());
        if let Some(invite) = inner.invites.get_mut(token) {
            invite.used_at = Some(now);
        }
        Ok(())
    }

    async fn create_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.sessions.insert(
            session_id.to_string(),
            AuthSession {
                id: session_id.to_string(),
                user_id,
                expires_at,
            },
        );
        Ok(())
    }

    async fn resolve_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Principal>> {
        let inner = self.lock()?;
        let Some(session) = inner.sessions.get(session_id) else {
            return Ok(None);
        };
        if session.expires_at < now {
            return Ok(None);
        }
        // Capabilities are re-derived from the current user row on every
        // resolution; a terminated user loses access immediately.
        Ok(inner
            .users
            .get(&session.user_id)
            .filter(|u| u.is_active)
            .map(Principal::from_user))
    }

    async fn delete_session(&self, session_id: &str) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.sessions.remove(session_id);
        Ok(())
    }

    async fn create_course(
        &self,
        company_id: Uuid,
        created_by: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> PortResult<Course> {
        let mut inner = self.lock()?;
        let course = Course {
            id: Uuid::new_v4(),
            company_id,
            created_by,
            title: title.to_string(),
            description: description.map(|d| d.to_string()),
            is_published: false,
            created_at: Utc::now(),
        };
        inner.courses.insert(course.id, course.clone());
        Ok(course)
    }

    async fn list_courses(&self, company_id: Uuid) -> PortResult<Vec<CourseSummary>> {
        let inner = self.lock()?;
        let mut summaries: Vec<CourseSummary> = inner
            .courses
            .values()
            .filter(|c| c.company_id == company_id)
            .map(|course| CourseSummary {
                course: course.clone(),
                task_count: inner.tasks.values().filter(|t| t.course_id == course.id).count()
                    as i64,
                assignment_count: inner
                    .assignments
                    .values()
                    .filter(|a| a.course_id == course.id)
                    .count() as i64,
            })
            .collect();
        summaries.sort_by(|a, b| b.course.created_at.cmp(&a.course.created_at));
        Ok(summaries)
    }

    async fn find_course(&self, company_id: Uuid, course_id: Uuid) -> PortResult<Option<Course>> {
        let inner = self.lock()?;
        Ok(inner
            .courses
            .get(&course_id)
            .filter(|c| c.company_id == company_id)
            .cloned())
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Option<Course>> {
        let inner = self.lock()?;
        Ok(inner.courses.get(&course_id).cloned())
    }

    async fn update_course(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        patch: &CoursePatch,
    ) -> PortResult<Option<Course>> {
        let mut inner = self.lock()?;
        let Some(course) = inner
            .courses
            .get_mut(&course_id)
            .filter(|c| c.company_id == company_id)
        else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            course.title = title.clone();
        }
        if let Some(description) = &patch.description {
            course.description = description.clone();
        }
        if let Some(flag) = patch.is_published {
            course.is_published = flag;
        }
        Ok(Some(course.clone()))
    }

    async fn delete_course(&self, company_id: Uuid, course_id: Uuid) -> PortResult<bool> {
        let mut inner = self.lock()?;
        let owned = inner
            .courses
            .get(&course_id)
            .is_some_and(|c| c.company_id == company_id);
        if !owned {
            return Ok(false);
        }
        inner.courses.remove(&course_id);
        inner.tasks.retain(|_, t| t.course_id != course_id);
        inner.files.retain(|_, f| f.course_id != course_id);
        inner.assignments.retain(|_, a| a.course_id != course_id);
        Ok(true)
    }

    async fn create_task(
        &self,
        course_id: Uuid,
        title: &str,
        content: Option<&str>,
    ) -> PortResult<Task> {
        let mut inner = self.lock()?;
        let next_order = inner
            .tasks
            .values()
            .filter(|t| t.course_id == course_id)
            .map(|t| t.order)
            .max()
            .unwrap_or(0)
            + 1;
        let task = Task {
            id: Uuid::new_v4(),
            course_id,
            title: title.to_string(),
            content: content.map(|c| c.to_string()),
            order: next_order,
        };
        inner.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn list_tasks(&self, course_id: Uuid) -> PortResult<Vec<Task>> {
        let inner = self.lock()?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|t| t.course_id == course_id)
            .cloned()
            .collect();
        tasks.sort_by_key(|t| t.order);
        Ok(tasks)
    }

    async fn find_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
    ) -> PortResult<Option<Task>> {
        let inner = self.lock()?;
        let owned = inner
            .courses
            .get(&course_id)
            .is_some_and(|c| c.company_id == company_id);
        if !owned {
            return Ok(None);
        }
        Ok(inner
            .tasks
            .get(&task_id)
            .filter(|t| t.course_id == course_id)
            .cloned())
    }

    async fn update_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> PortResult<Option<Task>> {
        let mut inner = self.lock()?;
        let owned = inner
            .courses
            .get(&course_id)
            .is_some_and(|c| c.company_id == company_id);
        if !owned {
            return Ok(None);
        }
        let Some(task) = inner
            .tasks
            .get_mut(&task_id)
            .filter(|t| t.course_id == course_id)
        else {
            return Ok(None);
        };
        if let Some(title) = &patch.title {
            task.title = title.clone();
        }
        if let Some(content) = &patch.content {
            task.content = content.clone();
        }
        if let Some(order) = patch.order {
            task.order = order;
        }
        Ok(Some(task.clone()))
    }

    async fn delete_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
    ) -> PortResult<bool> {
        let mut inner = self.lock()?;
        let owned = inner
            .courses
            .get(&course_id)
            .is_some_and(|c| c.company_id == company_id);
        if !owned {
            return Ok(false);
        }
        let removable = inner
            .tasks
            .get(&task_id)
            .is_some_and(|t| t.course_id == course_id);
        if !removable {
            return Ok(false);
        }
        inner.tasks.remove(&task_id);
        // Files survive their task and become course-level, matching the
        // schema's ON DELETE SET NULL.
        for file in inner.files.values_mut() {
            if file.task_id == Some(task_id) {
                file.task_id = None;
            }
        }
        Ok(true)
    }

    async fn create_file(&self, new_file: NewFileRef) -> PortResult<FileRef> {
        let mut inner = self.lock()?;
        let file = FileRef {
            id: Uuid::new_v4(),
            course_id: new_file.course_id,
            task_id: new_file.task_id,
            uploaded_by: new_file.uploaded_by,
            file_name: new_file.file_name,
            file_key: new_file.file_key,
            file_size: new_file.file_size,
            mime_type: new_file.mime_type,
            created_at: Utc::now(),
        };
        inner.files.insert(file.id, file.clone());
        Ok(file)
    }

    async fn get_file(&self, file_id: Uuid) -> PortResult<Option<(FileRef, Uuid)>> {
        let inner = self.lock()?;
        let Some(file) = inner.files.get(&file_id) else {
            return Ok(None);
        };
        let course = inner
            .courses
            .get(&file.course_id)
            .ok_or_else(|| PortError::Unexpected("file without course".to_string()))?;
        Ok(Some((file.clone(), course.company_id)))
    }

    async fn delete_file(&self, file_id: Uuid) -> PortResult<()> {
        let mut inner = self.lock()?;
        inner.files.remove(&file_id);
        Ok(())
    }

    async fn list_course_files(&self, course_id: Uuid) -> PortResult<Vec<FileRef>> {
        let inner = self.lock()?;
        let mut files: Vec<FileRef> = inner
            .files
            .values()
            .filter(|f| f.course_id == course_id)
            .cloned()
            .collect();
        files.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(files)
    }

    async fn count_active_users(&self, company_id: Uuid, user_ids: &[Uuid]) -> PortResult<usize> {
        let inner = self.lock()?;
        Ok(user_ids
            .iter()
            .filter(|id| {
                inner
                    .users
                    .get(id)
                    .is_some_and(|u| u.company_id == company_id && u.is_active)
            })
            .count())
    }

    async fn assign_if_absent(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut inner = self.lock()?;
        if inner.assignments.contains_key(&(user_id, course_id)) {
            return Ok(false);
        }
        inner.assignments.insert(
            (user_id, course_id),
            CourseAssignment {
                user_id,
                course_id,
                status: AssignmentStatus::Assigned,
                assigned_at: now,
                started_at: None,
                completed_at: None,
            },
        );
        Ok(true)
    }

    async fn find_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<Option<CourseAssignment>> {
        let inner = self.lock()?;
        Ok(inner.assignments.get(&(user_id, course_id)).cloned())
    }

    async fn list_user_assignments(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<(CourseAssignment, Course, i64)>> {
        let inner = self.lock()?;
        let mut rows: Vec<(CourseAssignment, Course, i64)> = inner
            .assignments
            .values()
            .filter(|a| a.user_id == user_id)
            .filter_map(|a| {
                inner.courses.get(&a.course_id).map(|course| {
                    let task_count = inner
                        .tasks
                        .values()
                        .filter(|t| t.course_id == course.id)
                        .count() as i64;
                    (a.clone(), course.clone(), task_count)
                })
            })
            .collect();
        rows.sort_by(|a, b| b.0.assigned_at.cmp(&a.0.assigned_at));
        Ok(rows)
    }

    async fn list_course_assignments(
        &self,
        course_id: Uuid,
    ) -> PortResult<Vec<(CourseAssignment, User)>> {
        let inner = self.lock()?;
        let mut rows: Vec<(CourseAssignment, User)> = inner
            .assignments
            .values()
            .filter(|a| a.course_id == course_id)
            .filter_map(|a| {
                inner
                    .users
                    .get(&a.user_id)
                    .map(|user| (a.clone(), user.clone()))
            })
            .collect();
        rows.sort_by(|a, b| a.0.assigned_at.cmp(&b.0.assigned_at));
        Ok(rows)
    }

    async fn start_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut inner = self.lock()?;
        match inner.assignments.get_mut(&(user_id, course_id)) {
            Some(assignment) if assignment.status == AssignmentStatus::Assigned => {
                assignment.status = AssignmentStatus::InProgress;
                assignment.started_at = Some(now);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<CompletionOutcome> {
        let mut inner = self.lock()?;
        let Some(assignment) = inner.assignments.get_mut(&(user_id, course_id)) else {
            return Ok(CompletionOutcome::NotAssigned);
        };
        if assignment.status == AssignmentStatus::Completed {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }
        // A course completed without ever being opened still gets a
        // started_at, so the timestamp is never null on terminal rows.
        if assignment.status == AssignmentStatus::Assigned {
            assignment.started_at = Some(now);
        }
        assignment.status = AssignmentStatus::Completed;
        assignment.completed_at = Some(now);
        Ok(CompletionOutcome::Completed)
    }

    async fn push_notification(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        course_id: Uuid,
        course_title: &str,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let mut inner = self.lock()?;
        let duplicate = inner
            .notifications
            .iter()
            .any(|n| n.user_id == user_id && n.kind == kind && n.course_id == course_id);
        if duplicate {
            return Ok(false);
        }
        inner.notifications.push(Notification {
            id: Uuid::new_v4(),
            user_id,
            kind,
            course_id,
            course_title: course_title.to_string(),
            is_read: false,
            created_at: now,
        });
        Ok(true)
    }

    async fn fetch_notifications_marking_read(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<Notification>> {
        let mut inner = self.lock()?;
        let mut result: Vec<Notification> = inner
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        result.truncate(limit);
        for notification in inner.notifications.iter_mut() {
            if notification.user_id == user_id {
                notification.is_read = true;
            }
        }
        Ok(result)
    }
}
