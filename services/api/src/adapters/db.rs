//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `Store` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.
//!
//! Queries use the runtime API rather than the compile-time macros so the
//! workspace builds without a live database. Every multi-field invariant
//! of the port contract is a transaction; every conditional transition is
//! a single guarded UPDATE checked through `rows_affected`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use skilldeck_core::domain::{
    AssignmentStatus, Company, Course, CourseAssignment, CourseSummary, FileRef, InviteToken,
    Notification, NotificationKind, Principal, Role, Task, User,
};
use skilldeck_core::ports::{
    CompletionOutcome, CoursePatch, NewFileRef, PortError, PortResult, Store, TaskPatch, UserPatch,
};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `Store` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::Error> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn db_err(e: sqlx::Error) -> PortError {
    match &e {
        // Unique-index violations are the losing side of a write race;
        // the application-level pre-checks only cover sequential callers.
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            PortError::Conflict("already exists".to_string())
        }
        _ => PortError::Unexpected(format!("database error: {e}")),
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct UserRecord {
    id: Uuid,
    company_id: Uuid,
    full_name: String,
    email: Option<String>,
    password_hash: Option<String>,
    role: String,
    can_create_courses: bool,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl UserRecord {
    fn to_domain(self) -> PortResult<User> {
        let role = Role::parse(&self.role)
            .ok_or_else(|| PortError::Unexpected(format!("unknown role '{}'", self.role)))?;
        Ok(User {
            id: self.id,
            company_id: self.company_id,
            full_name: self.full_name,
            email: self.email,
            password_hash: self.password_hash,
            role,
            can_create_courses: self.can_create_courses,
            is_active: self.is_active,
            created_at: self.created_at,
        })
    }
}

const USER_COLUMNS: &str =
    "id, company_id, full_name, email, password_hash, role, can_create_courses, is_active, created_at";

#[derive(FromRow)]
struct InviteRecord {
    token: String,
    user_id: Uuid,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    used_at: Option<DateTime<Utc>>,
}

impl InviteRecord {
    fn to_domain(self) -> InviteToken {
        InviteToken {
            token: self.token,
            user_id: self.user_id,
            created_at: self.created_at,
            expires_at: self.expires_at,
            used_at: self.used_at,
        }
    }
}

#[derive(FromRow)]
struct CourseRecord {
    id: Uuid,
    company_id: Uuid,
    created_by: Uuid,
    title: String,
    description: Option<String>,
    is_published: bool,
    created_at: DateTime<Utc>,
}

impl CourseRecord {
    fn to_domain(self) -> Course {
        Course {
            id: self.id,
            company_id: self.company_id,
            created_by: self.created_by,
            title: self.title,
            description: self.description,
            is_published: self.is_published,
            created_at: self.created_at,
        }
    }
}

const COURSE_COLUMNS: &str =
    "id, company_id, created_by, title, description, is_published, created_at";

#[derive(FromRow)]
struct TaskRecord {
    id: Uuid,
    course_id: Uuid,
    title: String,
    content: Option<String>,
    task_order: i32,
}

impl TaskRecord {
    fn to_domain(self) -> Task {
        Task {
            id: self.id,
            course_id: self.course_id,
            title: self.title,
            content: self.content,
            order: self.task_order,
        }
    }
}

#[derive(FromRow)]
struct FileRecord {
    id: Uuid,
    course_id: Uuid,
    task_id: Option<Uuid>,
    uploaded_by: Uuid,
    file_name: String,
    file_key: String,
    file_size: i64,
    mime_type: String,
    created_at: DateTime<Utc>,
}

impl FileRecord {
    fn to_domain(self) -> FileRef {
        FileRef {
            id: self.id,
            course_id: self.course_id,
            task_id: self.task_id,
            uploaded_by: self.uploaded_by,
            file_name: self.file_name,
            file_key: self.file_key,
            file_size: self.file_size,
            mime_type: self.mime_type,
            created_at: self.created_at,
        }
    }
}

const FILE_COLUMNS: &str =
    "id, course_id, task_id, uploaded_by, file_name, file_key, file_size, mime_type, created_at";

#[derive(FromRow)]
struct AssignmentRecord {
    user_id: Uuid,
    course_id: Uuid,
    status: String,
    assigned_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

impl AssignmentRecord {
    fn to_domain(self) -> PortResult<CourseAssignment> {
        let status = AssignmentStatus::parse(&self.status).ok_or_else(|| {
            PortError::Unexpected(format!("unknown assignment status '{}'", self.status))
        })?;
        Ok(CourseAssignment {
            user_id: self.user_id,
            course_id: self.course_id,
            status,
            assigned_at: self.assigned_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        })
    }
}

#[derive(FromRow)]
struct NotificationRecord {
    id: Uuid,
    user_id: Uuid,
    kind: String,
    course_id: Uuid,
    course_title: String,
    is_read: bool,
    created_at: DateTime<Utc>,
}

impl NotificationRecord {
    fn to_domain(self) -> PortResult<Notification> {
        let kind = NotificationKind::parse(&self.kind).ok_or_else(|| {
            PortError::Unexpected(format!("unknown notification kind '{}'", self.kind))
        })?;
        Ok(Notification {
            id: self.id,
            user_id: self.user_id,
            kind,
            course_id: self.course_id,
            course_title: self.course_title,
            is_read: self.is_read,
            created_at: self.created_at,
        })
    }
}

//=========================================================================================
// Store Implementation
//=========================================================================================

#[async_trait]
impl Store for DbAdapter {
    async fn create_company_with_admin(
        &self,
        name: &str,
        admin_full_name: &str,
        admin_email: &str,
        password_hash: &str,
    ) -> PortResult<(Company, User)> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Re-check the global email claim inside the transaction.
        let taken: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
                .bind(admin_email)
                .fetch_one(&mut *tx)
                .await
                .map_err(db_err)?;
        if taken {
            return Err(PortError::Conflict("email already registered".to_string()));
        }

        let company_id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query("INSERT INTO companies (id, name, created_at) VALUES ($1, $2, $3)")
            .bind(company_id)
            .bind(name)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let admin_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO users (id, company_id, full_name, email, password_hash, role, can_create_courses, is_active, created_at)
             VALUES ($1, $2, $3, $4, $5, 'ADMIN', TRUE, TRUE, $6)",
        )
        .bind(admin_id)
        .bind(company_id)
        .bind(admin_full_name)
        .bind(admin_email)
        .bind(password_hash)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok((
            Company {
                id: company_id,
                name: name.to_string(),
                created_at: now,
            },
            User {
                id: admin_id,
                company_id,
                full_name: admin_full_name.to_string(),
                email: Some(admin_email.to_string()),
                password_hash: Some(password_hash.to_string()),
                role: Role::Admin,
                can_create_courses: true,
                is_active: true,
                created_at: now,
            },
        ))
    }

    async fn find_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        record.map(UserRecord::to_domain).transpose()
    }

    async fn find_active_user_by_email(&self, email: &str) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 AND is_active LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        record.map(UserRecord::to_domain).transpose()
    }

    async fn create_employee_with_invite(
        &self,
        company_id: Uuid,
        full_name: &str,
        email: Option<&str>,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<(User, InviteToken)> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;
        let user_id = Uuid::new_v4();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO users (id, company_id, full_name, email, password_hash, role, can_create_courses, is_active, created_at)
             VALUES ($1, $2, $3, $4, NULL, 'EMPLOYEE', FALSE, TRUE, $5)",
        )
        .bind(user_id)
        .bind(company_id)
        .bind(full_name)
        .bind(email)
        .bind(now)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO invite_tokens (token, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(token)
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;

        Ok((
            User {
                id: user_id,
                company_id,
                full_name: full_name.to_string(),
                email: email.map(|e| e.to_string()),
                password_hash: None,
                role: Role::Employee,
                can_create_courses: false,
                is_active: true,
                created_at: now,
            },
            InviteToken {
                token: token.to_string(),
                user_id,
                created_at: now,
                expires_at,
                used_at: None,
            },
        ))
    }

    async fn find_user(&self, company_id: Uuid, user_id: Uuid) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND company_id = $2"
        ))
        .bind(user_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        record.map(UserRecord::to_domain).transpose()
    }

    async fn email_in_company(&self, company_id: Uuid, email: &str) -> PortResult<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM users WHERE company_id = $1 AND email = $2)",
        )
        .bind(company_id)
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn list_users(&self, company_id: Uuid) -> PortResult<Vec<User>> {
        let records = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE company_id = $1
             ORDER BY is_active DESC, created_at ASC"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        records.into_iter().map(UserRecord::to_domain).collect()
    }

    async fn update_user(
        &self,
        company_id: Uuid,
        user_id: Uuid,
        patch: &UserPatch,
    ) -> PortResult<Option<User>> {
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "UPDATE users SET
                full_name = COALESCE($3, full_name),
                email = CASE WHEN $4 THEN $5 ELSE email END,
                can_create_courses = COALESCE($6, can_create_courses)
             WHERE id = $1 AND company_id = $2
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(company_id)
        .bind(patch.full_name.as_deref())
        .bind(patch.email.is_some())
        .bind(patch.email.clone().flatten())
        .bind(patch.can_create_courses)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        record.map(UserRecord::to_domain).transpose()
    }

    async fn deactivate_user(&self, company_id: Uuid, user_id: Uuid) -> PortResult<bool> {
        let result = sqlx::query("UPDATE users SET is_active = FALSE WHERE id = $1 AND company_id = $2")
            .bind(user_id)
            .bind(company_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_invite(
        &self,
        user_id: Uuid,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> PortResult<InviteToken> {
        let record = sqlx::query_as::<_, InviteRecord>(
            "INSERT INTO invite_tokens (token, user_id, created_at, expires_at)
             VALUES ($1, $2, $3, $4)
             RETURNING token, user_id, created_at, expires_at, used_at",
        )
        .bind(token)
        .bind(user_id)
        .bind(Utc::now())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn find_invite(&self, token: &str) -> PortResult<Option<(InviteToken, User)>> {
        let Some(invite) = sqlx::query_as::<_, InviteRecord>(
            "SELECT token, user_id, created_at, expires_at, used_at
             FROM invite_tokens WHERE token = $1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        else {
            return Ok(None);
        };
        let user = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(invite.user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?
        .to_domain()?;
        Ok(Some((invite.to_domain(), user)))
    }

    async fn consume_invite(
        &self,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Lock the token and its owner, then reclassify under the lock:
        // the losing side of a race sees the same kinds a late sequential
        // caller would.
        let row = sqlx::query(
            "SELECT t.expires_at, t.used_at, u.password_hash
             FROM invite_tokens t JOIN users u ON u.id = t.user_id
             WHERE t.token = $1
             FOR UPDATE",
        )
        .bind(token)
        .fetch_optional(&mut *tx)
        .await
        .map_err(db_err)?;

        let Some(row) = row else {
            return Err(PortError::NotFound("invite link is invalid".to_string()));
        };
        let used_at: Option<DateTime<Utc>> = row.try_get("used_at").map_err(db_err)?;
        let expires_at: DateTime<Utc> = row.try_get("expires_at").map_err(db_err)?;
        let existing_hash: Option<String> = row.try_get("password_hash").map_err(db_err)?;
        if used_at.is_some() {
            return Err(PortError::Gone("invite link already used".to_string()));
        }
        if expires_at < now {
            return Err(PortError::Expired("invite link expired".to_string()));
        }
        if existing_hash.is_some() {
            return Err(PortError::Gone("user already registered".to_string()));
        }

        sqlx::query(
            "UPDATE users SET password_hash = $2
             WHERE id = (SELECT user_id FROM invite_tokens WHERE token = $1)",
        )
        .bind(token)
        .bind(password_hash)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;
        sqlx::query("UPDATE invite_tokens SET used_at = $2 WHERE token = $1")
            .bind(token)
            .bind(now)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)
    }

    async fn create_session(
        &self,
        session_id: &str,
        user_id: Uuid,
        expires_at: DateTime<Utc>,
    ) -> PortResult<()> {
        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(session_id)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn resolve_session(
        &self,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> PortResult<Option<Principal>> {
        // Capabilities are re-derived from the live user row, so role or
        // activity changes take effect on the very next request.
        let record = sqlx::query_as::<_, UserRecord>(&format!(
            "SELECT u.{} FROM auth_sessions s JOIN users u ON u.id = s.user_id
             WHERE s.id = $1 AND s.expires_at > $2 AND u.is_active",
            USER_COLUMNS.replace(", ", ", u."),
        ))
        .bind(session_id)
        .bind(now)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record
            .map(UserRecord::to_domain)
            .transpose()?
            .map(|user| Principal::from_user(&user)))
    }

    async fn delete_session(&self, session_id: &str) -> PortResult<()> {
        sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn create_course(
        &self,
        company_id: Uuid,
        created_by: Uuid,
        title: &str,
        description: Option<&str>,
    ) -> PortResult<Course> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "INSERT INTO courses (id, company_id, created_by, title, description, is_published, created_at)
             VALUES ($1, $2, $3, $4, $5, FALSE, $6)
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(company_id)
        .bind(created_by)
        .bind(title)
        .bind(description)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn list_courses(&self, company_id: Uuid) -> PortResult<Vec<CourseSummary>> {
        let rows = sqlx::query(&format!(
            "SELECT {COURSE_COLUMNS},
                    (SELECT COUNT(*) FROM tasks t WHERE t.course_id = courses.id) AS task_count,
                    (SELECT COUNT(*) FROM course_assignments a WHERE a.course_id = courses.id) AS assignment_count
             FROM courses WHERE company_id = $1
             ORDER BY created_at DESC"
        ))
        .bind(company_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let record = CourseRecord::from_row(&row).map_err(db_err)?;
                Ok(CourseSummary {
                    course: record.to_domain(),
                    task_count: row.try_get("task_count").map_err(db_err)?,
                    assignment_count: row.try_get("assignment_count").map_err(db_err)?,
                })
            })
            .collect()
    }

    async fn find_course(&self, company_id: Uuid, course_id: Uuid) -> PortResult<Option<Course>> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1 AND company_id = $2"
        ))
        .bind(course_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.map(CourseRecord::to_domain))
    }

    async fn get_course(&self, course_id: Uuid) -> PortResult<Option<Course>> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "SELECT {COURSE_COLUMNS} FROM courses WHERE id = $1"
        ))
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.map(CourseRecord::to_domain))
    }

    async fn update_course(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        patch: &CoursePatch,
    ) -> PortResult<Option<Course>> {
        let record = sqlx::query_as::<_, CourseRecord>(&format!(
            "UPDATE courses SET
                title = COALESCE($3, title),
                description = CASE WHEN $4 THEN $5 ELSE description END,
                is_published = COALESCE($6, is_published)
             WHERE id = $1 AND company_id = $2
             RETURNING {COURSE_COLUMNS}"
        ))
        .bind(course_id)
        .bind(company_id)
        .bind(patch.title.as_deref())
        .bind(patch.description.is_some())
        .bind(patch.description.clone().flatten())
        .bind(patch.is_published)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.map(CourseRecord::to_domain))
    }

    async fn delete_course(&self, company_id: Uuid, course_id: Uuid) -> PortResult<bool> {
        // Tasks, files, and assignments go with it via ON DELETE CASCADE.
        let result = sqlx::query("DELETE FROM courses WHERE id = $1 AND company_id = $2")
            .bind(course_id)
            .bind(company_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_task(
        &self,
        course_id: Uuid,
        title: &str,
        content: Option<&str>,
    ) -> PortResult<Task> {
        // max+1 computed inside the INSERT keeps order assignment atomic.
        let record = sqlx::query_as::<_, TaskRecord>(
            "INSERT INTO tasks (id, course_id, title, content, task_order)
             SELECT $1, $2, $3, $4, COALESCE(MAX(task_order), 0) + 1
             FROM tasks WHERE course_id = $2
             RETURNING id, course_id, title, content, task_order",
        )
        .bind(Uuid::new_v4())
        .bind(course_id)
        .bind(title)
        .bind(content)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn list_tasks(&self, course_id: Uuid) -> PortResult<Vec<Task>> {
        let records = sqlx::query_as::<_, TaskRecord>(
            "SELECT id, course_id, title, content, task_order
             FROM tasks WHERE course_id = $1 ORDER BY task_order ASC",
        )
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(TaskRecord::to_domain).collect())
    }

    async fn find_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
    ) -> PortResult<Option<Task>> {
        let record = sqlx::query_as::<_, TaskRecord>(
            "SELECT t.id, t.course_id, t.title, t.content, t.task_order
             FROM tasks t JOIN courses c ON c.id = t.course_id
             WHERE t.id = $1 AND t.course_id = $2 AND c.company_id = $3",
        )
        .bind(task_id)
        .bind(course_id)
        .bind(company_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.map(TaskRecord::to_domain))
    }

    async fn update_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
        patch: &TaskPatch,
    ) -> PortResult<Option<Task>> {
        let record = sqlx::query_as::<_, TaskRecord>(
            "UPDATE tasks SET
                title = COALESCE($4, title),
                content = CASE WHEN $5 THEN $6 ELSE content END,
                task_order = COALESCE($7, task_order)
             WHERE id = $1 AND course_id = $2
               AND EXISTS (SELECT 1 FROM courses c WHERE c.id = $2 AND c.company_id = $3)
             RETURNING id, course_id, title, content, task_order",
        )
        .bind(task_id)
        .bind(course_id)
        .bind(company_id)
        .bind(patch.title.as_deref())
        .bind(patch.content.is_some())
        .bind(patch.content.clone().flatten())
        .bind(patch.order)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.map(TaskRecord::to_domain))
    }

    async fn delete_task(
        &self,
        company_id: Uuid,
        course_id: Uuid,
        task_id: Uuid,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "DELETE FROM tasks
             WHERE id = $1 AND course_id = $2
               AND EXISTS (SELECT 1 FROM courses c WHERE c.id = $2 AND c.company_id = $3)",
        )
        .bind(task_id)
        .bind(course_id)
        .bind(company_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn create_file(&self, new_file: NewFileRef) -> PortResult<FileRef> {
        let record = sqlx::query_as::<_, FileRecord>(&format!(
            "INSERT INTO files (id, course_id, task_id, uploaded_by, file_name, file_key, file_size, mime_type, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {FILE_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(new_file.course_id)
        .bind(new_file.task_id)
        .bind(new_file.uploaded_by)
        .bind(&new_file.file_name)
        .bind(&new_file.file_key)
        .bind(new_file.file_size)
        .bind(&new_file.mime_type)
        .bind(Utc::now())
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(record.to_domain())
    }

    async fn get_file(&self, file_id: Uuid) -> PortResult<Option<(FileRef, Uuid)>> {
        let row = sqlx::query(&format!(
            "SELECT f.{}, c.company_id AS owner_company_id
             FROM files f JOIN courses c ON c.id = f.course_id
             WHERE f.id = $1",
            FILE_COLUMNS.replace(", ", ", f."),
        ))
        .bind(file_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(|row| {
            let record = FileRecord::from_row(&row).map_err(db_err)?;
            let company_id: Uuid = row.try_get("owner_company_id").map_err(db_err)?;
            Ok((record.to_domain(), company_id))
        })
        .transpose()
    }

    async fn delete_file(&self, file_id: Uuid) -> PortResult<()> {
        sqlx::query("DELETE FROM files WHERE id = $1")
            .bind(file_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn list_course_files(&self, course_id: Uuid) -> PortResult<Vec<FileRef>> {
        let records = sqlx::query_as::<_, FileRecord>(&format!(
            "SELECT {FILE_COLUMNS} FROM files WHERE course_id = $1 ORDER BY created_at ASC"
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(records.into_iter().map(FileRecord::to_domain).collect())
    }

    async fn count_active_users(&self, company_id: Uuid, user_ids: &[Uuid]) -> PortResult<usize> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users
             WHERE company_id = $1 AND is_active AND id = ANY($2)",
        )
        .bind(company_id)
        .bind(user_ids)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(count as usize)
    }

    async fn assign_if_absent(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        // Insert-if-absent: an existing row keeps its status and
        // timestamps no matter how often the course is re-assigned.
        let result = sqlx::query(
            "INSERT INTO course_assignments (user_id, course_id, status, assigned_at)
             VALUES ($1, $2, 'ASSIGNED', $3)
             ON CONFLICT (user_id, course_id) DO NOTHING",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
    ) -> PortResult<Option<CourseAssignment>> {
        let record = sqlx::query_as::<_, AssignmentRecord>(
            "SELECT user_id, course_id, status, assigned_at, started_at, completed_at
             FROM course_assignments WHERE user_id = $1 AND course_id = $2",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        record.map(AssignmentRecord::to_domain).transpose()
    }

    async fn list_user_assignments(
        &self,
        user_id: Uuid,
    ) -> PortResult<Vec<(CourseAssignment, Course, i64)>> {
        let rows = sqlx::query(&format!(
            "SELECT a.user_id, a.course_id, a.status, a.assigned_at, a.started_at, a.completed_at,
                    c.{},
                    (SELECT COUNT(*) FROM tasks t WHERE t.course_id = c.id) AS task_count
             FROM course_assignments a JOIN courses c ON c.id = a.course_id
             WHERE a.user_id = $1
             ORDER BY a.assigned_at DESC",
            COURSE_COLUMNS.replace(", ", ", c."),
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let assignment = AssignmentRecord::from_row(&row).map_err(db_err)?.to_domain()?;
                let course = CourseRecord::from_row(&row).map_err(db_err)?.to_domain();
                let task_count: i64 = row.try_get("task_count").map_err(db_err)?;
                Ok((assignment, course, task_count))
            })
            .collect()
    }

    async fn list_course_assignments(
        &self,
        course_id: Uuid,
    ) -> PortResult<Vec<(CourseAssignment, User)>> {
        let rows = sqlx::query(&format!(
            "SELECT a.user_id, a.course_id, a.status, a.assigned_at, a.started_at, a.completed_at,
                    u.{}
             FROM course_assignments a JOIN users u ON u.id = a.user_id
             WHERE a.course_id = $1
             ORDER BY a.assigned_at ASC",
            USER_COLUMNS.replace(", ", ", u."),
        ))
        .bind(course_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let assignment = AssignmentRecord::from_row(&row).map_err(db_err)?.to_domain()?;
                let user = UserRecord::from_row(&row).map_err(db_err)?.to_domain()?;
                Ok((assignment, user))
            })
            .collect()
    }

    async fn start_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        // Compare-and-set: the status guard makes a racing complete() win.
        let result = sqlx::query(
            "UPDATE course_assignments
             SET status = 'IN_PROGRESS', started_at = $3
             WHERE user_id = $1 AND course_id = $2 AND status = 'ASSIGNED'",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete_assignment(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        now: DateTime<Utc>,
    ) -> PortResult<CompletionOutcome> {
        let result = sqlx::query(
            "UPDATE course_assignments
             SET status = 'COMPLETED',
                 completed_at = $3,
                 started_at = COALESCE(started_at, $3)
             WHERE user_id = $1 AND course_id = $2 AND status <> 'COMPLETED'",
        )
        .bind(user_id)
        .bind(course_id)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        if result.rows_affected() > 0 {
            return Ok(CompletionOutcome::Completed);
        }
        // Distinguish "already terminal" from "never assigned".
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM course_assignments WHERE user_id = $1 AND course_id = $2)",
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        if exists {
            Ok(CompletionOutcome::AlreadyCompleted)
        } else {
            Ok(CompletionOutcome::NotAssigned)
        }
    }

    async fn push_notification(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        course_id: Uuid,
        course_title: &str,
        now: DateTime<Utc>,
    ) -> PortResult<bool> {
        let result = sqlx::query(
            "INSERT INTO notifications (id, user_id, kind, course_id, course_title, is_read, created_at)
             VALUES ($1, $2, $3, $4, $5, FALSE, $6)
             ON CONFLICT (user_id, kind, course_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(kind.as_str())
        .bind(course_id)
        .bind(course_title)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    async fn fetch_notifications_marking_read(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> PortResult<Vec<Notification>> {
        let records = sqlx::query_as::<_, NotificationRecord>(
            "SELECT id, user_id, kind, course_id, course_title, is_read, created_at
             FROM notifications WHERE user_id = $1
             ORDER BY created_at DESC LIMIT $2",
        )
        .bind(user_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        // Two independent statements on purpose: concurrent fetches may
        // both see an unread item, but everything converges to read.
        sqlx::query("UPDATE notifications SET is_read = TRUE WHERE user_id = $1 AND NOT is_read")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        records
            .into_iter()
            .map(NotificationRecord::to_domain)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;

    #[derive(Debug)]
    struct StubDbError {
        unique: bool,
    }

    impl std::fmt::Display for StubDbError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "stub database error")
        }
    }

    impl std::error::Error for StubDbError {}

    impl DatabaseError for StubDbError {
        fn message(&self) -> &str {
            "stub database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.unique.then(|| Cow::Borrowed("23505"))
        }

        fn as_error(&self) -> &(dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn std::error::Error + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn std::error::Error + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            if self.unique {
                ErrorKind::UniqueViolation
            } else {
                ErrorKind::Other
            }
        }
    }

    #[test]
    fn unique_violations_map_to_conflict() {
        let err = db_err(sqlx::Error::Database(Box::new(StubDbError { unique: true })));
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[test]
    fn other_database_errors_stay_unexpected() {
        let err = db_err(sqlx::Error::Database(Box::new(StubDbError { unique: false })));
        assert!(matches!(err, PortError::Unexpected(_)));
        assert!(matches!(
            db_err(sqlx::Error::RowNotFound),
            PortError::Unexpected(_)
        ));
    }
}
