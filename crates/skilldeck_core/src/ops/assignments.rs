//! crates/skilldeck_core/src/ops/assignments.rs
//!
//! The course-assignment state machine: assignment fan-out by course
//! creators, the implicit ASSIGNED -> IN_PROGRESS transition on first
//! open, and explicit completion. Status only ever moves forward.

use chrono::Utc;
use uuid::Uuid;

use crate::domain::{Course, CourseAssignment, FileRef, Principal, Task};
use crate::ops::courses::group_files;
use crate::ops::notifications;
use crate::ports::{CompletionOutcome, PortError, PortResult, Store};

/// What an assignee sees when opening their course.
#[derive(Debug, Clone)]
pub struct AssignedCourseView {
    pub assignment: CourseAssignment,
    pub course: Course,
    pub tasks: Vec<(Task, Vec<FileRef>)>,
    pub files: Vec<FileRef>,
}

/// Assigns a course to a set of employees, all-or-nothing.
///
/// Every target must be an active member of the caller's company; one
/// bad id rejects the whole batch. Existing assignments are left exactly
/// as they are, and each target gets at most one COURSE_ASSIGNED
/// notification per course, ever. Returns the number of assignments
/// actually created.
pub async fn assign(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    user_ids: &[Uuid],
) -> PortResult<usize> {
    principal.require_course_creator()?;
    if user_ids.is_empty() {
        return Err(PortError::Validation(
            "specify at least one employee".to_string(),
        ));
    }
    let course = store
        .find_course(principal.company_id, course_id)
        .await?
        .ok_or_else(|| PortError::NotFound("course not found".to_string()))?;

    let valid = store
        .count_active_users(principal.company_id, user_ids)
        .await?;
    if valid != user_ids.len() {
        return Err(PortError::NotFound("some users not found".to_string()));
    }

    let now = Utc::now();
    let mut created = 0;
    for &user_id in user_ids {
        if store.assign_if_absent(user_id, course_id, now).await? {
            created += 1;
        }
        // Best-effort and deduplicated; an already-notified user is left alone.
        notifications::notify_assigned(store, user_id, &course).await?;
    }
    tracing::info!(course_id = %course_id, created, "course assigned");
    Ok(created)
}

/// The assignee's view of a published, assigned course. The first open
/// moves the assignment to IN_PROGRESS through a compare-and-set, so a
/// racing complete() can never be overwritten backwards.
pub async fn open_course(
    store: &dyn Store,
    user_id: Uuid,
    course_id: Uuid,
) -> PortResult<AssignedCourseView> {
    let assignment = store
        .find_assignment(user_id, course_id)
        .await?
        .ok_or_else(|| PortError::NotFound("course is not assigned".to_string()))?;
    let course = store
        .get_course(course_id)
        .await?
        .filter(|c| c.is_published)
        .ok_or_else(|| PortError::NotFound("course is not assigned".to_string()))?;

    let assignment = if store.start_assignment(user_id, course_id, Utc::now()).await? {
        store
            .find_assignment(user_id, course_id)
            .await?
            .ok_or_else(|| PortError::Unexpected("assignment vanished".to_string()))?
    } else {
        assignment
    };

    let tasks = store.list_tasks(course_id).await?;
    let files = store.list_course_files(course_id).await?;
    let (tasks, files) = group_files(tasks, files);
    Ok(AssignedCourseView {
        assignment,
        course,
        tasks,
        files,
    })
}

/// Explicit learner completion. Idempotent: completing a COMPLETED
/// assignment succeeds without touching the row.
pub async fn complete(store: &dyn Store, user_id: Uuid, course_id: Uuid) -> PortResult<()> {
    match store
        .complete_assignment(user_id, course_id, Utc::now())
        .await?
    {
        CompletionOutcome::NotAssigned => {
            Err(PortError::NotFound("course is not assigned".to_string()))
        }
        CompletionOutcome::Completed | CompletionOutcome::AlreadyCompleted => Ok(()),
    }
}

/// The user's assignments, newest first, with course summary data.
pub async fn my_courses(
    store: &dyn Store,
    user_id: Uuid,
) -> PortResult<Vec<(CourseAssignment, Course, i64)>> {
    store.list_user_assignments(user_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AssignmentStatus;
    use crate::memory::MemoryStore;
    use crate::ops::courses::{create_course, update_course};
    use crate::ops::testutil::{seed_company, seed_employee};
    use crate::ports::CoursePatch;

    async fn published_course(store: &MemoryStore, principal: &Principal) -> Course {
        let course = create_course(store, principal, "Онбординг", None)
            .await
            .unwrap();
        update_course(
            store,
            principal,
            course.id,
            CoursePatch {
                is_published: Some(true),
                ..CoursePatch::default()
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn full_lifecycle_assigned_in_progress_completed() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let employee = seed_employee(&store, admin.company_id, "Иван").await;
        let course = published_course(&store, &admin).await;

        let created = assign(&store, &admin, course.id, &[employee.id])
            .await
            .unwrap();
        assert_eq!(created, 1);
        let assignment = store
            .find_assignment(employee.id, course.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Assigned);
        assert!(assignment.started_at.is_none());

        let view = open_course(&store, employee.id, course.id).await.unwrap();
        assert_eq!(view.assignment.status, AssignmentStatus::InProgress);
        let started_at = view.assignment.started_at.unwrap();

        complete(&store, employee.id, course.id).await.unwrap();
        let assignment = store
            .find_assignment(employee.id, course.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Completed);
        assert!(assignment.completed_at.is_some());
        // Completion does not restamp the original start time.
        assert_eq!(assignment.started_at, Some(started_at));
    }

    #[tokio::test]
    async fn completing_an_unopened_course_backfills_started_at() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let employee = seed_employee(&store, admin.company_id, "Иван").await;
        let course = published_course(&store, &admin).await;
        assign(&store, &admin, course.id, &[employee.id])
            .await
            .unwrap();

        complete(&store, employee.id, course.id).await.unwrap();
        let assignment = store
            .find_assignment(employee.id, course.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Completed);
        assert!(assignment.started_at.is_some());
    }

    #[tokio::test]
    async fn status_never_regresses_once_completed() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let employee = seed_employee(&store, admin.company_id, "Иван").await;
        let course = published_course(&store, &admin).await;
        assign(&store, &admin, course.id, &[employee.id])
            .await
            .unwrap();
        complete(&store, employee.id, course.id).await.unwrap();
        let completed_at = store
            .find_assignment(employee.id, course.id)
            .await
            .unwrap()
            .unwrap()
            .completed_at;

        // Re-assign, re-open, re-complete: all safe no-ops.
        assign(&store, &admin, course.id, &[employee.id])
            .await
            .unwrap();
        let view = open_course(&store, employee.id, course.id).await.unwrap();
        assert_eq!(view.assignment.status, AssignmentStatus::Completed);
        complete(&store, employee.id, course.id).await.unwrap();

        let assignment = store
            .find_assignment(employee.id, course.id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(assignment.status, AssignmentStatus::Completed);
        assert_eq!(assignment.completed_at, completed_at);
    }

    #[tokio::test]
    async fn assign_is_idempotent_and_notifies_once() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let employee = seed_employee(&store, admin.company_id, "Иван").await;
        let course = published_course(&store, &admin).await;

        assert_eq!(
            assign(&store, &admin, course.id, &[employee.id])
                .await
                .unwrap(),
            1
        );
        assert_eq!(
            assign(&store, &admin, course.id, &[employee.id])
                .await
                .unwrap(),
            0
        );

        let inbox = store
            .fetch_notifications_marking_read(employee.id, 50)
            .await
            .unwrap();
        assert_eq!(inbox.len(), 1);
    }

    #[tokio::test]
    async fn assignment_validation_is_all_or_nothing() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let foreign = seed_company(&store, "ООО Кофе", "b@x.ru").await;
        let employee = seed_employee(&store, admin.company_id, "Иван").await;
        let outsider = seed_employee(&store, foreign.company_id, "Мария").await;
        let course = published_course(&store, &admin).await;

        assert!(matches!(
            assign(&store, &admin, course.id, &[]).await,
            Err(PortError::Validation(_))
        ));
        // One cross-tenant target poisons the whole batch.
        assert!(matches!(
            assign(&store, &admin, course.id, &[employee.id, outsider.id]).await,
            Err(PortError::NotFound(_))
        ));
        assert!(store
            .find_assignment(employee.id, course.id)
            .await
            .unwrap()
            .is_none());

        // A terminated employee is no longer a valid target either.
        store
            .deactivate_user(admin.company_id, employee.id)
            .await
            .unwrap();
        assert!(matches!(
            assign(&store, &admin, course.id, &[employee.id]).await,
            Err(PortError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn unpublished_or_unassigned_courses_stay_invisible() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let employee = seed_employee(&store, admin.company_id, "Иван").await;
        let draft = create_course(&store, &admin, "Черновик", None)
            .await
            .unwrap();
        assign(&store, &admin, draft.id, &[employee.id])
            .await
            .unwrap();

        // Assigned but not yet published: not openable.
        assert!(matches!(
            open_course(&store, employee.id, draft.id).await,
            Err(PortError::NotFound(_))
        ));
        // Published but never assigned: same answer.
        let other = published_course(&store, &admin).await;
        assert!(matches!(
            open_course(&store, employee.id, other.id).await,
            Err(PortError::NotFound(_))
        ));
        // Completing an unassigned course is NotFound too.
        assert!(matches!(
            complete(&store, employee.id, other.id).await,
            Err(PortError::NotFound(_))
        ));
    }
}
