//! crates/skilldeck_core/src/ops/notifications.rs
//!
//! Best-effort notification fan-out. At-least-once, never exactly-once:
//! fetching mutates read state, and concurrent fetches are allowed to
//! overlap as long as everything converges to read.

use uuid::Uuid;

use crate::domain::{Course, Notification, NotificationKind};
use crate::ports::{PortResult, Store};

/// Upper bound on a single notification fetch.
pub const FETCH_LIMIT: usize = 50;

/// Records a COURSE_ASSIGNED event for the user. Returns false when an
/// identical (user, kind, course) notification already exists.
pub async fn notify_assigned(
    store: &dyn Store,
    user_id: Uuid,
    course: &Course,
) -> PortResult<bool> {
    store
        .push_notification(
            user_id,
            NotificationKind::CourseAssigned,
            course.id,
            &course.title,
            chrono::Utc::now(),
        )
        .await
}

/// The user's most recent notifications, newest first, marking every
/// unread one as read on the way out.
pub async fn fetch_and_mark_read(
    store: &dyn Store,
    user_id: Uuid,
) -> PortResult<Vec<Notification>> {
    store
        .fetch_notifications_marking_read(user_id, FETCH_LIMIT)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::ops::courses::create_course;
    use crate::ops::testutil::{seed_company, seed_employee};

    #[tokio::test]
    async fn duplicate_notifications_are_suppressed_per_course() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let employee = seed_employee(&store, admin.company_id, "Иван").await;
        let first = create_course(&store, &admin, "Курс 1", None).await.unwrap();
        let second = create_course(&store, &admin, "Курс 2", None).await.unwrap();

        assert!(notify_assigned(&store, employee.id, &first).await.unwrap());
        assert!(!notify_assigned(&store, employee.id, &first).await.unwrap());
        // A different course is a different dedup key.
        assert!(notify_assigned(&store, employee.id, &second).await.unwrap());

        let inbox = fetch_and_mark_read(&store, employee.id).await.unwrap();
        assert_eq!(inbox.len(), 2);
    }

    #[tokio::test]
    async fn fetch_marks_everything_read_and_is_per_user() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let ivan = seed_employee(&store, admin.company_id, "Иван").await;
        let maria = seed_employee(&store, admin.company_id, "Мария").await;
        let course = create_course(&store, &admin, "Курс", None).await.unwrap();

        notify_assigned(&store, ivan.id, &course).await.unwrap();
        notify_assigned(&store, maria.id, &course).await.unwrap();

        let inbox = fetch_and_mark_read(&store, ivan.id).await.unwrap();
        assert_eq!(inbox.len(), 1);
        assert!(!inbox[0].is_read);
        assert_eq!(inbox[0].course_title, "Курс");

        // Second fetch sees the same item, now read.
        let inbox = fetch_and_mark_read(&store, ivan.id).await.unwrap();
        assert!(inbox[0].is_read);

        // Maria's inbox was untouched by Ivan's fetch.
        let inbox = fetch_and_mark_read(&store, maria.id).await.unwrap();
        assert!(!inbox[0].is_read);
    }
}
