//! crates/skilldeck_core/src/ops/courses.rs
//!
//! Course, task, and file management for course creators. Every lookup
//! is company-scoped; a course of another tenant behaves exactly like a
//! missing one.

use uuid::Uuid;

use crate::domain::{Course, CourseAssignment, CourseSummary, FileRef, Principal, Task, User};
use crate::ports::{
    BlobStoreService, CoursePatch, NewFileRef, PortError, PortResult, Store, TaskPatch,
};

/// Signed download links stay valid this long.
pub const DOWNLOAD_URL_TTL_SECONDS: u64 = 3600;

/// Everything the course editor shows: ordered tasks with their files,
/// course-level files, and the assignment roster.
#[derive(Debug, Clone)]
pub struct CourseDetail {
    pub course: Course,
    pub tasks: Vec<(Task, Vec<FileRef>)>,
    pub files: Vec<FileRef>,
    pub assignments: Vec<(CourseAssignment, User)>,
}

/// Splits a course's files into per-task and course-level groups.
pub(crate) fn group_files(
    tasks: Vec<Task>,
    files: Vec<FileRef>,
) -> (Vec<(Task, Vec<FileRef>)>, Vec<FileRef>) {
    let mut course_files = Vec::new();
    let mut task_files: std::collections::HashMap<Uuid, Vec<FileRef>> =
        std::collections::HashMap::new();
    for file in files {
        match file.task_id {
            Some(task_id) => task_files.entry(task_id).or_default().push(file),
            None => course_files.push(file),
        }
    }
    let tasks = tasks
        .into_iter()
        .map(|task| {
            let files = task_files.remove(&task.id).unwrap_or_default();
            (task, files)
        })
        .collect();
    (tasks, course_files)
}

pub async fn create_course(
    store: &dyn Store,
    principal: &Principal,
    title: &str,
    description: Option<&str>,
) -> PortResult<Course> {
    principal.require_course_creator()?;
    let title = title.trim();
    if title.is_empty() {
        return Err(PortError::Validation("title is required".to_string()));
    }
    let description = description.map(str::trim).filter(|d| !d.is_empty());
    store
        .create_course(principal.company_id, principal.user_id, title, description)
        .await
}

pub async fn list_courses(
    store: &dyn Store,
    principal: &Principal,
) -> PortResult<Vec<CourseSummary>> {
    principal.require_course_creator()?;
    store.list_courses(principal.company_id).await
}

/// Full course view, tenant-scoped. Readable with a plain session
/// because employees land here from their assignments.
pub async fn course_detail(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
) -> PortResult<CourseDetail> {
    let course = store
        .find_course(principal.company_id, course_id)
        .await?
        .ok_or_else(|| PortError::NotFound("course not found".to_string()))?;
    let tasks = store.list_tasks(course_id).await?;
    let files = store.list_course_files(course_id).await?;
    let assignments = store.list_course_assignments(course_id).await?;
    let (tasks, files) = group_files(tasks, files);
    Ok(CourseDetail {
        course,
        tasks,
        files,
        assignments,
    })
}

pub async fn update_course(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    patch: CoursePatch,
) -> PortResult<Course> {
    principal.require_course_creator()?;
    let patch = CoursePatch {
        title: patch
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        description: patch
            .description
            .map(|d| d.map(|d| d.trim().to_string()).filter(|d| !d.is_empty())),
        is_published: patch.is_published,
    };
    store
        .update_course(principal.company_id, course_id, &patch)
        .await?
        .ok_or_else(|| PortError::NotFound("course not found".to_string()))
}

pub async fn delete_course(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
) -> PortResult<()> {
    principal.require_course_creator()?;
    if !store.delete_course(principal.company_id, course_id).await? {
        return Err(PortError::NotFound("course not found".to_string()));
    }
    Ok(())
}

/// Appends a task; the store assigns order = max + 1 and deletions leave
/// gaps behind on purpose.
pub async fn add_task(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    title: &str,
    content: Option<&str>,
) -> PortResult<Task> {
    principal.require_course_creator()?;
    let title = title.trim();
    if title.is_empty() {
        return Err(PortError::Validation("task title is required".to_string()));
    }
    store
        .find_course(principal.company_id, course_id)
        .await?
        .ok_or_else(|| PortError::NotFound("course not found".to_string()))?;
    let content = content.map(str::trim).filter(|c| !c.is_empty());
    store.create_task(course_id, title, content).await
}

pub async fn update_task(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    task_id: Uuid,
    patch: TaskPatch,
) -> PortResult<Task> {
    principal.require_course_creator()?;
    let patch = TaskPatch {
        title: patch
            .title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty()),
        content: patch
            .content
            .map(|c| c.map(|c| c.trim().to_string()).filter(|c| !c.is_empty())),
        order: patch.order,
    };
    store
        .update_task(principal.company_id, course_id, task_id, &patch)
        .await?
        .ok_or_else(|| PortError::NotFound("task not found".to_string()))
}

pub async fn delete_task(
    store: &dyn Store,
    principal: &Principal,
    course_id: Uuid,
    task_id: Uuid,
) -> PortResult<()> {
    principal.require_course_creator()?;
    if !store
        .delete_task(principal.company_id, course_id, task_id)
        .await?
    {
        return Err(PortError::NotFound("task not found".to_string()));
    }
    Ok(())
}

/// Stores the bytes in the blob store under a tenant-namespaced key and
/// records the file row.
pub async fn attach_file(
    store: &dyn Store,
    blob: &dyn BlobStoreService,
    principal: &Principal,
    course_id: Uuid,
    task_id: Option<Uuid>,
    file_name: &str,
    bytes: &[u8],
    mime_type: &str,
) -> PortResult<FileRef> {
    principal.require_course_creator()?;
    store
        .find_course(principal.company_id, course_id)
        .await?
        .ok_or_else(|| PortError::NotFound("course not found".to_string()))?;

    let ext = file_name.rsplit('.').next().filter(|e| *e != file_name);
    let file_key = format!(
        "{}/{}/{}.{}",
        principal.company_id,
        course_id,
        Uuid::new_v4(),
        ext.unwrap_or("bin"),
    );
    blob.put(&file_key, bytes, mime_type).await?;

    store
        .create_file(NewFileRef {
            course_id,
            task_id,
            uploaded_by: principal.user_id,
            file_name: file_name.to_string(),
            file_key,
            file_size: bytes.len() as i64,
            mime_type: mime_type.to_string(),
        })
        .await
}

/// A one-hour signed URL for a stored file. Requires only a session, but
/// the tenant check runs against the owning course's company.
pub async fn file_download_url(
    store: &dyn Store,
    blob: &dyn BlobStoreService,
    principal: &Principal,
    file_id: Uuid,
) -> PortResult<(String, String)> {
    let (file, company_id) = store
        .get_file(file_id)
        .await?
        .ok_or_else(|| PortError::NotFound("file not found".to_string()))?;
    principal.scope_to_company(company_id)?;
    let url = blob
        .signed_download_url(&file.file_key, &file.file_name, DOWNLOAD_URL_TTL_SECONDS)
        .await?;
    Ok((url, file.file_name))
}

/// Removes the stored bytes, then the row.
pub async fn delete_file(
    store: &dyn Store,
    blob: &dyn BlobStoreService,
    principal: &Principal,
    file_id: Uuid,
) -> PortResult<()> {
    principal.require_course_creator()?;
    let (file, company_id) = store
        .get_file(file_id)
        .await?
        .ok_or_else(|| PortError::NotFound("file not found".to_string()))?;
    principal.scope_to_company(company_id)?;
    blob.delete(&file.file_key).await?;
    store.delete_file(file_id).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::ops::testutil::seed_company;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records puts and deletes; URLs encode the key for assertions.
    #[derive(Default)]
    struct RecordingBlobStore {
        puts: Mutex<Vec<String>>,
        deletes: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl BlobStoreService for RecordingBlobStore {
        async fn put(&self, key: &str, _bytes: &[u8], _content_type: &str) -> PortResult<()> {
            self.puts.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn delete(&self, key: &str) -> PortResult<()> {
            self.deletes.lock().unwrap().push(key.to_string());
            Ok(())
        }

        async fn signed_download_url(
            &self,
            key: &str,
            _file_name: &str,
            ttl_seconds: u64,
        ) -> PortResult<String> {
            Ok(format!("https://blob.test/{key}?ttl={ttl_seconds}"))
        }
    }

    #[tokio::test]
    async fn course_management_is_tenant_scoped() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let foreign = seed_company(&store, "ООО Кофе", "b@x.ru").await;

        let course = create_course(&store, &admin, "Онбординг", Some("Первая неделя"))
            .await
            .unwrap();
        assert!(!course.is_published);

        // The other tenant can neither read, update, nor delete it.
        assert!(matches!(
            course_detail(&store, &foreign, course.id).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            update_course(&store, &foreign, course.id, CoursePatch::default()).await,
            Err(PortError::NotFound(_))
        ));
        assert!(matches!(
            delete_course(&store, &foreign, course.id).await,
            Err(PortError::NotFound(_))
        ));

        // And the owner still sees it untouched.
        let detail = course_detail(&store, &admin, course.id).await.unwrap();
        assert_eq!(detail.course.title, "Онбординг");
    }

    #[tokio::test]
    async fn task_order_grows_monotonically_with_gaps() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let course = create_course(&store, &admin, "Онбординг", None)
            .await
            .unwrap();

        let first = add_task(&store, &admin, course.id, "Шаг 1", None)
            .await
            .unwrap();
        let second = add_task(&store, &admin, course.id, "Шаг 2", None)
            .await
            .unwrap();
        assert_eq!((first.order, second.order), (1, 2));

        delete_task(&store, &admin, course.id, second.id)
            .await
            .unwrap();
        let third = add_task(&store, &admin, course.id, "Шаг 3", None)
            .await
            .unwrap();
        // Order continues past the deleted slot rather than reusing it.
        assert_eq!(third.order, 3);

        let detail = course_detail(&store, &admin, course.id).await.unwrap();
        let orders: Vec<i32> = detail.tasks.iter().map(|(t, _)| t.order).collect();
        assert_eq!(orders, vec![1, 3]);
    }

    #[tokio::test]
    async fn publishing_flag_is_patchable() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let course = create_course(&store, &admin, "Онбординг", None)
            .await
            .unwrap();
        let updated = update_course(
            &store,
            &admin,
            course.id,
            CoursePatch {
                is_published: Some(true),
                ..CoursePatch::default()
            },
        )
        .await
        .unwrap();
        assert!(updated.is_published);
    }

    #[tokio::test]
    async fn attached_files_use_namespaced_keys_and_group_by_task() {
        let store = MemoryStore::new();
        let blob = RecordingBlobStore::default();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let course = create_course(&store, &admin, "Онбординг", None)
            .await
            .unwrap();
        let task = add_task(&store, &admin, course.id, "Шаг 1", None)
            .await
            .unwrap();

        let shared = attach_file(
            &store, &blob, &admin, course.id, None, "handbook.pdf", b"pdf", "application/pdf",
        )
        .await
        .unwrap();
        let scoped = attach_file(
            &store,
            &blob,
            &admin,
            course.id,
            Some(task.id),
            "шаблон.docx",
            b"doc",
            "application/msword",
        )
        .await
        .unwrap();

        let prefix = format!("{}/{}/", admin.company_id, course.id);
        assert!(shared.file_key.starts_with(&prefix));
        assert!(shared.file_key.ends_with(".pdf"));
        assert!(scoped.file_key.ends_with(".docx"));
        assert_eq!(blob.puts.lock().unwrap().len(), 2);

        let detail = course_detail(&store, &admin, course.id).await.unwrap();
        assert_eq!(detail.files.len(), 1);
        assert_eq!(detail.tasks[0].1.len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_task_keeps_its_files_as_course_level() {
        let store = MemoryStore::new();
        let blob = RecordingBlobStore::default();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let course = create_course(&store, &admin, "Онбординг", None)
            .await
            .unwrap();
        let task = add_task(&store, &admin, course.id, "Шаг 1", None)
            .await
            .unwrap();
        let file = attach_file(
            &store,
            &blob,
            &admin,
            course.id,
            Some(task.id),
            "шаблон.docx",
            b"doc",
            "application/msword",
        )
        .await
        .unwrap();

        delete_task(&store, &admin, course.id, task.id)
            .await
            .unwrap();

        // The file row survives, detached from the removed task.
        let detail = course_detail(&store, &admin, course.id).await.unwrap();
        assert!(detail.tasks.is_empty());
        assert_eq!(detail.files.len(), 1);
        assert_eq!(detail.files[0].id, file.id);
        assert_eq!(detail.files[0].task_id, None);
        assert!(blob.deletes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn download_urls_are_tenant_checked_and_deletes_reach_the_blob_store() {
        let store = MemoryStore::new();
        let blob = RecordingBlobStore::default();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let foreign = seed_company(&store, "ООО Кофе", "b@x.ru").await;
        let course = create_course(&store, &admin, "Онбординг", None)
            .await
            .unwrap();
        let file = attach_file(
            &store, &blob, &admin, course.id, None, "handbook.pdf", b"pdf", "application/pdf",
        )
        .await
        .unwrap();

        let (url, name) = file_download_url(&store, &blob, &admin, file.id)
            .await
            .unwrap();
        assert!(url.contains(&file.file_key));
        assert_eq!(name, "handbook.pdf");

        // Cross-tenant: the file might as well not exist.
        assert!(matches!(
            file_download_url(&store, &blob, &foreign, file.id).await,
            Err(PortError::NotFound(_))
        ));

        delete_file(&store, &blob, &admin, file.id).await.unwrap();
        assert_eq!(
            blob.deletes.lock().unwrap().clone(),
            vec![file.file_key.clone()]
        );
        assert!(store.get_file(file.id).await.unwrap().is_none());
    }
}
