//! crates/skilldeck_core/src/ops/identity.rs
//!
//! Company registration, employee provisioning, credential checks, and
//! the soft-delete termination flow.

use uuid::Uuid;

use crate::domain::{InviteToken, User};
use crate::ops::invites;
use crate::ports::{PasswordHashService, PortError, PortResult, Store, UserPatch};

/// Minimum accepted password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Display name given to the admin created at company registration.
pub const ADMIN_FULL_NAME: &str = "Администратор";

#[derive(Debug, Clone, Copy)]
pub struct RegisteredCompany {
    pub company_id: Uuid,
    pub user_id: Uuid,
}

pub(crate) fn validate_password(password: &str) -> PortResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(PortError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Creates a company together with its single admin user.
///
/// The admin's email doubles as the global login key, so uniqueness is
/// checked across all companies, unlike ordinary employee emails which
/// are only unique per company.
pub async fn register_company(
    store: &dyn Store,
    hasher: &dyn PasswordHashService,
    company_name: &str,
    email: &str,
    password: &str,
) -> PortResult<RegisteredCompany> {
    let company_name = company_name.trim();
    let email = email.trim();
    if company_name.is_empty() || email.is_empty() || password.is_empty() {
        return Err(PortError::Validation("fill in all fields".to_string()));
    }
    validate_password(password)?;

    if store.find_user_by_email(email).await?.is_some() {
        return Err(PortError::Conflict(
            "a user with this email already exists".to_string(),
        ));
    }

    let password_hash = hasher.hash(password)?;
    let (company, admin) = store
        .create_company_with_admin(company_name, ADMIN_FULL_NAME, email, &password_hash)
        .await?;

    tracing::info!(company_id = %company.id, "company registered");
    Ok(RegisteredCompany {
        company_id: company.id,
        user_id: admin.id,
    })
}

/// Provisions an employee without a credential and issues their first
/// invite token in the same write.
pub async fn create_employee(
    store: &dyn Store,
    company_id: Uuid,
    full_name: &str,
    email: Option<&str>,
) -> PortResult<(User, InviteToken)> {
    let full_name = full_name.trim();
    if full_name.is_empty() {
        return Err(PortError::Validation("full name is required".to_string()));
    }
    let email = email.map(str::trim).filter(|e| !e.is_empty());

    if let Some(email) = email {
        // Per-company uniqueness, counting inactive users as well: their
        // history keeps the address taken.
        if store.email_in_company(company_id, email).await? {
            return Err(PortError::Conflict(
                "a user with this email already exists".to_string(),
            ));
        }
    }

    let token = invites::generate_token();
    let expires_at = chrono::Utc::now() + invites::invite_ttl();
    store
        .create_employee_with_invite(company_id, full_name, email, &token, expires_at)
        .await
}

/// Password check for login. Returns `None` for every failure mode, so
/// callers cannot tell an unknown email, an unregistered or inactive
/// user, and a wrong password apart.
pub async fn verify_credential(
    store: &dyn Store,
    hasher: &dyn PasswordHashService,
    email: &str,
    password: &str,
) -> PortResult<Option<User>> {
    let Some(user) = store.find_active_user_by_email(email.trim()).await? else {
        return Ok(None);
    };
    let Some(hash) = user.password_hash.as_deref() else {
        return Ok(None);
    };
    if !hasher.verify(password, hash) {
        return Ok(None);
    }
    Ok(Some(user))
}

/// Company roster, active users first.
pub async fn list_employees(store: &dyn Store, company_id: Uuid) -> PortResult<Vec<User>> {
    store.list_users(company_id).await
}

/// Admin edit of name, email, or the course-creation flag.
pub async fn update_employee(
    store: &dyn Store,
    company_id: Uuid,
    user_id: Uuid,
    patch: UserPatch,
) -> PortResult<User> {
    let patch = UserPatch {
        full_name: patch
            .full_name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty()),
        email: patch
            .email
            .map(|e| e.map(|e| e.trim().to_string()).filter(|e| !e.is_empty())),
        can_create_courses: patch.can_create_courses,
    };
    store
        .update_user(company_id, user_id, &patch)
        .await?
        .ok_or_else(|| PortError::NotFound("user not found".to_string()))
}

/// Soft-deletes an employee. Self-termination is rejected outright;
/// terminating someone already inactive is a silent no-op.
pub async fn terminate_employee(
    store: &dyn Store,
    actor_id: Uuid,
    company_id: Uuid,
    target_id: Uuid,
) -> PortResult<()> {
    if target_id == actor_id {
        return Err(PortError::Forbidden(
            "cannot terminate yourself".to_string(),
        ));
    }
    if !store.deactivate_user(company_id, target_id).await? {
        return Err(PortError::NotFound("user not found".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::ops::testutil::{seed_company, seed_employee, FakeHasher};

    #[tokio::test]
    async fn registers_company_and_rejects_duplicate_admin_email() {
        let store = MemoryStore::new();
        let registered =
            register_company(&store, &FakeHasher, "ООО Чай", "a@x.ru", "secret1")
                .await
                .unwrap();

        let admin = store
            .find_user(registered.company_id, registered.user_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(admin.full_name, ADMIN_FULL_NAME);
        assert!(admin.can_create_courses);
        assert!(admin.is_registered());

        // Same email again, even for a different company name: global conflict.
        let err = register_company(&store, &FakeHasher, "ООО Кофе", "a@x.ru", "secret2")
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Conflict(_)));
    }

    #[tokio::test]
    async fn rejects_short_password_and_missing_fields() {
        let store = MemoryStore::new();
        assert!(matches!(
            register_company(&store, &FakeHasher, "ООО Чай", "a@x.ru", "12345").await,
            Err(PortError::Validation(_))
        ));
        assert!(matches!(
            register_company(&store, &FakeHasher, "  ", "a@x.ru", "secret1").await,
            Err(PortError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn employee_email_is_unique_per_company_only() {
        let store = MemoryStore::new();
        let first = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let second = seed_company(&store, "ООО Кофе", "b@x.ru").await;

        create_employee(&store, first.company_id, "Иван", Some("ivan@x.ru"))
            .await
            .unwrap();
        // Same address inside the same company is a conflict.
        assert!(matches!(
            create_employee(&store, first.company_id, "Пётр", Some("ivan@x.ru")).await,
            Err(PortError::Conflict(_))
        ));
        // The sibling tenant is free to use it.
        create_employee(&store, second.company_id, "Иван", Some("ivan@x.ru"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn blank_employee_name_is_rejected() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        assert!(matches!(
            create_employee(&store, admin.company_id, "   ", None).await,
            Err(PortError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn credential_check_is_uniform_across_failure_modes() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        // Provisioned but unregistered employee with an email.
        create_employee(&store, admin.company_id, "Иван", Some("ivan@x.ru"))
            .await
            .unwrap();

        let ok = verify_credential(&store, &FakeHasher, "a@x.ru", "secret1")
            .await
            .unwrap();
        assert!(ok.is_some());

        for (email, password) in [
            ("a@x.ru", "wrong-password"),
            ("nobody@x.ru", "secret1"),
            ("ivan@x.ru", "secret1"),
        ] {
            let miss = verify_credential(&store, &FakeHasher, email, password)
                .await
                .unwrap();
            assert!(miss.is_none(), "{email} should not authenticate");
        }
    }

    #[tokio::test]
    async fn terminated_user_cannot_log_in() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let (employee, invite) =
            create_employee(&store, admin.company_id, "Иван", Some("ivan@x.ru"))
                .await
                .unwrap();
        store
            .consume_invite(&invite.token, "fake$secret1", chrono::Utc::now())
            .await
            .unwrap();
        assert!(verify_credential(&store, &FakeHasher, "ivan@x.ru", "secret1")
            .await
            .unwrap()
            .is_some());

        terminate_employee(&store, admin.user_id, admin.company_id, employee.id)
            .await
            .unwrap();
        assert!(verify_credential(&store, &FakeHasher, "ivan@x.ru", "secret1")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn self_termination_is_always_rejected() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let err = terminate_employee(&store, admin.user_id, admin.company_id, admin.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::Forbidden(_)));
    }

    #[tokio::test]
    async fn termination_is_tenant_scoped_and_idempotent() {
        let store = MemoryStore::new();
        let first = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let second = seed_company(&store, "ООО Кофе", "b@x.ru").await;
        let employee = seed_employee(&store, first.company_id, "Иван").await;

        // A foreign admin sees NotFound, not Forbidden.
        let err = terminate_employee(&store, second.user_id, second.company_id, employee.id)
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));

        terminate_employee(&store, first.user_id, first.company_id, employee.id)
            .await
            .unwrap();
        // Repeating the call is a no-op, not an error.
        terminate_employee(&store, first.user_id, first.company_id, employee.id)
            .await
            .unwrap();
        let user = store
            .find_user(first.company_id, employee.id)
            .await
            .unwrap()
            .unwrap();
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn update_employee_clears_and_sets_fields() {
        let store = MemoryStore::new();
        let admin = seed_company(&store, "ООО Чай", "a@x.ru").await;
        let (employee, _) =
            create_employee(&store, admin.company_id, "Иван", Some("ivan@x.ru"))
                .await
                .unwrap();

        let updated = update_employee(
            &store,
            admin.company_id,
            employee.id,
            UserPatch {
                full_name: Some("Иван Петров".to_string()),
                email: Some(None),
                can_create_courses: Some(true),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.full_name, "Иван Петров");
        assert_eq!(updated.email, None);
        assert!(updated.can_create_courses);

        // Unknown user in the company scope.
        assert!(matches!(
            update_employee(&store, admin.company_id, Uuid::new_v4(), UserPatch::default()).await,
            Err(PortError::NotFound(_))
        ));
    }
}
