//! Shared helpers for the ops unit tests.

use uuid::Uuid;

use crate::domain::{Principal, User};
use crate::memory::MemoryStore;
use crate::ports::{PasswordHashService, PortResult, Store};

/// Cheap stand-in for the argon2 adapter. Hashes are trivially
/// reversible, which the tests rely on for assertions.
pub struct FakeHasher;

impl PasswordHashService for FakeHasher {
    fn hash(&self, plaintext: &str) -> PortResult<String> {
        Ok(format!("fake${plaintext}"))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        hash == format!("fake${plaintext}")
    }
}

/// Registers a company and returns the admin's principal.
pub async fn seed_company(store: &MemoryStore, name: &str, email: &str) -> Principal {
    let (_, admin) = store
        .create_company_with_admin(name, "Администратор", email, "fake$secret1")
        .await
        .unwrap();
    Principal::from_user(&admin)
}

/// Adds an active, registered employee to the company.
pub async fn seed_employee(store: &MemoryStore, company_id: Uuid, full_name: &str) -> User {
    let (user, _) = store
        .create_employee_with_invite(
            company_id,
            full_name,
            None,
            &Uuid::new_v4().simple().to_string(),
            chrono::Utc::now() + chrono::Duration::hours(24),
        )
        .await
        .unwrap();
    user
}
