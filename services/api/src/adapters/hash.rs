//! services/api/src/adapters/hash.rs
//!
//! Argon2 implementation of the `PasswordHashService` port.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

use skilldeck_core::ports::{PasswordHashService, PortError, PortResult};

/// Hashes with a fresh random salt; verification parses the encoded
/// hash, so parameters travel with each credential.
pub struct Argon2HashService;

impl PasswordHashService for Argon2HashService {
    fn hash(&self, plaintext: &str) -> PortResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(plaintext.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| PortError::Unexpected(format!("failed to hash password: {e}")))
    }

    fn verify(&self, plaintext: &str, hash: &str) -> bool {
        let Ok(parsed_hash) = PasswordHash::new(hash) else {
            return false;
        };
        Argon2::default()
            .verify_password(plaintext.as_bytes(), &parsed_hash)
            .is_ok()
    }
}
