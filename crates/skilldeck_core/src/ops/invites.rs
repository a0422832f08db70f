//! crates/skilldeck_core/src/ops/invites.rs
//!
//! The invite-token lifecycle: issue, inspect, consume, reissue. Tokens
//! bridge an administratively-created user to a self-chosen credential.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use crate::domain::{InviteToken, Principal, User};
use crate::ops::identity;
use crate::ports::{PasswordHashService, PortError, PortResult, Store};

/// Default token lifetime.
pub const INVITE_TTL_HOURS: i64 = 24;

pub fn invite_ttl() -> Duration {
    Duration::hours(INVITE_TTL_HOURS)
}

/// Opaque token string: 64 hex characters, no structure to guess.
pub fn generate_token() -> String {
    format!(
        "{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

/// What an invite landing page may show about the pending user.
#[derive(Debug, Clone)]
pub struct InvitePreview {
    pub full_name: String,
    pub email: Option<String>,
}

/// Classifies the invite against the three distinguishable failure
/// kinds. "Owner already registered" reads as Gone, same as a used
/// token: from the outside the link is spent either way.
fn validate(
    invite: Option<(InviteToken, User)>,
    now: DateTime<Utc>,
) -> PortResult<(InviteToken, User)> {
    let Some((invite, user)) = invite else {
        return Err(PortError::NotFound("invite link is invalid".to_string()));
    };
    if invite.used_at.is_some() {
        return Err(PortError::Gone("invite link already used".to_string()));
    }
    if invite.expires_at < now {
        return Err(PortError::Expired("invite link expired".to_string()));
    }
    if user.is_registered() {
        return Err(PortError::Gone("user already registered".to_string()));
    }
    Ok((invite, user))
}

/// Creates a fresh token for the user. Earlier unconsumed tokens stay in
/// place; whichever one is consumed first disables the rest through the
/// password-hash guard.
pub async fn issue(store: &dyn Store, user_id: Uuid, ttl: Duration) -> PortResult<InviteToken> {
    let token = generate_token();
    store
        .create_invite(user_id, &token, Utc::now() + ttl)
        .await
}

/// Read-only validity check for the invite landing page.
pub async fn inspect(store: &dyn Store, token: &str) -> PortResult<InvitePreview> {
    let (_, user) = validate(store.find_invite(token).await?, Utc::now())?;
    Ok(InvitePreview {
        full_name: user.full_name,
        email: user.email,
    })
}

/// Completes registration: sets the user's password and spends the token
/// in one atomic unit. The store re-checks every condition at write
/// time; the pre-check here only provides the caller a precise error
/// without paying for a hash first.
pub async fn consume(
    store: &dyn Store,
    hasher: &dyn PasswordHashService,
    token: &str,
    password: &str,
) -> PortResult<Option<String>> {
    identity::validate_password(password)?;
    let (_, user) = validate(store.find_invite(token).await?, Utc::now())?;

    let password_hash = hasher.hash(password)?;
    store
        .consume_invite(token, &password_hash, Utc::now())
        .await?;

    tracing::info!(user_id = %user.id, "invite consumed");
    Ok(user.email)
}

/// Admin regeneration of an invite link for a still-unregistered,
/// active member of the admin's own company.
pub async fn reissue(
    store: &dyn Store,
    actor: &Principal,
    user_id: Uuid,
) -> PortResult<InviteToken> {
    actor.require_admin()?;
    let user = store
        .find_user(actor.company_id, user_id)
        .await?
        .filter(|u| u.is_active)
        .ok_or_else(|| PortError::NotFound("user not found".to_string()))?;
    if user.is_registered() {
        return Err(PortError::Conflict("user already registered".to_string()));
    }
    issue(store, user_id, invite_ttl()).await
}
