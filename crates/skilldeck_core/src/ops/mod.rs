//! crates/skilldeck_core/src/ops/mod.rs
//!
//! The application operations, written against the ports only. Each
//! submodule covers one lifecycle from the component design: identity and
//! credentials, invite tokens, course management, the assignment state
//! machine, and notification fan-out.

pub mod assignments;
pub mod courses;
pub mod identity;
pub mod invites;
pub mod notifications;

#[cfg(test)]
pub(crate) mod testutil;
