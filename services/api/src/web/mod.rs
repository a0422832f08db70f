pub mod auth;
pub mod courses;
pub mod files;
pub mod invite;
pub mod middleware;
pub mod my_courses;
pub mod notifications;
pub mod rest;
pub mod state;
pub mod users;

// Re-export the router builder and OpenAPI doc for the binaries and tests.
pub use middleware::require_auth;
pub use rest::{build_router, ApiDoc};
