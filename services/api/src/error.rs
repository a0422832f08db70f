//! services/api/src/error.rs
//!
//! Defines the primary error type for the entire API service, plus the
//! mapping from the core error taxonomy to HTTP responses.

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::config::ConfigError;
use skilldeck_core::ports::PortError;

/// The primary error type for the `api` service.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents an error from the underlying database library.
    #[error("Database Error: {0}")]
    Database(#[from] sqlx::Error),

    /// Represents a standard Input/Output error (e.g., binding to a network socket).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// The uniform JSON error body: a stable kind is carried by the status
/// code, the message is for humans.
#[derive(Serialize, ToSchema)]
pub struct ErrorBody {
    pub error: String,
}

/// What handlers return on failure.
pub type HttpError = (StatusCode, Json<ErrorBody>);

/// Maps every core failure kind to its HTTP status. Cross-tenant access
/// arrives here already folded into `NotFound` by the core.
pub fn to_http(err: PortError) -> HttpError {
    let status = match &err {
        PortError::Validation(_) => StatusCode::BAD_REQUEST,
        PortError::Conflict(_) => StatusCode::CONFLICT,
        PortError::NotFound(_) => StatusCode::NOT_FOUND,
        PortError::Forbidden(_) => StatusCode::FORBIDDEN,
        PortError::Unauthorized => StatusCode::UNAUTHORIZED,
        PortError::Gone(_) | PortError::Expired(_) => StatusCode::GONE,
        PortError::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status == StatusCode::INTERNAL_SERVER_ERROR {
        tracing::error!("internal error: {err}");
    }
    (
        status,
        Json(ErrorBody {
            error: err.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gone_and_expired_share_a_status_but_not_a_message() {
        let (gone, gone_body) = to_http(PortError::Gone("used".to_string()));
        let (expired, expired_body) = to_http(PortError::Expired("late".to_string()));
        assert_eq!(gone, StatusCode::GONE);
        assert_eq!(expired, StatusCode::GONE);
        assert_ne!(gone_body.error, expired_body.error);
    }

    #[test]
    fn not_found_is_used_for_cross_tenant_access() {
        let (status, _) = to_http(PortError::NotFound("course not found".to_string()));
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
