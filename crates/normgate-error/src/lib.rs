//! Unified error types for the normgate runtime crates.
//!
//! All runtime crates depend on this crate for error handling.

// Error variants and fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

mod auth;
mod config;
mod export;
mod file;
#[cfg(feature = "axum-compat")]
mod http;
mod task;
mod upstream;

pub use auth::AuthError;
pub use config::ConfigError;
pub use export::ExportError;
pub use file::FileError;
#[cfg(feature = "axum-compat")]
pub use http::{ApiResponse, IntoHttpResponse};
pub use task::TaskError;
pub use upstream::UpstreamError;

/// Unified error type wrapping all domain errors
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Task(#[from] TaskError),

    #[error(transparent)]
    File(#[from] FileError),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("{field}: {message}")]
    Validation { field: String, message: String },

    #[error("{resource}已存在")]
    Conflict { resource: String },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl GatewayError {
    /// Build a per-field validation error.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Build a uniqueness-conflict error (duplicate email/username).
    pub fn conflict(resource: impl Into<String>) -> Self {
        Self::Conflict {
            resource: resource.into(),
        }
    }

    /// Build an opaque internal error. The full cause goes to logs only.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::Auth(e) => e.error_code(),
            Self::Task(e) => e.error_code(),
            Self::File(e) => e.error_code(),
            Self::Upstream(e) => e.error_code(),
            Self::Config(e) => e.error_code(),
            Self::Export(e) => e.error_code(),
            Self::Validation { .. } => "validation_error",
            Self::Conflict { .. } => "conflict",
            Self::Database(_) => "database_error",
            Self::Internal { .. } => "internal_error",
        }
    }
}

/// Convenience alias used across the workspace.
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_stable() {
        assert_eq!(
            GatewayError::validation("email", "bad").error_code(),
            "validation_error"
        );
        assert_eq!(GatewayError::conflict("邮箱").error_code(), "conflict");
        assert_eq!(
            GatewayError::from(AuthError::TokenExpired).error_code(),
            "token_expired"
        );
        assert_eq!(
            GatewayError::from(TaskError::Forbidden).error_code(),
            "task_forbidden"
        );
    }

    #[test]
    fn test_transparent_display() {
        let err = GatewayError::from(AuthError::TokenExpired);
        assert_eq!(err.to_string(), AuthError::TokenExpired.to_string());
    }
}
