//! Application-wide error types.
//!
//! `AppError` is the structured failure handed to whatever boundary calls
//! into the core: a kind, a human-readable message and a machine code.

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Business rule violation (locked period, credit limit, lifecycle state).
    #[error("Business rule violation: {message}")]
    BusinessRule {
        /// Machine-readable code of the violated rule.
        code: &'static str,
        /// Actionable message for the user.
        message: String,
    },

    /// Conflict (e.g., already matched, concurrent modification).
    #[error("Conflict: {message}")]
    Conflict {
        /// Machine-readable code of the conflict.
        code: &'static str,
        /// Human-readable description.
        message: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal server error, including detected data-integrity violations.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Returns the HTTP status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::BusinessRule { .. } => 422,
            Self::Conflict { .. } => 409,
            Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::BusinessRule { code, .. } | Self::Conflict { code, .. } => *code,
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
