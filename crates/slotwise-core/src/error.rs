//! Error taxonomy and result handling for booking operations.
//!
//! Booking-time errors are synchronous and caller-fixable; they map directly
//! onto HTTP statuses at the API boundary. Storage failures are wrapped so
//! unique-constraint races surface as conflicts rather than opaque database
//! errors.

use thiserror::Error;

/// Result type alias using `CoreError`.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Core error type for booking and storage operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input the caller can fix.
    #[error("validation error: {0}")]
    Validation(String),

    /// The requested state change conflicts with existing state.
    ///
    /// The canonical case is `slot_taken`: a concurrent booking won the slot.
    /// The caller retries with a different slot; this is never retried
    /// internally.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Referenced entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Actor is not authorized for the action.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Storage operation failed.
    #[error("database error: {0}")]
    Database(String),
}

impl CoreError {
    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Creates a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Conflict raised when a slot insert loses the uniqueness race.
    pub fn slot_taken() -> Self {
        Self::Conflict("slot_taken".to_string())
    }

    /// Creates a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Creates a permission error.
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    /// Creates a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database(message.into())
    }
}

impl From<sqlx::Error> for CoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("requested entity not found".to_string()),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(format!("unique constraint violation: {db_err}"))
            },
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::Conflict(format!("foreign key constraint violation: {db_err}"))
            },
            _ => Self::Database(err.to_string()),
        }
    }
}
