//! Service-layer error types.

use thiserror::Error;

use crate::db::RepositoryError;

/// Errors returned by the inventory and user services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// The change collides with existing data.
    #[error("{0}")]
    Conflict(String),

    /// The addressed entity does not exist.
    #[error("{0} not found")]
    NotFound(String),

    /// Wrong name or password at login.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The caller may not perform this change.
    #[error("{0}")]
    Forbidden(String),

    /// Password hashing failed.
    #[error("password hashing error")]
    PasswordHash,

    /// Repository/database error.
    #[error("database error: {0}")]
    Repository(RepositoryError),
}

impl From<RepositoryError> for ServiceError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict(message) => Self::Conflict(message),
            RepositoryError::NotFound => Self::NotFound("record".to_owned()),
            other => Self::Repository(other),
        }
    }
}

impl ServiceError {
    /// Adapter for `map_err` that names the missing entity.
    pub fn or_missing(what: impl Into<String>) -> impl FnOnce(RepositoryError) -> Self {
        let what = what.into();
        move |err| match err {
            RepositoryError::NotFound => Self::NotFound(what),
            other => other.into(),
        }
    }
}

/// Trimmed, non-empty text or a validation error naming the field.
pub(crate) fn required(value: Option<&str>, field: &str) -> Result<String, ServiceError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_owned()),
        _ => Err(ServiceError::Validation(format!("{field} is required"))),
    }
}
