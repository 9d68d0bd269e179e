//! Unified error handling for the HTTP layer.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::images::ImageError;
use crate::services::ServiceError;

/// Application-level error type for request handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// A service rejected or failed the operation.
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Storing an uploaded picture failed.
    #[error("{0}")]
    Image(#[from] ImageError),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Service(err) => match err {
                ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
                ServiceError::Conflict(_) => StatusCode::CONFLICT,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                ServiceError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                ServiceError::Forbidden(_) => StatusCode::FORBIDDEN,
                ServiceError::PasswordHash | ServiceError::Repository(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Image(ImageError::Io(_)) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Image(_) | Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        // Log server errors with Sentry
        let message = if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
            // Don't expose internal error details to clients
            "Internal server error".to_owned()
        } else {
            self.to_string()
        };

        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Result type alias for handlers.
pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use crate::db::RepositoryError;

    use super::*;

    fn get_status(err: impl Into<AppError>) -> StatusCode {
        err.into().into_response().status()
    }

    #[test]
    fn test_service_errors_map_to_status() {
        assert_eq!(
            get_status(ServiceError::Validation("code is required".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ServiceError::Conflict("taken".to_owned())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(ServiceError::NotFound("sample A1".to_owned())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(ServiceError::InvalidCredentials),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(ServiceError::Forbidden("no".to_owned())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(ServiceError::Repository(RepositoryError::NotFound)),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_image_errors_map_to_status() {
        assert_eq!(
            get_status(ImageError::UnsupportedType("a.txt".to_owned())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(ImageError::Io(std::io::Error::other("disk full"))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::from(ServiceError::NotFound("size 3".to_owned()));
        assert_eq!(err.to_string(), "size 3 not found");
        assert_eq!(
            AppError::BadRequest("invalid input".to_owned()).to_string(),
            "invalid input"
        );
    }
}
