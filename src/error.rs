use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{
    dao::storage::StorageError,
    state::interaction::{LifecycleError, MergeError},
};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage backend is unavailable.
    #[error("storage unavailable")]
    Unavailable(#[source] StorageError),
    /// Application is running in degraded mode without storage.
    #[error("storage unavailable (degraded mode)")]
    Degraded,
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// A uniqueness constraint could not be satisfied.
    #[error("conflict: {0}")]
    Conflict(String),
    /// A response-list mutation does not fit the stored list.
    #[error("invalid merge: {0}")]
    InvalidMerge(String),
    /// A stored record exists but cannot be decoded.
    #[error("corrupt stored record: {0}")]
    Corrupt(String),
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Corrupt { .. } => ServiceError::Corrupt(err.to_string()),
            other => ServiceError::Unavailable(other),
        }
    }
}

impl From<LifecycleError> for ServiceError {
    fn from(err: LifecycleError) -> Self {
        ServiceError::InvalidState(err.to_string())
    }
}

impl From<MergeError> for ServiceError {
    fn from(err: MergeError) -> Self {
        match err {
            MergeError::MismatchedAnswer { .. } => ServiceError::InvalidInput(err.to_string()),
            MergeError::UnknownSession(_) => ServiceError::NotFound(err.to_string()),
            MergeError::InvalidReorder(_) => ServiceError::InvalidMerge(err.to_string()),
        }
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Degraded => AppError::ServiceUnavailable("degraded mode".into()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::InvalidMerge(message) => AppError::BadRequest(message),
            // Clients get a generic failure; the decode detail stays in the logs.
            ServiceError::Corrupt(_) => {
                AppError::ServiceUnavailable("stored record is unreadable".into())
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corrupt_records_surface_as_service_unavailable() {
        let app_error: AppError = ServiceError::Corrupt("bad payload".into()).into();
        let AppError::ServiceUnavailable(message) = app_error else {
            panic!("expected a service unavailable error");
        };
        // The stored decode detail stays out of the client-facing message.
        assert!(!message.contains("bad payload"));
    }

    #[test]
    fn degraded_mode_surfaces_as_service_unavailable() {
        let app_error: AppError = ServiceError::Degraded.into();
        assert!(matches!(app_error, AppError::ServiceUnavailable(_)));
    }
}
