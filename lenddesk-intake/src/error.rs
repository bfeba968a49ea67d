//! API error types for the intake service

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Upload exceeds the size limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// A backing dependency failed in a way the fallback could not absorb (503)
    #[error("Dependency unavailable: {0}")]
    DependencyUnavailable(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<lenddesk_common::Error> for ApiError {
    fn from(err: lenddesk_common::Error) -> Self {
        use lenddesk_common::Error;
        match err {
            Error::Validation(msg) => ApiError::BadRequest(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::RetryableDependency { .. } | Error::NonRetryableDependency { .. } => {
                ApiError::DependencyUnavailable(err.to_string())
            }
            Error::Config(msg) => ApiError::Internal(msg),
            Error::Io(e) => ApiError::Internal(e.to_string()),
            Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::DependencyUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "DEPENDENCY_UNAVAILABLE",
                msg,
            ),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_errors_map_to_status_classes() {
        let bad: ApiError = lenddesk_common::Error::Validation("x".to_string()).into();
        assert!(matches!(bad, ApiError::BadRequest(_)));

        let missing: ApiError = lenddesk_common::Error::NotFound("y".to_string()).into();
        assert!(matches!(missing, ApiError::NotFound(_)));

        let dep: ApiError = lenddesk_common::Error::retryable("cache", "down").into();
        assert!(matches!(dep, ApiError::DependencyUnavailable(_)));
    }
}
