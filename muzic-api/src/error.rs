//! API error handling.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use muzic_core::error::MuzicError;

/// API error type.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    code: String,
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(status: StatusCode, message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            code: code.into(),
        }
    }

    /// Bad request error.
    pub fn bad_request(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message, code)
    }

    /// Internal server error.
    pub fn internal(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message, code)
    }

    /// Upstream (stream location) failure, reported before any byte is sent.
    pub fn bad_gateway(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_GATEWAY, message, code)
    }

    /// HTTP status of this error.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &str {
        &self.code
    }
}

/// Error response body.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.message,
            code: self.code,
        };

        (self.status, Json(body)).into_response()
    }
}

impl From<MuzicError> for ApiError {
    fn from(err: MuzicError) -> Self {
        match &err {
            MuzicError::InvalidIdentifier(_) => ApiError::bad_request(err.to_string(), "INVALID_ID"),
            MuzicError::InvalidQuery(msg) => ApiError::bad_request(msg.clone(), "INVALID_QUERY"),

            MuzicError::ResolutionFailed { .. } | MuzicError::NoStreamLocation(_) => {
                ApiError::internal(err.to_string(), "RESOLUTION_FAILED")
            }
            MuzicError::ResolutionTimeout { .. } => {
                ApiError::internal(err.to_string(), "RESOLUTION_TIMEOUT")
            }
            MuzicError::SearchFailed(_) => ApiError::internal(err.to_string(), "SEARCH_FAILED"),

            MuzicError::StaleLocation { .. } => ApiError::bad_gateway(err.to_string(), "STALE_LOCATION"),
            MuzicError::UpstreamTimeout { .. } => {
                ApiError::bad_gateway(err.to_string(), "UPSTREAM_TIMEOUT")
            }
            MuzicError::UpstreamStatus { .. }
            | MuzicError::HttpError(_)
            | MuzicError::InvalidStreamLocation(_) => {
                ApiError::bad_gateway(err.to_string(), "UPSTREAM_ERROR")
            }

            _ => {
                tracing::error!(error = %err, "Internal error");
                ApiError::internal("An internal error occurred", "INTERNAL_ERROR")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (MuzicError::InvalidIdentifier("x".into()), StatusCode::BAD_REQUEST, "INVALID_ID"),
            (MuzicError::InvalidQuery("Query required".into()), StatusCode::BAD_REQUEST, "INVALID_QUERY"),
            (
                MuzicError::ResolutionFailed { id: "x".into(), reason: "gone".into() },
                StatusCode::INTERNAL_SERVER_ERROR,
                "RESOLUTION_FAILED",
            ),
            (
                MuzicError::ResolutionTimeout { id: "x".into(), seconds: 45 },
                StatusCode::INTERNAL_SERVER_ERROR,
                "RESOLUTION_TIMEOUT",
            ),
            (MuzicError::StaleLocation { status: 403 }, StatusCode::BAD_GATEWAY, "STALE_LOCATION"),
            (MuzicError::UpstreamStatus { status: 500 }, StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            (MuzicError::UpstreamTimeout { seconds: 30 }, StatusCode::BAD_GATEWAY, "UPSTREAM_TIMEOUT"),
            (MuzicError::IoError("disk".into()), StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        ];

        for (err, status, code) in cases {
            let api = ApiError::from(err);
            assert_eq!(api.status(), status);
            assert_eq!(api.code(), code);
        }
    }

    #[test]
    fn test_internal_details_hidden() {
        let api = ApiError::from(MuzicError::InternalError("lock poisoned".into()));
        assert_eq!(api.message, "An internal error occurred");
    }
}
