use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// # Upstream Errors
///
/// Only transport-level failures (connection refused, DNS, timeout) surface
/// as errors; an upstream HTTP reply of any status is relayed as a success
/// by the forwarding handler and never reaches this type. There are no
/// retries anywhere in the pipeline.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Upstream request failed: {0}")]
    UpstreamUnreachable(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for AppError {
    /// Convert a transport failure into an upstream error.
    ///
    /// The source URL is stripped (`without_url`) before the message is
    /// captured: the outbound URL embeds the credential and must never be
    /// carried anywhere a client-visible payload could pick it up.
    fn from(e: reqwest::Error) -> Self {
        Self::UpstreamUnreachable(e.without_url().to_string())
    }
}

/// Error response body for API endpoints.
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full error details server-side for debugging
        // but only expose sanitized messages to clients
        tracing::error!(error = %self, "Request failed");

        let (status, error_type, message, details) = match &self {
            // Transport failure reaching the upstream. The detail string was
            // already stripped of its URL in the From<reqwest::Error> impl,
            // so it is safe to return to the caller.
            AppError::UpstreamUnreachable(detail) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "upstream_unreachable",
                "Failed to reach the upstream service.",
                Some(detail.clone()),
            ),

            // Client errors - safe to show the message as it's user-facing
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", msg.as_str(), None)
            }

            // Internal errors - never expose internal details to clients
            AppError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                "An internal error occurred. Please contact support if the issue persists.",
                None,
            ),
            AppError::ConfigError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "config_error",
                "Service configuration error. Please contact support.",
                None,
            ),
        };

        let body = ErrorResponse {
            error: error_type.to_string(),
            message: message.to_string(),
            details,
        };

        (status, axum::Json(body)).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_error_maps_to_500() {
        let err = AppError::UpstreamUnreachable("connection refused".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_bad_request_maps_to_400() {
        let err = AppError::BadRequest("missing query".to_string());
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_config_error_display() {
        let err = AppError::ConfigError("PORT invalid".to_string());
        assert!(err.to_string().contains("PORT invalid"));
    }
}
