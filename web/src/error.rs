//! Error types for web handlers.
//!
//! [`AppError`] bridges [`RegistrationError`] and the interaction-log errors to HTTP
//! responses. Bodies carry a stable `code` and a user-facing `message`; the source
//! error is logged for 5xx responses and never serialized.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use eventhub_core::error::RegistrationError;
use eventhub_core::interaction_log::InteractionLogError;
use serde::Serialize;
use std::fmt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Seconds a client should wait before retrying a 503.
pub const RETRY_AFTER_SECS: u32 = 1;

/// Application error type for web handlers.
///
/// # Examples
///
/// ```ignore
/// async fn handler(Path(id): Path<String>) -> Result<Json<Data>, AppError> {
///     let id = id.parse().map_err(|_| AppError::bad_request("invalid event id"))?;
///     Ok(Json(load(id).await?))
/// }
/// ```
#[derive(Debug)]
pub struct AppError {
    /// HTTP status code
    status: StatusCode,
    /// Error message (user-facing)
    message: String,
    /// Error code (for client error handling)
    code: String,
    /// Sent as `Retry-After` when set
    retry_after: Option<u32>,
    /// Internal error (for logging, not exposed to client)
    source: Option<BoxError>,
}

impl AppError {
    /// Create a new application error.
    #[must_use]
    pub const fn new(status: StatusCode, message: String, code: String) -> Self {
        Self {
            status,
            message,
            code,
            retry_after: None,
            source: None,
        }
    }

    /// Attach the underlying error for logging.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<BoxError>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Ask the client to retry after `seconds`.
    #[must_use]
    pub const fn with_retry_after(mut self, seconds: u32) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// HTTP status of the response.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Create a 400 Bad Request error.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::BAD_REQUEST,
            message.into(),
            "BAD_REQUEST".to_string(),
        )
    }

    /// Create a 401 Unauthorized error.
    #[must_use]
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::UNAUTHORIZED,
            message.into(),
            "UNAUTHORIZED".to_string(),
        )
    }

    /// Create a 404 Not Found error with a specific code.
    #[must_use]
    pub fn not_found(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message.into(), code.to_string())
    }

    /// Create a 409 Conflict error with a specific code.
    #[must_use]
    pub fn conflict(code: &str, message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message.into(), code.to_string())
    }

    /// Create a 500 Internal Server Error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            message.into(),
            "INTERNAL_SERVER_ERROR".to_string(),
        )
    }

    /// Create a 503 Service Unavailable error that asks the client to retry.
    #[must_use]
    pub fn unavailable(code: &str, message: impl Into<String>) -> Self {
        Self::new(
            StatusCode::SERVICE_UNAVAILABLE,
            message.into(),
            code.to_string(),
        )
        .with_retry_after(RETRY_AFTER_SECS)
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

/// Error response body (JSON).
#[derive(Debug, Serialize)]
struct ErrorResponse {
    /// Error code (for client error handling).
    code: String,
    /// Human-readable error message.
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            if let Some(source) = &self.source {
                tracing::error!(
                    status = %self.status,
                    code = %self.code,
                    error = %source,
                    "Request failed"
                );
            } else {
                tracing::error!(status = %self.status, code = %self.code, "Request failed");
            }
        }

        let body = ErrorResponse {
            code: self.code,
            message: self.message,
        };

        let mut response = (self.status, Json(body)).into_response();
        if let Some(seconds) = self.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        let code = err.code();
        match &err {
            RegistrationError::EventNotFound(_) | RegistrationError::NotRegistered(_) => {
                Self::not_found(code, err.to_string())
            }
            RegistrationError::CapacityExceeded(_) | RegistrationError::AlreadyRegistered(_) => {
                Self::conflict(code, err.to_string())
            }
            RegistrationError::ConcurrencyConflict | RegistrationError::ChannelUnavailable => {
                Self::unavailable(code, "The request could not be completed, retry later")
            }
            RegistrationError::Storage(_) => Self::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "An internal error occurred".to_string(),
                code.to_string(),
            )
            .with_source(err),
        }
    }
}

impl From<InteractionLogError> for AppError {
    fn from(err: InteractionLogError) -> Self {
        match err {
            InteractionLogError::Unavailable(_) => {
                Self::unavailable("LOG_UNAVAILABLE", "Interaction history is temporarily unavailable")
                    .with_source(err)
            }
            InteractionLogError::Corrupt(_) => {
                Self::internal("An internal error occurred").with_source(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eventhub_core::types::EventId;

    #[test]
    fn test_error_display() {
        let err = AppError::bad_request("Invalid input");
        assert_eq!(err.to_string(), "[BAD_REQUEST] Invalid input");
    }

    #[test]
    fn rejections_map_to_client_errors() {
        let id = EventId::new();
        let cases = [
            (RegistrationError::EventNotFound(id), StatusCode::NOT_FOUND, "EVENT_NOT_FOUND"),
            (RegistrationError::NotRegistered(id), StatusCode::NOT_FOUND, "NOT_REGISTERED"),
            (RegistrationError::CapacityExceeded(id), StatusCode::CONFLICT, "CAPACITY_EXCEEDED"),
            (RegistrationError::AlreadyRegistered(id), StatusCode::CONFLICT, "ALREADY_REGISTERED"),
        ];

        for (err, status, code) in cases {
            let app = AppError::from(err);
            assert_eq!(app.status(), status);
            assert_eq!(app.code(), code);
            assert!(app.retry_after.is_none());
        }
    }

    #[test]
    fn exhausted_retries_map_to_503_with_retry_after() {
        for err in [
            RegistrationError::ConcurrencyConflict,
            RegistrationError::ChannelUnavailable,
        ] {
            let response = AppError::from(err).into_response();
            assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
            assert_eq!(
                response.headers().get(header::RETRY_AFTER),
                Some(&HeaderValue::from(RETRY_AFTER_SECS))
            );
        }
    }

    #[test]
    fn storage_failures_hide_details() {
        let app = AppError::from(RegistrationError::Storage(
            "connection to 10.0.0.5:5432 refused".to_string(),
        ));
        assert_eq!(app.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(app.code(), "STORAGE_ERROR");
        assert!(!app.message.contains("5432"));
    }

    #[test]
    fn log_outage_is_retryable() {
        let app = AppError::from(InteractionLogError::Unavailable("pool closed".to_string()));
        assert_eq!(app.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(app.retry_after, Some(RETRY_AFTER_SECS));
    }
}
