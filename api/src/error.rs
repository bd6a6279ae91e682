//! Error types for the request/response surface.
//!
//! Mirrors the shape of [`codeintel_core::error`]'s taxonomy at the HTTP
//! boundary: a small closed set of error codes, each with a fixed status
//! code and a human-readable default message, composed into one
//! `ApiError` that implements `IntoResponse`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use codeintel_core::error::{CodeIntelError, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request failed validation (empty query, malformed option).
    InvalidInput,
    /// A referenced entity does not exist.
    NotFound,
    /// The request was cancelled (deadline expired client-side).
    Cancelled,
    /// A downstream collaborator is circuit-broken or otherwise
    /// temporarily unavailable; retrying later may succeed.
    ServiceUnavailable,
    /// A phase of the pipeline exceeded its deadline.
    Timeout,
    /// An invariant was violated in a way retrying cannot fix.
    InternalError,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Cancelled => StatusCode::BAD_REQUEST,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "invalid request",
            ErrorCode::NotFound => "entity not found",
            ErrorCode::Cancelled => "request cancelled",
            ErrorCode::ServiceUnavailable => "service temporarily unavailable",
            ErrorCode::Timeout => "operation timed out",
            ErrorCode::InternalError => "internal error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Structured error response returned by every endpoint on failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::InvalidInput,
            format!("required field '{field}' is missing"),
        )
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

/// Maps the pipeline's error-kind taxonomy onto the HTTP-facing code set,
/// so a circuit-open or retries-exhausted condition surfaces as 503
/// rather than a bare 500.
impl From<CodeIntelError> for ApiError {
    fn from(err: CodeIntelError) -> Self {
        let code = match err.kind() {
            ErrorKind::InvalidInput => ErrorCode::InvalidInput,
            ErrorKind::NotFound => ErrorCode::NotFound,
            ErrorKind::Transient => ErrorCode::ServiceUnavailable,
            ErrorKind::Timeout => ErrorCode::Timeout,
            ErrorKind::Cancelled => ErrorCode::Cancelled,
            ErrorKind::Integrity => ErrorCode::InternalError,
        };
        if code == ErrorCode::InternalError {
            tracing::error!(error = %err, "unexpected pipeline error");
        }
        Self::new(code, err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid_input(format!("invalid JSON: {err}"))
    }
}

/// Result type alias used throughout the API layer.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn codeintel_error_transient_maps_to_service_unavailable() {
        use codeintel_core::error::StorageError;
        let err: CodeIntelError = StorageError::Unavailable {
            reason: "connection reset".into(),
        }
        .into();
        let api_err: ApiError = err.into();
        assert_eq!(api_err.code, ErrorCode::ServiceUnavailable);
    }
}
