//! # Error Handling Module
//!
//! Request-time error taxonomy for the dispatch engine. Every error kind maps
//! to exactly one HTTP status code and serializes to a structured JSON body,
//! optionally carrying a detail payload (e.g. validation issues).
//!
//! Build-time failures live in [`crate::manifest::ManifestError`] and are
//! fatal before any request is served.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::{json, Value};
use thiserror::Error;

/// Main result type used throughout the engine
pub type ApiResult<T> = Result<T, ApiError>;

/// The fixed set of constructible error kinds.
///
/// Raising any of these anywhere in the pipeline aborts the remaining stages
/// (except guaranteed "after" hooks) and is mapped to an HTTP response by the
/// dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    MethodNotAllowed,
    RequestTimeout,
    Conflict,
    PayloadTooLarge,
    GatewayTimeout,
    Internal,
    NotImplemented,
    ServiceUnavailable,
    /// A pipeline stage attempted to write after the response was finalized.
    /// Logged by the dispatcher, never surfaced to the client.
    ResponseAlreadySent,
}

impl ErrorKind {
    /// HTTP status code for this kind. The mapping is fixed.
    pub fn status_code(self) -> StatusCode {
        match self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Conflict => StatusCode::CONFLICT,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            Self::GatewayTimeout => StatusCode::GATEWAY_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotImplemented => StatusCode::NOT_IMPLEMENTED,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ResponseAlreadySent => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable string identifier used in API error bodies.
    pub fn error_type(self) -> &'static str {
        match self {
            Self::BadRequest => "bad_request",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::NotFound => "not_found",
            Self::MethodNotAllowed => "method_not_allowed",
            Self::RequestTimeout => "request_timeout",
            Self::Conflict => "conflict",
            Self::PayloadTooLarge => "payload_too_large",
            Self::GatewayTimeout => "gateway_timeout",
            Self::Internal => "internal_error",
            Self::NotImplemented => "not_implemented",
            Self::ServiceUnavailable => "service_unavailable",
            Self::ResponseAlreadySent => "response_already_sent",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.error_type())
    }
}

/// A typed request-processing error.
///
/// Middlewares and handlers return these; the dispatcher maps them to HTTP
/// responses. Internal faults are reported to the client without their
/// message to avoid leaking internals.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct ApiError {
    kind: ErrorKind,
    message: String,
    detail: Option<Value>,
}

impl ApiError {
    /// Create an error of an arbitrary kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Attach a structured detail payload (e.g. validation issues).
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = Some(detail);
        self
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::BadRequest, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn method_not_allowed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MethodNotAllowed, message)
    }

    pub fn request_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestTimeout, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn payload_too_large(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PayloadTooLarge, message)
    }

    pub fn gateway_timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::GatewayTimeout, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn not_implemented(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotImplemented, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    pub(crate) fn response_already_sent(stage: &str) -> Self {
        Self::new(
            ErrorKind::ResponseAlreadySent,
            format!("stage '{stage}' attempted to write after response was sent"),
        )
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn detail(&self) -> Option<&Value> {
        self.detail.as_ref()
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.kind.status_code()
    }

    /// True for faults that must not leak their message to clients.
    pub fn is_internal(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::Internal | ErrorKind::ResponseAlreadySent
        )
    }

    /// Structured JSON error body sent to clients.
    ///
    /// Internal faults are masked; `correlation_id` lets operators find the
    /// full log entry for a masked response.
    pub fn to_body(&self, correlation_id: &str) -> Value {
        let status = self.status_code();
        let message = if self.is_internal() {
            "internal server error".to_string()
        } else {
            self.message.clone()
        };

        let mut body = json!({
            "error": {
                "code": status.as_u16(),
                "type": self.kind.error_type(),
                "message": message,
                "correlation_id": correlation_id,
            }
        });
        if !self.is_internal() {
            if let Some(detail) = &self.detail {
                body["error"]["detail"] = detail.clone();
            }
        }
        body
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        Self::internal(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::bad_request(format!("invalid JSON: {err}"))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = self.to_body(&uuid::Uuid::new_v4().to_string());
        (status, Json(body)).into_response()
    }
}
