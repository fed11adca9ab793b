//! Normalized API error
//!
//! Every failure of a request, whatever the transport did, leaves the client
//! as an [`ApiError`]. The classification predicates are derived from the
//! status code and never stored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::http::rate_limit::RateLimitInfo;

/// User-facing message for failures where no response was received
pub const NETWORK_ERROR_MESSAGE: &str =
    "No response from server. Please check your internet connection.";

/// Message used when the server sent an error without a usable body
pub const UNKNOWN_ERROR_MESSAGE: &str = "An unknown error occurred";

/// Message used when a refresh failed and no usable token is left
pub const SESSION_EXPIRED_MESSAGE: &str = "Your session has expired. Please sign in again.";

/// Closed error taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// 401 / 403
    Auth,
    /// 400
    Validation,
    /// 409
    Conflict,
    /// 404
    Resource,
    /// 429
    RateLimit,
    /// 5xx raised by the backend itself
    System,
    /// 502 / 503 / 504, an upstream dependency failed
    External,
    /// No response was received (status 0)
    Network,
    /// Anything the taxonomy does not cover
    Unknown,
}

impl ErrorKind {
    /// Classify an HTTP status code
    pub fn from_status(status: u16) -> Self {
        match status {
            0 => ErrorKind::Network,
            400 => ErrorKind::Validation,
            401 | 403 => ErrorKind::Auth,
            404 => ErrorKind::Resource,
            409 => ErrorKind::Conflict,
            429 => ErrorKind::RateLimit,
            502..=504 => ErrorKind::External,
            500..=599 => ErrorKind::System,
            _ => ErrorKind::Unknown,
        }
    }

    /// Wire code used when the backend does not send one
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "AUTH_ERROR",
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::Conflict => "CONFLICT_ERROR",
            ErrorKind::Resource => "RESOURCE_ERROR",
            ErrorKind::RateLimit => "RATE_LIMIT_ERROR",
            ErrorKind::System => "SYSTEM_ERROR",
            ErrorKind::External => "EXTERNAL_ERROR",
            ErrorKind::Network => "NETWORK_ERROR",
            ErrorKind::Unknown => "UNKNOWN_ERROR",
        }
    }

    /// Default message used when the backend does not send one
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorKind::Auth => "You are not authorized to perform this action",
            ErrorKind::Validation => "The request was invalid",
            ErrorKind::Conflict => "The request conflicts with the current state of the resource",
            ErrorKind::Resource => "The requested resource was not found",
            ErrorKind::RateLimit => "Too many requests. Please try again later.",
            ErrorKind::System => "The server encountered an error",
            ErrorKind::External => "An upstream service is unavailable",
            ErrorKind::Network => NETWORK_ERROR_MESSAGE,
            ErrorKind::Unknown => UNKNOWN_ERROR_MESSAGE,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Error body emitted by the backend
///
/// This is a typed view only. The body itself is kept verbatim in
/// [`ApiError::data`] so fields this struct does not know about survive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendErrorBody {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// The normalized error returned by every request operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
#[error("[{status}] {code}: {message}")]
pub struct ApiError {
    status: u16,
    code: String,
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rate_limit: Option<RateLimitInfo>,
}

impl ApiError {
    /// Build an error from its parts
    pub fn new(
        status: u16,
        code: impl Into<String>,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        Self {
            status,
            code: code.into(),
            message: message.into(),
            data,
            rate_limit: None,
        }
    }

    /// No response was received
    pub fn network() -> Self {
        Self::new(0, ErrorKind::Network.code(), NETWORK_ERROR_MESSAGE, None)
    }

    /// The session could not be refreshed and no usable token is left
    pub fn session_expired() -> Self {
        Self::new(401, ErrorKind::Auth.code(), SESSION_EXPIRED_MESSAGE, None)
    }

    /// Attach rate-limit metadata read from the response headers
    pub fn with_rate_limit(mut self, rate_limit: Option<RateLimitInfo>) -> Self {
        self.rate_limit = rate_limit.filter(|info| !info.is_empty());
        self
    }

    /// HTTP status, 0 when no response was received
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Backend code, or the status-derived default
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Raw response body, unchanged
    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    /// Rate-limit headers of the failed response, if any were sent
    pub fn rate_limit(&self) -> Option<&RateLimitInfo> {
        self.rate_limit.as_ref()
    }

    /// Taxonomy bucket derived from the status
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from_status(self.status)
    }

    pub fn is_network_error(&self) -> bool {
        self.status == 0
    }

    pub fn is_auth_error(&self) -> bool {
        matches!(self.status, 401 | 403)
    }

    pub fn is_server_error(&self) -> bool {
        (500..=599).contains(&self.status)
    }

    pub fn is_rate_limited(&self) -> bool {
        self.status == 429
    }

    /// Typed view over the backend body, when the body has that shape
    pub fn body(&self) -> Option<BackendErrorBody> {
        match &self.data {
            Some(value @ Value::Object(_)) => serde_json::from_value(value.clone()).ok(),
            _ => None,
        }
    }

    /// `details` of the backend body
    pub fn details(&self) -> Option<&Value> {
        self.data.as_ref().and_then(|data| data.get("details"))
    }

    /// Field-level validation messages from `details.fields`
    pub fn field_errors(&self) -> Option<&Value> {
        self.details().and_then(|details| details.get("fields"))
    }

    /// Seconds to wait before retrying a rate-limited call
    ///
    /// Prefers `details.retryAfter` from the body, then the `retry-after` header.
    pub fn retry_after(&self) -> Option<u64> {
        self.details()
            .and_then(|details| details.get("retryAfter"))
            .and_then(Value::as_u64)
            .or_else(|| self.rate_limit.as_ref().and_then(|info| info.retry_after))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_status_classification() {
        assert_eq!(ErrorKind::from_status(0), ErrorKind::Network);
        assert_eq!(ErrorKind::from_status(400), ErrorKind::Validation);
        assert_eq!(ErrorKind::from_status(401), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(403), ErrorKind::Auth);
        assert_eq!(ErrorKind::from_status(404), ErrorKind::Resource);
        assert_eq!(ErrorKind::from_status(409), ErrorKind::Conflict);
        assert_eq!(ErrorKind::from_status(429), ErrorKind::RateLimit);
        assert_eq!(ErrorKind::from_status(500), ErrorKind::System);
        assert_eq!(ErrorKind::from_status(503), ErrorKind::External);
        assert_eq!(ErrorKind::from_status(418), ErrorKind::Unknown);
    }

    #[test]
    fn test_predicates() {
        let forbidden = ApiError::new(403, "FORBIDDEN", "Access denied", None);
        assert!(forbidden.is_auth_error());
        assert!(!forbidden.is_server_error());
        assert!(!forbidden.is_network_error());

        let server = ApiError::new(502, "EXTERNAL_ERROR", "Bad gateway", None);
        assert!(server.is_server_error());
        assert_eq!(server.kind(), ErrorKind::External);

        let network = ApiError::network();
        assert!(network.is_network_error());
        assert_eq!(network.code(), "NETWORK_ERROR");
        assert_eq!(network.message(), NETWORK_ERROR_MESSAGE);
        assert!(network.data().is_none());

        let limited = ApiError::new(429, "RATE_LIMIT_ERROR", "Slow down", None);
        assert!(limited.is_rate_limited());
    }

    #[test]
    fn test_retry_after_prefers_body() {
        let error = ApiError::new(
            429,
            "RATE_LIMIT_ERROR",
            "Slow down",
            Some(json!({"details": {"retryAfter": 60}})),
        )
        .with_rate_limit(Some(RateLimitInfo {
            retry_after: Some(5),
            ..Default::default()
        }));

        assert_eq!(error.retry_after(), Some(60));

        let header_only = ApiError::new(429, "RATE_LIMIT_ERROR", "Slow down", None)
            .with_rate_limit(Some(RateLimitInfo {
                retry_after: Some(5),
                ..Default::default()
            }));
        assert_eq!(header_only.retry_after(), Some(5));
    }

    #[test]
    fn test_body_view_and_field_errors() {
        let error = ApiError::new(
            400,
            "VALIDATION_ERROR",
            "Invalid trip",
            Some(json!({
                "type": "validation",
                "code": "VALIDATION_ERROR",
                "message": "Invalid trip",
                "details": {"fields": {"name": "required"}}
            })),
        );

        let body = error.body().unwrap();
        assert_eq!(body.error_type.as_deref(), Some("validation"));
        assert_eq!(error.field_errors(), Some(&json!({"name": "required"})));
    }

    #[test]
    fn test_display() {
        let error = ApiError::new(404, "NOT_FOUND", "Trip not found", None);
        assert_eq!(error.to_string(), "[404] NOT_FOUND: Trip not found");
    }
}
