//! Transport outcome normalization
//!
//! Turns whatever came back from the [`Transport`](crate::http::Transport)
//! into either a successful response or an [`ApiError`]. Raw transport errors
//! stop here.

use serde_json::Value;

use crate::http::error::{ApiError, ErrorKind, UNKNOWN_ERROR_MESSAGE};
use crate::http::rate_limit::RateLimitInfo;
use crate::http::transport::{TransportError, TransportResponse};

/// Maps transport outcomes onto the normalized error contract
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorNormalizer;

impl ErrorNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Pass 2xx responses through; normalize everything else
    pub fn normalize(
        &self,
        outcome: Result<TransportResponse, TransportError>,
    ) -> Result<TransportResponse, ApiError> {
        match outcome {
            Ok(response) if response.is_success() => Ok(response),
            Ok(response) => Err(self.response_error(&response)),
            Err(error) => Err(self.transport_error(&error)),
        }
    }

    /// No response was received
    pub fn transport_error(&self, error: &TransportError) -> ApiError {
        tracing::debug!(error = %error, "No response received");
        ApiError::network()
    }

    /// A response with a non-success status
    pub fn response_error(&self, response: &TransportResponse) -> ApiError {
        let rate_limit = RateLimitInfo::from_headers(&response.headers);
        normalize_body(response.status, &response.body).with_rate_limit(rate_limit)
    }
}

/// Build an error from a status and raw body text
pub fn normalize_body(status: u16, body: &str) -> ApiError {
    let kind = ErrorKind::from_status(status);
    let trimmed = body.trim();

    if trimmed.is_empty() {
        return ApiError::new(status, ErrorKind::Unknown.code(), UNKNOWN_ERROR_MESSAGE, None);
    }

    let json = match serde_json::from_str::<Value>(trimmed) {
        Ok(json) => json,
        Err(_) => {
            return ApiError::new(
                status,
                ErrorKind::Unknown.code(),
                UNKNOWN_ERROR_MESSAGE,
                Some(Value::String(body.to_string())),
            );
        }
    };

    let code = string_field(&json, "code").unwrap_or_else(|| kind.code().to_string());
    let message = string_field(&json, "message").unwrap_or_else(|| kind.default_message().to_string());

    ApiError::new(status, code, message, Some(json))
}

fn string_field(json: &Value, field: &str) -> Option<String> {
    json.get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
