//! Error types for building and configuring the client
//!
//! Request failures are never reported through this type; they are always
//! normalized into [`crate::http::ApiError`]. This enum only covers things that
//! go wrong before a client exists.

use thiserror::Error;

/// Construction and configuration errors
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration values that cannot be used
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Base URL or request path that does not form a valid URL
    #[error("Invalid URL '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    /// The underlying HTTP client could not be created
    #[error("HTTP client error: {message}")]
    HttpClient {
        message: String,
        #[source]
        source: reqwest::Error,
    },
}

impl Error {
    pub fn configuration(message: impl Into<String>) -> Self {
        Error::Configuration {
            message: message.into(),
        }
    }
}

/// Convenience type alias for Results using our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let err = Error::configuration("timeout_secs must be greater than zero");
        assert_eq!(
            err.to_string(),
            "Configuration error: timeout_secs must be greater than zero"
        );
    }

    #[test]
    fn test_invalid_url_keeps_source() {
        let source = url::Url::parse("not a url").unwrap_err();
        let err = Error::InvalidUrl {
            url: "not a url".to_string(),
            source,
        };
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().starts_with("Invalid URL 'not a url'"));
    }
}
