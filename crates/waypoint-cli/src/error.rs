//! Error types and handling for the CLI
//!
//! This module provides error types and utilities for handling
//! various failure modes in the CLI application.

use std::io;
use std::path::PathBuf;
use waypoint_client::{ApiError, ErrorKind};

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for CLI operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// The client could not be constructed
    #[error("Client error: {0}")]
    Client(#[from] waypoint_client::Error),

    /// The request failed
    #[error("{0}")]
    Api(#[from] ApiError),

    /// File not found
    #[error("File not found: {}", path.display())]
    FileNotFound { path: PathBuf },

    /// Invalid file format
    #[error("Invalid file format for {}: expected {} format", path.display(), expected)]
    InvalidFormat { path: PathBuf, expected: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid argument value or combination
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Generic error with context
    #[error("{message}")]
    Other { message: String },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create an invalid arguments error
    pub fn invalid_args(message: impl Into<String>) -> Self {
        Self::InvalidArgs(message.into())
    }

    /// Create a generic error with message
    pub fn other(message: impl Into<String>) -> Self {
        Self::Other {
            message: message.into(),
        }
    }

    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Io(_) => 1,
            Self::Client(_) => 2,
            Self::FileNotFound { .. } => 3,
            Self::InvalidFormat { .. } => 4,
            Self::Config(_) => 5,
            Self::InvalidArgs(_) => 6,
            Self::Api(error) => api_exit_code(error.kind()),
            Self::Json(_) => 12,
            Self::Yaml(_) => 13,
            Self::Other { .. } => 99,
        }
    }

    /// Check if this error should display usage help
    pub fn should_show_help(&self) -> bool {
        matches!(self, Self::InvalidArgs(_))
    }
}

/// Exit codes for failed requests, one per error kind
fn api_exit_code(kind: ErrorKind) -> i32 {
    match kind {
        ErrorKind::Network => 10,
        ErrorKind::Auth => 20,
        ErrorKind::Validation => 21,
        ErrorKind::Resource => 22,
        ErrorKind::Conflict => 23,
        ErrorKind::RateLimit => 24,
        ErrorKind::System => 25,
        ErrorKind::External => 26,
        ErrorKind::Unknown => 29,
    }
}

/// Format an error for display to the user
pub fn format_error(error: &Error, use_color: bool) -> String {
    use colored::Colorize;

    let headline = match error {
        Error::Api(api_error) if api_error.is_network_error() => api_error.message().to_string(),
        Error::Api(api_error) => format!(
            "{} {} ({})",
            api_error.status(),
            api_error.code(),
            api_error.message()
        ),
        other => other.to_string(),
    };

    let mut formatted = if use_color {
        format!("{} {}", "Error:".red().bold(), headline)
    } else {
        format!("Error: {}", headline)
    };

    if let Error::Api(api_error) = error {
        if let Some(seconds) = api_error.retry_after() {
            formatted.push_str(&format!("\n  Retry after {} seconds", seconds));
        }
        if let Some(fields) = api_error.field_errors() {
            formatted.push_str(&format!("\n  Fields: {}", fields));
        }
    }

    formatted
}
