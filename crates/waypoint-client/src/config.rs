//! Client configuration
//!
//! Values come from defaults, then an optional file deserialized by the
//! embedding application, then `WAYPOINT_*` environment variables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use url::Url;

use crate::error::{Error, Result};
use crate::http::retry::RetryPolicy;

/// Environment variable overriding [`ClientConfig::base_url`]
pub const ENV_API_URL: &str = "WAYPOINT_API_URL";
/// Environment variable overriding [`ClientConfig::timeout_secs`]
pub const ENV_TIMEOUT_SECS: &str = "WAYPOINT_TIMEOUT_SECS";
/// Environment variable overriding [`RetryPolicy::max_retries`]
pub const ENV_MAX_RETRIES: &str = "WAYPOINT_MAX_RETRIES";

/// Configuration for [`crate::ApiClient`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL every request path is resolved against
    pub base_url: String,

    /// Total timeout per attempt, in seconds
    pub timeout_secs: u64,

    /// Connection establishment timeout, in seconds
    pub connect_timeout_secs: u64,

    /// A token expiring within this many seconds is refreshed before dispatch
    pub refresh_buffer_secs: i64,

    /// Retry policy for server errors
    pub retry: RetryPolicy,

    /// Headers sent with every request
    pub default_headers: HashMap<String, String>,

    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000/api".to_string(),
            timeout_secs: 30,
            connect_timeout_secs: 10,
            refresh_buffer_secs: 60,
            retry: RetryPolicy::default(),
            default_headers: HashMap::new(),
            user_agent: format!("waypoint-client/{}", crate::VERSION),
        }
    }
}

impl ClientConfig {
    /// Create a configuration for the given base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Defaults overlaid with the process environment
    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    /// Overlay the process environment on this configuration
    pub fn with_env(self) -> Result<Self> {
        self.with_env_from(|key| std::env::var(key).ok())
    }

    /// Overlay values produced by `lookup` on this configuration
    pub fn with_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_API_URL) {
            self.base_url = url;
        }
        if let Some(value) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = parse_env(ENV_TIMEOUT_SECS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_RETRIES) {
            self.retry.max_retries = parse_env(ENV_MAX_RETRIES, &value)?;
        }
        Ok(self)
    }

    /// Set the request timeout
    pub fn with_timeout_secs(mut self, seconds: u64) -> Self {
        self.timeout_secs = seconds;
        self
    }

    /// Set the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Add a header sent with every request
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.insert(name.into(), value.into());
        self
    }

    /// Parsed base URL
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_url).map_err(|source| Error::InvalidUrl {
            url: self.base_url.clone(),
            source,
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::configuration(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        Ok(url)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.base_url()?;

        if self.timeout_secs == 0 {
            return Err(Error::configuration("timeout_secs must be greater than zero"));
        }
        if self.connect_timeout_secs == 0 {
            return Err(Error::configuration(
                "connect_timeout_secs must be greater than zero",
            ));
        }
        if self.connect_timeout_secs > self.timeout_secs {
            return Err(Error::configuration(
                "connect_timeout_secs should be <= timeout_secs",
            ));
        }
        if self.refresh_buffer_secs < 0 {
            return Err(Error::configuration("refresh_buffer_secs cannot be negative"));
        }

        self.retry.validate().map_err(Error::configuration)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| {
        Error::configuration(format!("{} has an invalid value: '{}'", key, value))
    })
}
