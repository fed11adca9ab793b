//! HTTP request construction
//!
//! Resolves request paths against the configured base URL and assembles the
//! headers, query, body and timeout of a [`TransportRequest`].

use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde_json::Value;
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::http::error::ApiError;
use crate::http::retry::RetryPolicy;
use crate::http::transport::TransportRequest;

/// Per-request options
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Extra headers, applied after the client defaults
    pub headers: Vec<(String, String)>,
    /// Query parameters appended to the URL
    pub query: Vec<(String, String)>,
    /// Timeout override for this request
    pub timeout: Option<Duration>,
    /// Send without credentials and without refreshing (sign-in, sign-up, ...)
    pub skip_auth: bool,
    /// Retry policy override for this request
    pub retry: Option<RetryPolicy>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn skip_auth(mut self) -> Self {
        self.skip_auth = true;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }
}

/// Builds transport requests for one base URL
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    base_url: Url,
    default_headers: HeaderMap,
}

impl RequestBuilder {
    /// Create a builder from the client configuration
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let mut base_url = config.base_url()?;

        // Url::join replaces the last segment unless the path ends with '/'
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let mut default_headers = HeaderMap::new();
        default_headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        for (name, value) in &config.default_headers {
            let (name, value) = parse_header(name, value).ok_or_else(|| {
                Error::configuration(format!("Invalid default header '{}'", name))
            })?;
            default_headers.insert(name, value);
        }

        Ok(Self {
            base_url,
            default_headers,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a request
    ///
    /// A request that cannot be built never reaches the network, so it fails
    /// the same way as one that got no response.
    pub fn build(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        config: &RequestConfig,
        token: Option<&str>,
    ) -> std::result::Result<TransportRequest, ApiError> {
        let url = self.build_url(path, &config.query).map_err(|e| {
            tracing::warn!(path, error = %e, "Could not build request URL");
            ApiError::network()
        })?;

        let mut headers = self.default_headers.clone();
        if body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in &config.headers {
            match parse_header(name, value) {
                Some((name, value)) => {
                    headers.insert(name, value);
                }
                None => tracing::warn!(header = %name, "Skipping invalid request header"),
            }
        }
        if let Some(token) = token {
            match HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(mut value) => {
                    value.set_sensitive(true);
                    headers.insert(AUTHORIZATION, value);
                }
                Err(_) => tracing::warn!("Access token is not a valid header value, sending without it"),
            }
        }

        Ok(TransportRequest {
            method,
            url,
            headers,
            body: body.cloned(),
            timeout: config.timeout,
        })
    }

    /// Resolve `path` against the base URL and append `query`
    fn build_url(&self, path: &str, query: &[(String, String)]) -> Result<Url> {
        let mut url = self
            .base_url
            .join(path.trim_start_matches('/'))
            .map_err(|source| Error::InvalidUrl {
                url: path.to_string(),
                source,
            })?;

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }

        Ok(url)
    }
}

/// Parse an HTTP method name, case-insensitively
pub fn parse_method(method: &str) -> Option<Method> {
    match method.to_uppercase().as_str() {
        "GET" => Some(Method::GET),
        "POST" => Some(Method::POST),
        "PUT" => Some(Method::PUT),
        "PATCH" => Some(Method::PATCH),
        "DELETE" => Some(Method::DELETE),
        "HEAD" => Some(Method::HEAD),
        _ => None,
    }
}

fn parse_header(name: &str, value: &str) -> Option<(HeaderName, HeaderValue)> {
    let name = HeaderName::from_bytes(name.as_bytes()).ok()?;
    let value = HeaderValue::from_str(value).ok()?;
    Some((name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn builder(base_url: &str) -> RequestBuilder {
        RequestBuilder::new(&ClientConfig::new(base_url)).unwrap()
    }

    #[test]
    fn test_url_building() {
        let builder = builder("https://api.waypoint.app/api");
        let config = RequestConfig::new();

        let request = builder
            .build(Method::GET, "/trips/t_1", None, &config, None)
            .unwrap();
        assert_eq!(request.url.as_str(), "https://api.waypoint.app/api/trips/t_1");

        let request = builder
            .build(Method::GET, "trips", None, &config, None)
            .unwrap();
        assert_eq!(request.url.as_str(), "https://api.waypoint.app/api/trips");
    }

    #[test]
    fn test_query_parameters() {
        let builder = builder("https://api.waypoint.app");
        let config = RequestConfig::new()
            .query("page", "2")
            .query("q", "lisbon trip");

        let request = builder
            .build(Method::GET, "/trips", None, &config, None)
            .unwrap();
        assert_eq!(
            request.url.as_str(),
            "https://api.waypoint.app/trips?page=2&q=lisbon+trip"
        );
    }

    #[test]
    fn test_headers_and_token() {
        let client_config =
            ClientConfig::new("https://api.waypoint.app").with_default_header("X-App-Version", "1.4.0");
        let builder = RequestBuilder::new(&client_config).unwrap();
        let config = RequestConfig::new()
            .header("X-Request-Source", "mobile")
            .header("bad header", "skipped");
        let body = json!({"name": "Lisbon"});

        let request = builder
            .build(Method::POST, "/trips", Some(&body), &config, Some("abc.def.ghi"))
            .unwrap();

        assert_eq!(request.headers[AUTHORIZATION], "Bearer abc.def.ghi");
        assert!(request.headers[AUTHORIZATION].is_sensitive());
        assert_eq!(request.headers[CONTENT_TYPE], "application/json");
        assert_eq!(request.headers["x-app-version"], "1.4.0");
        assert_eq!(request.headers["x-request-source"], "mobile");
        assert_eq!(request.headers.len(), 5);
        assert_eq!(request.body, Some(body));
    }

    #[test]
    fn test_no_token_no_authorization_header() {
        let request = builder("https://api.waypoint.app")
            .build(Method::GET, "/health", None, &RequestConfig::new(), None)
            .unwrap();
        assert!(!request.headers.contains_key(AUTHORIZATION));
        assert!(!request.headers.contains_key(CONTENT_TYPE));
    }

    #[test]
    fn test_invalid_default_header_is_config_error() {
        let config = ClientConfig::new("https://api.waypoint.app").with_default_header("bad header", "x");
        assert!(matches!(
            RequestBuilder::new(&config),
            Err(Error::Configuration { .. })
        ));
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!(parse_method("get"), Some(Method::GET));
        assert_eq!(parse_method("PATCH"), Some(Method::PATCH));
        assert_eq!(parse_method("delete"), Some(Method::DELETE));
        assert_eq!(parse_method("TRACE"), None);
    }
}
