//! Transport seam between the request pipeline and the network
//!
//! The pipeline only ever talks to a [`Transport`]. Production code uses
//! [`ReqwestTransport`]; tests plug in scripted transports.

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client as ReqwestClient, Method, Url};
use serde_json::Value;
use std::time::Duration;

use crate::config::ClientConfig;

/// A fully built request, ready to be sent
#[derive(Debug, Clone)]
pub struct TransportRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Option<Value>,
    /// Per-request timeout, overriding the client default
    pub timeout: Option<Duration>,
}

/// A response received from the server, whatever its status
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Add a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failures where no complete response was received
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("request failed: {0}")]
    Request(String),
}

impl From<reqwest::Error> for TransportError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportError::Timeout
        } else if error.is_connect() {
            TransportError::Connect(error.to_string())
        } else {
            TransportError::Request(error.to_string())
        }
    }
}

/// Sends requests over the network
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError>;
}

/// [`Transport`] backed by a shared `reqwest` client
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: ReqwestClient,
}

impl ReqwestTransport {
    /// Build the underlying client from the timeouts and user agent in `config`
    pub fn new(config: &ClientConfig) -> crate::Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| crate::Error::HttpClient {
                message: format!("Failed to create HTTP client: {}", e),
                source: e,
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
        let mut builder = self
            .client
            .request(request.method, request.url)
            .headers(request.headers);

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        // A body that cannot be read means the response never fully arrived
        let body = response.text().await?;

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_helpers() {
        let response = TransportResponse::new(204, "")
            .with_header("x-ratelimit-remaining", "5")
            .with_header("bad header", "ignored");

        assert!(response.is_success());
        assert_eq!(response.headers.len(), 1);
        assert!(!TransportResponse::new(500, "").is_success());
        assert!(!TransportResponse::new(302, "").is_success());
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        let config = ClientConfig {
            connect_timeout_secs: 2,
            timeout_secs: 5,
            ..ClientConfig::default()
        };
        let transport = ReqwestTransport::new(&config).unwrap();

        // Port 9 (discard) is closed on CI hosts
        let request = TransportRequest {
            method: Method::GET,
            url: Url::parse("http://127.0.0.1:9/trips").unwrap(),
            headers: HeaderMap::new(),
            body: None,
            timeout: None,
        };

        assert!(transport.send(request).await.is_err());
    }
}
