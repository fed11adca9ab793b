//! Authenticated API client
//!
//! Each attempt of a request runs the same ordered stages:
//! 1. authorize: read the token, refreshing it through the
//!    [`RefreshCoordinator`] when it is missing or about to expire
//! 2. build: resolve the URL and attach headers, body and credentials
//! 3. dispatch: send through the [`Transport`]
//! 4. normalize: turn anything but a 2xx into an [`ApiError`]
//!
//! Failed attempts go through the [`RetryPolicy`](crate::http::RetryPolicy)
//! and successful ones are decoded into the caller's type.

use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tracing::Instrument;

use crate::config::ClientConfig;
use crate::http::auth::{AuthHandlerRegistry, AuthHandlers, TokenFreshness};
use crate::http::builder::{RequestBuilder, RequestConfig};
use crate::http::error::{ApiError, ErrorKind};
use crate::http::normalizer::ErrorNormalizer;
use crate::http::rate_limit::RateLimitInfo;
use crate::http::refresh::{RefreshCoordinator, RefreshOutcome};
use crate::http::retry::execute_with_retry;
use crate::http::transport::{ReqwestTransport, Transport, TransportResponse};

/// Message of the error returned when a 2xx body does not match the expected type
pub const PARSE_ERROR_MESSAGE: &str = "Failed to parse server response";

/// A successful response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rate_limit: Option<RateLimitInfo>,
}

struct ClientInner {
    config: ClientConfig,
    builder: RequestBuilder,
    transport: Arc<dyn Transport>,
    auth: Arc<AuthHandlerRegistry>,
    refresh: RefreshCoordinator,
    freshness: TokenFreshness,
    normalizer: ErrorNormalizer,
}

/// Authenticated HTTP client shared by every feature of the app
///
/// Cloning is cheap; clones share the auth registry and the refresh state.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl ApiClient {
    /// Create a client using `reqwest` and an empty auth registry
    pub fn new(config: ClientConfig) -> crate::Result<Self> {
        Self::builder(config).build()
    }

    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder::new(config)
    }

    /// Install the auth layer's handlers, replacing previous ones
    pub fn register_auth_handlers(&self, handlers: Arc<dyn AuthHandlers>) {
        self.inner.auth.register(handlers);
    }

    pub fn auth_registry(&self) -> &Arc<AuthHandlerRegistry> {
        &self.inner.auth
    }

    pub fn refresh_coordinator(&self) -> &RefreshCoordinator {
        &self.inner.refresh
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub async fn get<T>(&self, path: &str, config: RequestConfig) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::GET, path, None, config).await
    }

    pub async fn delete<T>(&self, path: &str, config: RequestConfig) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        self.request(Method::DELETE, path, None, config).await
    }

    pub async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.request(Method::POST, path, Some(body), config).await
    }

    pub async fn put<B, T>(
        &self,
        path: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.request(Method::PUT, path, Some(body), config).await
    }

    pub async fn patch<B, T>(
        &self,
        path: &str,
        body: &B,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let body = to_json(body)?;
        self.request(Method::PATCH, path, Some(body), config).await
    }

    /// Send a request through the full pipeline
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        config: RequestConfig,
    ) -> Result<ApiResponse<T>, ApiError>
    where
        T: DeserializeOwned,
    {
        let span = tracing::debug_span!("api_request", method = %method, path);
        let policy = config
            .retry
            .clone()
            .unwrap_or_else(|| self.inner.config.retry.clone());
        let body = body.as_ref();
        let config = &config;

        let response = execute_with_retry(&policy, |attempt| {
            let method = method.clone();
            async move { self.attempt(method, path, body, config, attempt).await }
        })
        .instrument(span)
        .await?;

        decode(response)
    }

    async fn attempt(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        config: &RequestConfig,
        attempt: u32,
    ) -> Result<TransportResponse, ApiError> {
        let token = self.authorize(config).await?;
        let request = self
            .inner
            .builder
            .build(method, path, body, config, token.as_deref())?;

        tracing::debug!(
            attempt,
            url = %request.url,
            authenticated = token.is_some(),
            "Dispatching request"
        );

        let outcome = self.inner.transport.send(request).await;
        self.inner.normalizer.normalize(outcome)
    }

    /// Work out the token to send, refreshing first when needed
    async fn authorize(&self, config: &RequestConfig) -> Result<Option<String>, ApiError> {
        if config.skip_auth {
            return Ok(None);
        }
        let Some(handlers) = self.inner.auth.current() else {
            return Ok(None);
        };

        // Sampled before the token read so a refresh settling in between is seen
        let epoch = self.inner.refresh.epoch();
        let token = non_empty(handlers.token());

        // Never block on auth bootstrap; use whatever is there
        if !handlers.is_initialized() {
            return Ok(token);
        }

        let needs_refresh = match &token {
            Some(token) => self.inner.freshness.is_expiring(token),
            // Signed out: only refresh if there is something to refresh with
            None => handlers.refresh_token().is_some(),
        };
        if !needs_refresh {
            return Ok(token);
        }

        match self.inner.refresh.refresh_since(handlers.as_ref(), epoch).await {
            RefreshOutcome::Refreshed => Ok(non_empty(handlers.token())),
            RefreshOutcome::Rejected { .. } => {
                let token = non_empty(handlers.token());
                if self.inner.freshness.is_usable(token.as_deref()) {
                    Ok(token)
                } else {
                    Err(ApiError::session_expired())
                }
            }
        }
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.builder.base_url().as_str())
            .field("auth", &self.inner.auth)
            .field("refresh", &self.inner.refresh)
            .finish()
    }
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: ClientConfig,
    transport: Option<Arc<dyn Transport>>,
    auth: Option<Arc<AuthHandlerRegistry>>,
}

impl ApiClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            transport: None,
            auth: None,
        }
    }

    /// Use a custom transport instead of `reqwest`
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Share an existing auth registry
    pub fn auth_registry(mut self, registry: Arc<AuthHandlerRegistry>) -> Self {
        self.auth = Some(registry);
        self
    }

    /// Register auth handlers on the client's registry
    pub fn auth_handlers(self, handlers: Arc<dyn AuthHandlers>) -> Self {
        let registry = self.auth.clone().unwrap_or_default();
        registry.register(handlers);
        self.auth_registry(registry)
    }

    pub fn build(self) -> crate::Result<ApiClient> {
        self.config.validate()?;

        let builder = RequestBuilder::new(&self.config)?;
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(&self.config)?),
        };
        let freshness = TokenFreshness::new(self.config.refresh_buffer_secs);

        Ok(ApiClient {
            inner: Arc::new(ClientInner {
                builder,
                transport,
                auth: self.auth.unwrap_or_default(),
                refresh: RefreshCoordinator::new(freshness),
                freshness,
                normalizer: ErrorNormalizer::new(),
                config: self.config,
            }),
        })
    }
}

fn non_empty(token: Option<String>) -> Option<String> {
    token.filter(|token| !token.is_empty())
}

fn to_json<B: Serialize + ?Sized>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| {
        tracing::warn!(error = %e, "Could not serialize request body");
        ApiError::network()
    })
}

fn decode<T: DeserializeOwned>(response: TransportResponse) -> Result<ApiResponse<T>, ApiError> {
    let rate_limit = RateLimitInfo::from_headers(&response.headers);
    let text = if response.body.trim().is_empty() {
        "null"
    } else {
        response.body.as_str()
    };

    match serde_json::from_str::<T>(text) {
        Ok(data) => Ok(ApiResponse {
            data,
            status: response.status,
            rate_limit,
        }),
        Err(e) => {
            tracing::warn!(status = response.status, error = %e, "Response body did not match the expected type");
            Err(ApiError::new(
                response.status,
                ErrorKind::Unknown.code(),
                PARSE_ERROR_MESSAGE,
                Some(Value::String(response.body)),
            )
            .with_rate_limit(rate_limit))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Trip {
        id: String,
        name: String,
    }

    #[test]
    fn test_decode_typed_body() {
        let response = TransportResponse::new(200, r#"{"id": "t_1", "name": "Lisbon"}"#)
            .with_header("x-ratelimit-remaining", "42");

        let decoded: ApiResponse<Trip> = decode(response).unwrap();
        assert_eq!(decoded.status, 200);
        assert_eq!(decoded.data.name, "Lisbon");
        assert_eq!(decoded.rate_limit.and_then(|info| info.remaining), Some(42));
    }

    #[test]
    fn test_decode_empty_body() {
        let unit: ApiResponse<()> = decode(TransportResponse::new(204, "")).unwrap();
        assert_eq!(unit.status, 204);

        let value: ApiResponse<Value> = decode(TransportResponse::new(204, "")).unwrap();
        assert_eq!(value.data, Value::Null);

        let missing: ApiResponse<Option<Trip>> = decode(TransportResponse::new(204, "  ")).unwrap();
        assert_eq!(missing.data, None);
    }

    #[test]
    fn test_decode_mismatch_is_normalized() {
        let error = decode::<Trip>(TransportResponse::new(200, r#"{"id": 7}"#)).unwrap_err();
        assert_eq!(error.status(), 200);
        assert_eq!(error.code(), "UNKNOWN_ERROR");
        assert_eq!(error.message(), PARSE_ERROR_MESSAGE);
        assert_eq!(error.data(), Some(&json!(r#"{"id": 7}"#)));
    }

    #[test]
    fn test_builder_rejects_invalid_config() {
        let result = ApiClient::builder(ClientConfig::new("not a url")).build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_shares_registry() {
        let registry = Arc::new(AuthHandlerRegistry::new());
        let client = ApiClient::builder(ClientConfig::default())
            .auth_registry(registry.clone())
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(client.auth_registry(), &registry));
        let clone = client.clone();
        assert!(Arc::ptr_eq(clone.auth_registry(), &registry));
    }
}
