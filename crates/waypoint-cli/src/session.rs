//! Auth handlers backed by command-line credentials
//!
//! Tokens come from `--token`/`--refresh-token` (or their environment
//! variables) and live only for the duration of the command. A refresh posts
//! the refresh token to the configured endpoint without credentials.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::RwLock;
use waypoint_client::{ApiClient, AuthError, AuthHandlers, RequestConfig};

/// Refresh endpoint settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Path the refresh token is posted to
    pub refresh_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            refresh_path: "/auth/refresh".to_string(),
        }
    }
}

/// Tokens returned by the refresh endpoint
#[derive(Debug, Deserialize)]
struct SessionTokens {
    #[serde(alias = "accessToken", alias = "token")]
    access_token: String,
    #[serde(default, alias = "refreshToken")]
    refresh_token: Option<String>,
}

#[derive(Debug, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

/// Session held in memory for one CLI invocation
pub struct CliSession {
    tokens: RwLock<Tokens>,
    refresh_client: ApiClient,
    refresh_path: String,
}

impl CliSession {
    /// `refresh_client` must not have this session registered
    pub fn new(
        token: Option<String>,
        refresh_token: Option<String>,
        refresh_client: ApiClient,
        config: &AuthConfig,
    ) -> Self {
        Self {
            tokens: RwLock::new(Tokens {
                access: token.filter(|t| !t.is_empty()),
                refresh: refresh_token.filter(|t| !t.is_empty()),
            }),
            refresh_client,
            refresh_path: config.refresh_path.clone(),
        }
    }

    pub fn has_credentials(&self) -> bool {
        let tokens = self.read();
        tokens.access.is_some() || tokens.refresh.is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Tokens> {
        self.tokens.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Tokens> {
        self.tokens.write().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AuthHandlers for CliSession {
    fn token(&self) -> Option<String> {
        self.read().access.clone()
    }

    fn refresh_token(&self) -> Option<String> {
        self.read().refresh.clone()
    }

    fn is_initialized(&self) -> bool {
        true
    }

    async fn refresh_session(&self) -> Result<(), AuthError> {
        let refresh_token = self.refresh_token().ok_or(AuthError::MissingRefreshToken)?;

        let response = self
            .refresh_client
            .post::<_, SessionTokens>(
                &self.refresh_path,
                &json!({ "refreshToken": refresh_token }),
                RequestConfig::new().skip_auth(),
            )
            .await
            .map_err(|error| {
                if error.is_auth_error() {
                    AuthError::RefreshRejected(error.message().to_string())
                } else {
                    AuthError::RefreshFailed(error.to_string())
                }
            })?;

        let mut tokens = self.write();
        tokens.access = Some(response.data.access_token);
        if let Some(refresh) = response.data.refresh_token {
            tokens.refresh = Some(refresh);
        }
        Ok(())
    }

    fn logout(&self) {
        tracing::warn!("Session could not be refreshed, dropping credentials");
        *self.write() = Tokens::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use waypoint_client::http::{Transport, TransportError, TransportRequest, TransportResponse};
    use waypoint_client::{ClientConfig, RetryPolicy};

    struct FixedTransport {
        status: u16,
        body: String,
        seen: Mutex<Vec<TransportRequest>>,
    }

    #[async_trait]
    impl Transport for FixedTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(TransportResponse::new(self.status, self.body.clone()))
        }
    }

    fn session(status: u16, body: serde_json::Value) -> (CliSession, Arc<FixedTransport>) {
        let transport = Arc::new(FixedTransport {
            status,
            body: body.to_string(),
            seen: Mutex::new(Vec::new()),
        });
        let client = ApiClient::builder(
            ClientConfig::new("https://api.waypoint.test").with_retry(RetryPolicy::disabled()),
        )
        .transport(transport.clone())
        .build()
        .unwrap();

        let session = CliSession::new(
            Some("old-token".to_string()),
            Some("refresh-1".to_string()),
            client,
            &AuthConfig::default(),
        );
        (session, transport)
    }

    #[tokio::test]
    async fn test_refresh_stores_new_tokens() {
        let (session, transport) = session(200, json!({"accessToken": "new-token", "refreshToken": "refresh-2"}));

        session.refresh_session().await.unwrap();

        assert_eq!(session.token().as_deref(), Some("new-token"));
        assert_eq!(session.refresh_token().as_deref(), Some("refresh-2"));

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen[0].url.as_str(), "https://api.waypoint.test/auth/refresh");
        assert_eq!(seen[0].body, Some(json!({"refreshToken": "refresh-1"})));
        assert!(!seen[0].headers.contains_key("authorization"));
    }

    #[tokio::test]
    async fn test_rejected_refresh() {
        let (session, _) = session(401, json!({"code": "AUTH_ERROR", "message": "Refresh token revoked"}));

        let error = session.refresh_session().await.unwrap_err();

        assert_eq!(error, AuthError::RefreshRejected("Refresh token revoked".to_string()));
        assert_eq!(session.token().as_deref(), Some("old-token"));

        session.logout();
        assert!(!session.has_credentials());
    }

    #[tokio::test]
    async fn test_missing_refresh_token() {
        let (session, transport) = session(200, json!({}));
        session.logout();

        let error = session.refresh_session().await.unwrap_err();

        assert_eq!(error, AuthError::MissingRefreshToken);
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}
