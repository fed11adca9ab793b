//! Authentication handler seam
//!
//! The client does not know how sessions are stored or refreshed. The
//! application's auth layer registers an [`AuthHandlers`] implementation and
//! the client only ever goes through it:
//! - reading the current access and refresh tokens
//! - checking whether auth bootstrap has finished
//! - refreshing the session, or logging out when that is no longer possible

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, RwLock};

/// Errors reported by an auth layer while refreshing a session
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("No refresh token available")]
    MissingRefreshToken,

    #[error("Refresh token rejected: {0}")]
    RefreshRejected(String),

    #[error("Session refresh failed: {0}")]
    RefreshFailed(String),
}

/// Capabilities an auth layer provides to the client
#[async_trait]
pub trait AuthHandlers: Send + Sync {
    /// Current access token
    fn token(&self) -> Option<String>;

    /// Current refresh token
    fn refresh_token(&self) -> Option<String>;

    /// Whether the auth layer has finished restoring its state
    fn is_initialized(&self) -> bool;

    /// Exchange the refresh token for a new session
    ///
    /// On success the new access token must be visible through [`token`](Self::token).
    async fn refresh_session(&self) -> Result<(), AuthError>;

    /// Drop the session
    fn logout(&self);
}

/// Read-only view of the auth state at one instant
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSnapshot {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub is_initialized: bool,
}

/// Holds the registered [`AuthHandlers`], last registration wins
#[derive(Default)]
pub struct AuthHandlerRegistry {
    handlers: RwLock<Option<Arc<dyn AuthHandlers>>>,
}

impl AuthHandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `handlers`, replacing any previous set
    pub fn register(&self, handlers: Arc<dyn AuthHandlers>) {
        let mut slot = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        if slot.is_some() {
            tracing::debug!("Replacing registered auth handlers");
        }
        *slot = Some(handlers);
    }

    /// Remove the registered handlers; requests become unauthenticated
    pub fn clear(&self) {
        *self.handlers.write().unwrap_or_else(|e| e.into_inner()) = None;
    }

    /// The registered handlers, if any
    pub fn current(&self) -> Option<Arc<dyn AuthHandlers>> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn is_registered(&self) -> bool {
        self.current().is_some()
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        match self.current() {
            Some(handlers) => AuthSnapshot {
                token: handlers.token(),
                refresh_token: handlers.refresh_token(),
                is_initialized: handlers.is_initialized(),
            },
            None => AuthSnapshot::default(),
        }
    }
}

impl std::fmt::Debug for AuthHandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthHandlerRegistry")
            .field("registered", &self.is_registered())
            .finish()
    }
}

/// Decides whether an access token needs refreshing
///
/// Only JWTs carrying an `exp` claim can be judged. Opaque tokens are always
/// treated as fresh and left for the server to reject.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenFreshness {
    refresh_buffer_secs: i64,
}

impl Default for TokenFreshness {
    fn default() -> Self {
        Self::new(60)
    }
}

impl TokenFreshness {
    pub fn new(refresh_buffer_secs: i64) -> Self {
        Self {
            refresh_buffer_secs: refresh_buffer_secs.max(0),
        }
    }

    /// Expired, or expiring within the refresh buffer
    pub fn is_expiring(&self, token: &str) -> bool {
        self.is_expiring_at(token, Utc::now().timestamp())
    }

    /// Present and not yet expired
    pub fn is_usable(&self, token: Option<&str>) -> bool {
        let now = Utc::now().timestamp();
        match token {
            Some(token) if !token.is_empty() => token_expiry(token).map_or(true, |exp| exp > now),
            _ => false,
        }
    }

    fn is_expiring_at(&self, token: &str, now: i64) -> bool {
        token_expiry(token).is_some_and(|exp| exp <= now.saturating_add(self.refresh_buffer_secs))
    }
}

/// `exp` claim of a JWT, in seconds since the epoch
pub fn token_expiry(token: &str) -> Option<i64> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;
    exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    fn jwt(claims: Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        format!("{}.{}.signature", header, payload)
    }

    struct FixedHandlers {
        token: Mutex<Option<String>>,
    }

    #[async_trait]
    impl AuthHandlers for FixedHandlers {
        fn token(&self) -> Option<String> {
            self.token.lock().unwrap().clone()
        }
        fn refresh_token(&self) -> Option<String> {
            Some("refresh".to_string())
        }
        fn is_initialized(&self) -> bool {
            true
        }
        async fn refresh_session(&self) -> Result<(), AuthError> {
            Ok(())
        }
        fn logout(&self) {
            *self.token.lock().unwrap() = None;
        }
    }

    fn fixed(token: &str) -> Arc<dyn AuthHandlers> {
        Arc::new(FixedHandlers {
            token: Mutex::new(Some(token.to_string())),
        })
    }

    #[test]
    fn test_token_expiry_parsing() {
        assert_eq!(token_expiry(&jwt(json!({"exp": 1_700_000_000}))), Some(1_700_000_000));
        assert_eq!(token_expiry(&jwt(json!({"exp": 1_700_000_000.5}))), Some(1_700_000_000));
        assert_eq!(token_expiry(&jwt(json!({"sub": "user_1"}))), None);
        assert_eq!(token_expiry("opaque-session-token"), None);
        assert_eq!(token_expiry("a.!!!.c"), None);
        assert_eq!(token_expiry("a.b.c.d"), None);
    }

    #[test]
    fn test_freshness() {
        let freshness = TokenFreshness::new(60);
        let now = 1_700_000_000;

        assert!(freshness.is_expiring_at(&jwt(json!({"exp": now - 1})), now));
        assert!(freshness.is_expiring_at(&jwt(json!({"exp": now + 30})), now));
        assert!(!freshness.is_expiring_at(&jwt(json!({"exp": now + 3600})), now));
        assert!(!freshness.is_expiring_at("opaque-session-token", now));
    }

    #[test]
    fn test_huge_buffer_saturates() {
        let freshness = TokenFreshness::new(i64::MAX);
        let now = Utc::now().timestamp();

        assert!(freshness.is_expiring(&jwt(json!({"exp": now + 3600}))));
        assert!(freshness.is_expiring_at(&jwt(json!({"exp": i64::MAX})), now));
    }

    #[test]
    fn test_usable() {
        let freshness = TokenFreshness::default();
        let now = Utc::now().timestamp();

        assert!(freshness.is_usable(Some(&jwt(json!({"exp": now + 30})))));
        assert!(!freshness.is_usable(Some(&jwt(json!({"exp": now - 30})))));
        assert!(freshness.is_usable(Some("opaque-session-token")));
        assert!(!freshness.is_usable(Some("")));
        assert!(!freshness.is_usable(None));
    }

    #[test]
    fn test_registry_last_writer_wins() {
        let registry = AuthHandlerRegistry::new();
        assert!(!registry.is_registered());
        assert_eq!(registry.snapshot(), AuthSnapshot::default());

        registry.register(fixed("first"));
        registry.register(fixed("second"));

        let snapshot = registry.snapshot();
        assert_eq!(snapshot.token.as_deref(), Some("second"));
        assert_eq!(snapshot.refresh_token.as_deref(), Some("refresh"));
        assert!(snapshot.is_initialized);

        registry.clear();
        assert!(registry.current().is_none());
    }
}
