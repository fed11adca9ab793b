//! Authenticated HTTP client for the Waypoint API
//!
//! This module provides:
//! - Auth handler registration ([`AuthHandlerRegistry`])
//! - Single-flight session refresh ([`RefreshCoordinator`])
//! - Request construction and dispatch ([`ApiClient`])
//! - Error normalization into [`ApiError`]
//! - Retries with exponential backoff for server errors

pub mod auth;
pub mod builder;
pub mod client;
pub mod error;
pub mod normalizer;
pub mod rate_limit;
pub mod refresh;
pub mod retry;
pub mod transport;

pub use auth::{token_expiry, AuthError, AuthHandlerRegistry, AuthHandlers, AuthSnapshot, TokenFreshness};
pub use builder::{parse_method, RequestBuilder, RequestConfig};
pub use client::{ApiClient, ApiClientBuilder, ApiResponse};
pub use error::{ApiError, BackendErrorBody, ErrorKind};
pub use normalizer::{normalize_body, ErrorNormalizer};
pub use rate_limit::RateLimitInfo;
pub use refresh::{RefreshCoordinator, RefreshOutcome, RefreshPhase};
pub use retry::{execute_with_retry, RetryContext, RetryDecision, RetryPolicy};
pub use transport::{ReqwestTransport, Transport, TransportError, TransportRequest, TransportResponse};

// Re-export commonly used types
pub use reqwest::{Method, StatusCode};
