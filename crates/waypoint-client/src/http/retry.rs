//! Retry logic with exponential backoff for HTTP requests
//!
//! Only server errors (5xx) are retried. Client errors, auth failures,
//! rate limits and network failures are surfaced to the caller immediately.

use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

use crate::http::error::ApiError;

/// Fraction of the delay added or removed when jitter is enabled
pub const JITTER_FACTOR: f64 = 0.25;

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Maximum number of retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
    /// Whether to randomize delays to spread retries from many clients
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 10_000,
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with custom settings
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Policy that never retries
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Set the base delay
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Set the maximum delay
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Total number of dispatches a request may make
    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Whether `error` may be retried after `retries` retries
    pub fn is_retryable(&self, error: &ApiError, retries: u32) -> bool {
        error.is_server_error() && retries < self.max_retries
    }

    /// Exponential backoff for one request: `base * multiplier^n`, capped,
    /// randomized by [`JITTER_FACTOR`] when jitter is on
    pub fn create_backoff(&self) -> ExponentialBackoff {
        let initial = Duration::from_millis(self.base_delay_ms);
        let mut backoff = ExponentialBackoff {
            current_interval: initial,
            initial_interval: initial,
            max_interval: Duration::from_millis(self.max_delay_ms),
            multiplier: self.multiplier,
            randomization_factor: JITTER_FACTOR,
            max_elapsed_time: None, // Bounded by max_retries instead
            ..Default::default()
        };

        if !self.jitter {
            backoff.randomization_factor = 0.0;
        }

        backoff
    }

    /// Delay before retry number `retry` (1-based)
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let mut backoff = self.create_backoff();
        let mut delay = Duration::ZERO;
        for _ in 0..retry.max(1) {
            delay = self.next_delay(&mut backoff);
        }
        delay
    }

    fn next_delay(&self, backoff: &mut ExponentialBackoff) -> Duration {
        let cap = Duration::from_millis(self.max_delay_ms);
        backoff.next_backoff().unwrap_or(cap).min(cap)
    }

    /// Validate the policy
    pub fn validate(&self) -> Result<(), String> {
        if self.multiplier < 1.0 {
            return Err("retry multiplier must be >= 1.0".to_string());
        }
        if self.base_delay_ms > self.max_delay_ms {
            return Err("retry base delay must be <= max delay".to_string());
        }
        Ok(())
    }
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay
    Retry { delay: Duration },
    /// Do not retry the request
    NoRetry,
}

/// Per-request retry bookkeeping
#[derive(Debug)]
pub struct RetryContext {
    policy: RetryPolicy,
    attempt: u32,
    last_error: Option<ApiError>,
    backoff: ExponentialBackoff,
}

impl RetryContext {
    pub fn new(policy: &RetryPolicy) -> Self {
        Self {
            policy: policy.clone(),
            attempt: 0,
            last_error: None,
            backoff: policy.create_backoff(),
        }
    }

    /// Decide whether to retry after `error`, advancing the backoff on retry
    pub fn should_retry(&mut self, error: &ApiError) -> RetryDecision {
        if !self.policy.is_retryable(error, self.retries()) {
            return RetryDecision::NoRetry;
        }

        RetryDecision::Retry {
            delay: self.policy.next_delay(&mut self.backoff),
        }
    }

    /// Dispatches made so far
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub fn max_attempts(&self) -> u32 {
        self.policy.max_attempts()
    }

    /// Retries performed so far
    pub fn retries(&self) -> u32 {
        self.attempt.saturating_sub(1)
    }

    /// The error that triggered the most recent retry
    pub fn last_error(&self) -> Option<&ApiError> {
        self.last_error.as_ref()
    }

    fn begin_attempt(&mut self) {
        self.attempt += 1;
    }
}

/// Execute a request with retry logic
///
/// `request_fn` receives the 1-based attempt number.
pub async fn execute_with_retry<F, Fut, T>(policy: &RetryPolicy, mut request_fn: F) -> Result<T, ApiError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ApiError>>,
{
    let mut context = RetryContext::new(policy);

    loop {
        context.begin_attempt();

        let error = match request_fn(context.attempt()).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        match context.should_retry(&error) {
            RetryDecision::Retry { delay } => {
                tracing::warn!(
                    attempt = context.attempt(),
                    max_attempts = context.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    status = error.status(),
                    code = error.code(),
                    "Request failed, retrying"
                );
                context.last_error = Some(error);
                tokio::time::sleep(delay).await;
            }
            RetryDecision::NoRetry => {
                if context.retries() > 0 {
                    tracing::error!(
                        attempts = context.attempt(),
                        status = error.status(),
                        code = error.code(),
                        "Request failed after retries"
                    );
                }
                return Err(error);
            }
        }
    }
}
