//! Retry policy for upstream page requests
//!
//! Pure decision logic. The HTTP client asks the policy whether a failed
//! attempt should be retried and how long to wait first.

use reqwest::{Method, StatusCode};
use std::time::Duration;

/// Upper bound on a single backoff sleep
pub const MAX_BACKOFF: Duration = Duration::from_secs(120);

/// Statuses that indicate a transient upstream condition
pub const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff_factor: Duration,
}

impl RetryPolicy {
    /// `max_attempts` counts the first try. Zero is treated as one.
    pub fn new(max_attempts: u32, backoff_factor: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            backoff_factor,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay before retry number `retry` (1-based): `factor * 2^(retry-1)`, capped
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_factor
            .saturating_mul(1u32 << exponent)
            .min(MAX_BACKOFF)
    }

    pub fn is_retryable_status(status: StatusCode) -> bool {
        RETRYABLE_STATUSES.contains(&status.as_u16())
    }

    /// Only idempotent reads are ever replayed
    pub fn is_retryable_method(method: &Method) -> bool {
        *method == Method::GET
    }

    /// Whether `attempt` (1-based) that ended with `status` gets another try
    pub fn should_retry_status(&self, method: &Method, status: StatusCode, attempt: u32) -> bool {
        attempt < self.max_attempts
            && Self::is_retryable_method(method)
            && Self::is_retryable_status(status)
    }

    /// Same decision for connection-level failures (refused, reset, timed out)
    pub fn should_retry_error(&self, method: &Method, error: &reqwest::Error, attempt: u32) -> bool {
        attempt < self.max_attempts
            && Self::is_retryable_method(method)
            && (error.is_connect() || error.is_timeout() || error.is_request())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(5))
    }
}
