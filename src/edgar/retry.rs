// src/edgar/retry.rs
use std::time::Duration;

use crate::utils::error::AcquireError;

/// How many times to try a download and how long to wait in between.
///
/// Transient failures (5xx, network errors, a truncated archive) back off
/// exponentially from `base_backoff`, capped at `max_backoff`. Rate limiting
/// (HTTP 429) waits `rate_limit_delay * attempt`, which is much longer. Anything
/// else is not retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    pub rate_limit_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(300),
            max_backoff: Duration::from_secs(10),
            rate_limit_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the next try after `attempt` (0-based) failed with `error`,
    /// or `None` to give up.
    pub fn delay_for(&self, attempt: u32, error: &AcquireError) -> Option<Duration> {
        if attempt + 1 >= self.max_attempts {
            return None;
        }
        match error {
            AcquireError::RateLimited => Some(self.rate_limit_delay * (attempt + 1)),
            e if e.is_retryable() => {
                let factor = 2u32.saturating_pow(attempt);
                Some(self.base_backoff.saturating_mul(factor).min(self.max_backoff))
            }
            _ => None,
        }
    }
}
