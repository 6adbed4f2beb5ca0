//! Retry policy: exponential backoff with jitter.

use std::time::Duration;

use rand::Rng;
use tracing::warn;

use fireside_core::{defaults, Error, ProviderErrorKind};

/// Retry tuning for transient provider failures.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts (initial call + retries).
    pub max_attempts: u32,
    /// Base delay; doubles per attempt.
    pub base_backoff: Duration,
    /// Delay ceiling, also capping server-suggested retry-after values.
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::RETRY_MAX_ATTEMPTS,
            base_backoff: Duration::from_millis(defaults::RETRY_BASE_BACKOFF_MS),
            max_backoff: Duration::from_secs(defaults::RETRY_MAX_BACKOFF_SECS),
        }
    }
}

impl RetryPolicy {
    /// Load from environment variables with defaults.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `FIRESIDE_RETRY_MAX_ATTEMPTS` | `3` |
    /// | `FIRESIDE_RETRY_BASE_BACKOFF_MS` | `250` |
    pub fn from_env() -> Self {
        let mut policy = Self::default();
        if let Ok(val) = std::env::var("FIRESIDE_RETRY_MAX_ATTEMPTS") {
            match val.parse::<u32>() {
                Ok(n) if n > 0 => policy.max_attempts = n,
                _ => warn!(value = %val, "Invalid FIRESIDE_RETRY_MAX_ATTEMPTS, using default"),
            }
        }
        if let Ok(val) = std::env::var("FIRESIDE_RETRY_BASE_BACKOFF_MS") {
            match val.parse::<u64>() {
                Ok(ms) => policy.base_backoff = Duration::from_millis(ms),
                Err(_) => warn!(value = %val, "Invalid FIRESIDE_RETRY_BASE_BACKOFF_MS, using default"),
            }
        }
        policy
    }

    /// A policy with no retries, for tests exercising failure paths.
    pub fn no_retries() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before the next attempt (`attempt` is 0-based).
    ///
    /// A server-suggested retry-after wins over the computed backoff, capped
    /// at `max_backoff`. Otherwise exponential backoff with a 50-100% jitter
    /// factor, so a herd of concurrent retries spreads out.
    pub fn backoff(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        if let Some(suggested) = retry_after {
            return suggested.min(self.max_backoff);
        }
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_backoff);
        let jitter = rand::thread_rng().gen_range(0.5..=1.0);
        exp.mul_f64(jitter)
    }
}

/// Extract a server-suggested retry delay from an error, when present.
pub fn retry_after(err: &Error) -> Option<Duration> {
    match err {
        Error::Provider {
            kind: ProviderErrorKind::RateLimited {
                retry_after_secs: Some(secs),
            },
            ..
        } => Some(Duration::from_secs(*secs)),
        _ => None,
    }
}
