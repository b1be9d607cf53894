//! Retry policy for transient provider failures.
//!
//! Exponential backoff (base doubling per attempt, capped) plus random
//! jitter. A server `Retry-After` replaces the computed delay.

use std::time::Duration;

use alin_config::AgentConfig;
use alin_core::{LoopError, ProviderError};
use rand::Rng;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
        }
    }

    pub fn from_config(config: &AgentConfig) -> Self {
        Self::new(
            config.max_retries,
            Duration::from_millis(config.retry_base_delay_ms),
            Duration::from_millis(config.retry_max_delay_ms),
        )
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO)
    }

    /// Whether failure number `attempt` (0-based) of `error` gets another try.
    pub fn should_retry(&self, attempt: u32, error: &ProviderError) -> bool {
        attempt < self.max_retries && error.is_retryable()
    }

    /// Backoff before retry `attempt` (0-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// The delay actually slept: `Retry-After` when given, else backoff plus
    /// up to 25% jitter, never above `max_delay`.
    pub fn delay(&self, attempt: u32, error: &ProviderError) -> Duration {
        if let Some(after) = error.retry_after() {
            return after.min(self.max_delay);
        }
        let backoff = self.backoff(attempt);
        let spread = backoff.as_millis() as u64 / 4;
        let jitter = if spread == 0 {
            0
        } else {
            rand::rng().random_range(0..=spread)
        };
        (backoff + Duration::from_millis(jitter)).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&AgentConfig::default())
    }
}

/// Sleep that ends early with `Cancelled` when the token fires.
pub async fn sleep_cancellable(delay: Duration, cancel: &CancellationToken) -> Result<(), LoopError> {
    tokio::select! {
        _ = cancel.cancelled() => Err(LoopError::Cancelled),
        _ = tokio::time::sleep(delay) => Ok(()),
    }
}
