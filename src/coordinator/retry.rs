//! Bounded, jittered exponential backoff

use crate::error::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy shared by the fetch loop and the page-key resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Consecutive failures tolerated before giving up
    pub max_retries: u32,
    /// Delay before the first retry, in milliseconds
    pub initial_backoff_ms: u64,
    /// Upper bound on the base delay, in milliseconds
    pub max_backoff_ms: u64,
    /// Add up to half the base delay at random
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 60_000,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that retries immediately, for tests and local sources
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            jitter: false,
        }
    }

    /// Base delay before retry `attempt` (0-based), without jitter
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt);
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }

    /// Delay before retry `attempt` (0-based)
    pub fn delay(&self, attempt: u32) -> Duration {
        let base = self.base_delay(attempt);
        if !self.jitter || base.is_zero() {
            return base;
        }
        #[allow(clippy::cast_possible_truncation)]
        let half = (base.as_millis() / 2) as u64;
        base + Duration::from_millis(rand::thread_rng().gen_range(0..=half))
    }
}

/// Consecutive-failure counter driven by a [`RetryPolicy`]
#[derive(Debug, Clone)]
pub struct Backoff {
    policy: RetryPolicy,
    failures: u32,
    total: u64,
}

impl Backoff {
    /// Start with no failures
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            failures: 0,
            total: 0,
        }
    }

    /// Record a failure and return how long to wait before retrying
    ///
    /// Fails with [`Error::MaxRetriesExceeded`] once the consecutive failures
    /// exceed the policy's budget.
    pub fn next_delay(&mut self, error: &Error) -> Result<Duration> {
        self.total += 1;
        if self.failures >= self.policy.max_retries {
            return Err(Error::MaxRetriesExceeded {
                max_retries: self.policy.max_retries,
                last_error: error.to_string(),
            });
        }
        let delay = self.policy.delay(self.failures);
        self.failures += 1;
        Ok(delay)
    }

    /// Forget consecutive failures after a success
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Current consecutive failures
    pub fn consecutive(&self) -> u32 {
        self.failures
    }

    /// Failures recorded over the lifetime of this counter
    pub fn total(&self) -> u64 {
        self.total
    }

    /// Policy in use
    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }
}
