//! Retry policy with configurable backoff
//!
//! Decides whether a failed call is re-attempted against the *same* provider
//! and how long to wait first:
//! - exponential: `initial_delay * multiplier^attempt`
//! - linear: `initial_delay * (attempt + 1)`
//! - fixed: `initial_delay`
//!
//! Every strategy is clamped to `max_delay`. A provider-mandated
//! `retry_after` always wins over the computed delay.

use crate::error::{ErrorCode, ErrorDetails};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::time::Duration;

/// How the delay grows between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    #[default]
    Exponential,
    Linear,
    Fixed,
}

impl BackoffStrategy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exponential" => Some(Self::Exponential),
            "linear" => Some(Self::Linear),
            "fixed" => Some(Self::Fixed),
            _ => None,
        }
    }
}

/// Retry policy configuration for provider calls
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per provider, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub initial_delay: Duration,
    /// Upper bound for any computed delay
    pub max_delay: Duration,
    /// Growth factor for exponential backoff
    pub backoff_multiplier: f64,
    pub strategy: BackoffStrategy,
    /// Extra random fraction in `[0, jitter]` added on top of the delay
    pub jitter: f64,
    /// Codes eligible for retry; the error must also be flagged retryable
    pub retryable_error_codes: HashSet<ErrorCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            backoff_multiplier: 2.0,
            strategy: BackoffStrategy::Exponential,
            jitter: 0.0,
            retryable_error_codes: HashSet::from([
                ErrorCode::RateLimitExceeded,
                ErrorCode::Timeout,
                ErrorCode::NetworkError,
                ErrorCode::ProviderError,
            ]),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Whether to re-attempt after `attempts_made` calls ended with `error`.
    pub fn should_retry(&self, error: &ErrorDetails, attempts_made: u32) -> bool {
        attempts_made < self.max_attempts
            && error.retryable
            && self.retryable_error_codes.contains(&error.code)
    }

    /// Backoff before retry number `attempt` (0-based), without jitter.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let initial = self.initial_delay.as_secs_f64();
        let delay_seconds = match self.strategy {
            BackoffStrategy::Exponential => {
                initial * self.backoff_multiplier.powi(attempt.min(i32::MAX as u32) as i32)
            }
            BackoffStrategy::Linear => initial * (f64::from(attempt) + 1.0),
            BackoffStrategy::Fixed => initial,
        };

        let clamped = delay_seconds.min(self.max_delay.as_secs_f64());
        if clamped > 0.0 {
            // Unrepresentable values (overflow, infinity) saturate at max_delay
            Duration::try_from_secs_f64(clamped)
                .map_or(self.max_delay, |delay| delay.min(self.max_delay))
        } else {
            Duration::ZERO
        }
    }

    /// Actual wait before the next attempt: jittered backoff, raised to the
    /// provider's `retry_after` when that is longer.
    pub fn wait_for(&self, error: &ErrorDetails, attempt: u32) -> Duration {
        let mut delay = self.delay_for(attempt);

        if self.jitter > 0.0 {
            let jitter = fastrand::f64() * self.jitter;
            delay = Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter))
                .unwrap_or(Duration::MAX);
        }

        match error.retry_after_secs {
            Some(seconds) => delay.max(Duration::from_secs(seconds)),
            None => delay,
        }
    }
}
