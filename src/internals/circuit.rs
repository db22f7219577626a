//! Per-provider circuit breaker
//!
//! Two states only. `Closed` lets traffic through; `Open` makes the
//! dispatcher skip the provider. There is no half-open trial: once the
//! cooldown has elapsed, the next selection closes the circuit and the call
//! that follows is a normal attempt.
//!
//! Transitions take `now` explicitly so they can be tested without a clock.

use crate::logging::{log_debug, log_warn};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    Closed, // Normal operation
    Open,   // Failing, provider skipped
}

/// Consecutive-failure circuit breaker for one provider.
///
/// Invariant: `Open` implies `consecutive_failures >= threshold`.
#[derive(Debug, Clone)]
pub struct CircuitBreaker {
    state: CircuitState,
    consecutive_failures: u32,
    last_failure_at: Option<Instant>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreaker {
    pub fn new(threshold: u32, cooldown: Duration) -> Self {
        Self {
            state: CircuitState::Closed,
            consecutive_failures: 0,
            last_failure_at: None,
            threshold: threshold.max(1),
            cooldown,
        }
    }

    /// Selection-time check. Lazily closes an open circuit whose cooldown has
    /// elapsed, then reports whether the provider may be called.
    pub fn allows_request(&mut self, now: Instant) -> bool {
        match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => self.try_close(now),
        }
    }

    fn try_close(&mut self, now: Instant) -> bool {
        let Some(last_failure) = self.last_failure_at else {
            self.close();
            return true;
        };

        if now.saturating_duration_since(last_failure) > self.cooldown {
            log_debug!(
                circuit_breaker = "closing",
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Circuit breaker cooldown elapsed, provider eligible again"
            );
            self.close();
            true
        } else {
            false
        }
    }

    fn close(&mut self) {
        self.state = CircuitState::Closed;
        self.consecutive_failures = 0;
    }

    pub fn record_success(&mut self) {
        self.consecutive_failures = 0;
        self.state = CircuitState::Closed;
    }

    /// Record a failed attempt. Returns `true` if this failure opened the circuit.
    pub fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.last_failure_at = Some(now);

        if self.consecutive_failures >= self.threshold && self.state != CircuitState::Open {
            log_warn!(
                circuit_breaker = "opened",
                consecutive_failures = self.consecutive_failures,
                threshold = self.threshold,
                cooldown_ms = self.cooldown.as_millis() as u64,
                "Circuit breaker opened due to repeated failures"
            );
            self.state = CircuitState::Open;
            return true;
        }
        false
    }

    /// Close by operator request, forgetting the failure history.
    pub fn reset(&mut self) {
        self.close();
        self.last_failure_at = None;
    }

    pub fn state(&self) -> CircuitState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == CircuitState::Open
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure_at(&self) -> Option<Instant> {
        self.last_failure_at
    }
}
