//! Registered provider state
//!
//! One [`ProviderEntry`] per registered adapter. The entry owns the mutable
//! runtime state the dispatcher coordinates across concurrent requests: the
//! circuit breaker (behind a mutex) and the in-flight counter (atomic).

use crate::config::ProviderSettings;
use crate::core_types::ProviderAdapter;
use crate::internals::circuit::{CircuitBreaker, CircuitState};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// A registered provider and its runtime state.
pub struct ProviderEntry {
    name: String,
    adapter: Arc<dyn ProviderAdapter>,
    priority: i32,
    weight: u32,
    max_concurrent: Option<u32>,
    enabled: AtomicBool,
    in_flight: AtomicU32,
    circuit: Mutex<CircuitBreaker>,
}

impl std::fmt::Debug for ProviderEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderEntry")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("weight", &self.weight)
            .field("enabled", &self.is_enabled())
            .field("in_flight", &self.current_concurrent())
            .field("circuit", &self.circuit_state())
            .finish()
    }
}

impl ProviderEntry {
    pub fn new(
        name: impl Into<String>,
        adapter: Arc<dyn ProviderAdapter>,
        settings: ProviderSettings,
        circuit_threshold: u32,
        circuit_timeout: Duration,
    ) -> Self {
        Self {
            name: name.into(),
            adapter,
            priority: settings.priority,
            weight: settings.weight,
            max_concurrent: settings.max_concurrent,
            enabled: AtomicBool::new(settings.enabled),
            in_flight: AtomicU32::new(0),
            circuit: Mutex::new(CircuitBreaker::new(circuit_threshold, circuit_timeout)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn adapter(&self) -> &Arc<dyn ProviderAdapter> {
        &self.adapter
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Acquire)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Release);
    }

    pub fn current_concurrent(&self) -> u32 {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Below the in-flight cap (always true when uncapped).
    pub fn has_capacity(&self) -> bool {
        self.max_concurrent
            .map_or(true, |cap| self.current_concurrent() < cap)
    }

    /// Selection-time circuit check; may lazily close an expired circuit.
    pub fn circuit_allows(&self, now: Instant) -> bool {
        self.circuit.lock().allows_request(now)
    }

    pub fn record_success(&self) {
        self.circuit.lock().record_success();
    }

    /// Returns `true` when this failure opened the circuit.
    pub fn record_failure(&self, now: Instant) -> bool {
        self.circuit.lock().record_failure(now)
    }

    pub fn reset_circuit(&self) {
        self.circuit.lock().reset();
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.lock().state()
    }

    /// Mark one call in flight until the returned guard drops.
    pub fn enter(&self) -> InFlightGuard<'_> {
        self.in_flight.fetch_add(1, Ordering::AcqRel);
        InFlightGuard {
            counter: &self.in_flight,
        }
    }

    pub fn info(&self) -> ProviderInfo {
        let circuit = self.circuit.lock();
        ProviderInfo {
            name: self.name.clone(),
            priority: self.priority,
            weight: self.weight,
            enabled: self.is_enabled(),
            max_concurrent: self.max_concurrent,
            current_concurrent: self.current_concurrent(),
            consecutive_failures: circuit.consecutive_failures(),
            circuit_open: circuit.is_open(),
        }
    }
}

/// Decrements the provider's in-flight count on drop, including unwinds.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    counter: &'a AtomicU32,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.counter.fetch_sub(1, Ordering::AcqRel);
    }
}

/// Operator view of one registered provider.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProviderInfo {
    pub name: String,
    pub priority: i32,
    /// Informational; selection does not use it
    pub weight: u32,
    pub enabled: bool,
    pub max_concurrent: Option<u32>,
    pub current_concurrent: u32,
    pub consecutive_failures: u32,
    pub circuit_open: bool,
}
