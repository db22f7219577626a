//! Dispatch metrics
//!
//! A passive aggregator. The dispatcher reports each terminal outcome once
//! (success, processing or final failure), each cache hit once, and each
//! retry or fallback hand-off as it happens. Everything lives behind a single
//! lock so the running mean's `(total, count)` pair is never torn.

use crate::error::ErrorCode;
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
struct MetricsState {
    total_requests: u64,
    successful_requests: u64,
    failed_requests: u64,
    processing_requests: u64,
    cache_hits: u64,
    cache_misses: u64,
    retry_attempts: u64,
    fallback_invocations: u64,
    total_processing_time_ms: u64,
    timed_requests: u64,
    provider_usage: HashMap<String, u64>,
    error_counts: HashMap<ErrorCode, u64>,
}

/// Point-in-time copy of the metrics for operator endpoints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub processing_requests: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub retry_attempts: u64,
    pub fallback_invocations: u64,
    /// Mean over provider-served outcomes; cache hits are excluded
    pub average_processing_time_ms: f64,
    pub provider_usage: HashMap<String, u64>,
    pub error_counts: HashMap<ErrorCode, u64>,
    pub success_rate: f64,
    pub cache_hit_rate: f64,
}

/// Process-wide dispatch counters.
#[derive(Debug, Default)]
pub struct Metrics {
    state: Mutex<MetricsState>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_cache_hit(&self, provider: &str) {
        let mut state = self.state.lock();
        state.total_requests += 1;
        state.successful_requests += 1;
        state.cache_hits += 1;
        *state.provider_usage.entry(provider.to_string()).or_default() += 1;
    }

    pub fn record_cache_miss(&self) {
        self.state.lock().cache_misses += 1;
    }

    pub fn record_retry(&self) {
        self.state.lock().retry_attempts += 1;
    }

    pub fn record_fallback(&self) {
        self.state.lock().fallback_invocations += 1;
    }

    pub fn record_success(&self, provider: &str, processing_time_ms: u64) {
        let mut state = self.state.lock();
        state.total_requests += 1;
        state.successful_requests += 1;
        *state.provider_usage.entry(provider.to_string()).or_default() += 1;
        Self::add_timing(&mut state, processing_time_ms);
    }

    pub fn record_processing(&self, provider: &str, processing_time_ms: u64) {
        let mut state = self.state.lock();
        state.total_requests += 1;
        state.processing_requests += 1;
        *state.provider_usage.entry(provider.to_string()).or_default() += 1;
        Self::add_timing(&mut state, processing_time_ms);
    }

    /// Final failure. `provider` is `None` when no provider was contacted.
    pub fn record_failure(&self, provider: Option<&str>, code: ErrorCode, processing_time_ms: u64) {
        let mut state = self.state.lock();
        state.total_requests += 1;
        state.failed_requests += 1;
        *state.error_counts.entry(code).or_default() += 1;
        if let Some(provider) = provider.filter(|p| !p.is_empty()) {
            *state.provider_usage.entry(provider.to_string()).or_default() += 1;
        }
        Self::add_timing(&mut state, processing_time_ms);
    }

    fn add_timing(state: &mut MetricsState, processing_time_ms: u64) {
        state.total_processing_time_ms = state
            .total_processing_time_ms
            .saturating_add(processing_time_ms);
        state.timed_requests += 1;
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let state = self.state.lock().clone();
        let ratio = |num: u64, den: u64| if den == 0 { 0.0 } else { num as f64 / den as f64 };

        MetricsSnapshot {
            total_requests: state.total_requests,
            successful_requests: state.successful_requests,
            failed_requests: state.failed_requests,
            processing_requests: state.processing_requests,
            cache_hits: state.cache_hits,
            cache_misses: state.cache_misses,
            retry_attempts: state.retry_attempts,
            fallback_invocations: state.fallback_invocations,
            average_processing_time_ms: ratio(state.total_processing_time_ms, state.timed_requests),
            success_rate: ratio(state.successful_requests, state.total_requests),
            cache_hit_rate: ratio(state.cache_hits, state.cache_hits + state.cache_misses),
            provider_usage: state.provider_usage,
            error_counts: state.error_counts,
        }
    }

    pub fn reset(&self) {
        *self.state.lock() = MetricsState::default();
    }
}
