//! Test helper utilities for multi-gen integration tests
//!
//! These tests see the crate exactly as a consumer does, so the fake
//! adapters here are built only from the public API.
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

// Allow dead code in test utilities - functions are used across different test files
#![allow(dead_code)]

use async_trait::async_trait;
use multi_gen::{
    AdapterResult, BackoffStrategy, CacheConfig, CircuitBreakerConfig, Capabilities,
    Dispatcher, DispatcherConfig, ErrorDetails, FallbackChain, GenerationRequest,
    GenerationResponse, ProviderAdapter, ProviderSettings, ResultPayload, RetryPolicy,
};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// One scripted adapter behaviour.
#[derive(Debug, Clone)]
pub enum Behavior {
    Succeed,
    Fail(ErrorDetails),
    /// Sleep, then succeed
    Delay(Duration),
    Panic,
}

/// Fake provider adapter driven by a script of behaviours.
///
/// Once the script runs out, the last behaviour repeats.
pub struct FakeAdapter {
    name: String,
    script: Mutex<VecDeque<Behavior>>,
    fallback: Behavior,
    calls: AtomicU32,
    peak_concurrency: AtomicU32,
    in_flight: AtomicU32,
    capabilities: Capabilities,
}

impl FakeAdapter {
    pub fn new(name: &str, script: Vec<Behavior>, then: Behavior) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            fallback: then,
            calls: AtomicU32::new(0),
            peak_concurrency: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            capabilities: Capabilities::default(),
        })
    }

    pub fn always(name: &str, behavior: Behavior) -> Arc<Self> {
        Self::new(name, Vec::new(), behavior)
    }

    pub fn with_capabilities(name: &str, behavior: Behavior, capabilities: Capabilities) -> Arc<Self> {
        Arc::new(Self {
            name: name.to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: behavior,
            calls: AtomicU32::new(0),
            peak_concurrency: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            capabilities,
        })
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of calls this adapter served at the same time.
    pub fn peak_concurrency(&self) -> u32 {
        self.peak_concurrency.load(Ordering::SeqCst)
    }

    fn next_behavior(&self) -> Behavior {
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    async fn execute(&self, request: &GenerationRequest) -> AdapterResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_concurrency.fetch_max(now, Ordering::SeqCst);

        let outcome = match self.next_behavior() {
            Behavior::Succeed => Ok(generated(&self.name, &request.model)),
            Behavior::Fail(error) => Err(error),
            Behavior::Delay(duration) => {
                tokio::time::sleep(duration).await;
                Ok(generated(&self.name, &request.model))
            }
            Behavior::Panic => {
                self.in_flight.fetch_sub(1, Ordering::SeqCst);
                panic!("{} adapter crashed", self.name);
            }
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }

    async fn health_check(&self) -> bool {
        true
    }
}

pub fn generated(provider: &str, model: &str) -> GenerationResponse {
    let mut result = ResultPayload::new();
    result.insert(
        "video_url".to_string(),
        serde_json::json!(format!("https://cdn.{provider}.test/out.mp4")),
    );
    GenerationResponse::success(provider, model, result)
}

/// Config with millisecond backoff, suitable for real-time tests.
pub fn fast_config(max_attempts: u32) -> DispatcherConfig {
    DispatcherConfig {
        cache: CacheConfig {
            max_size: 64,
            ..CacheConfig::default()
        },
        retry: RetryPolicy {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            strategy: BackoffStrategy::Exponential,
            ..RetryPolicy::default()
        },
        fallback: FallbackChain::default(),
        circuit_breaker: CircuitBreakerConfig {
            threshold: 5,
            timeout: Duration::from_secs(60),
        },
        default_request_timeout: Duration::from_secs(5),
    }
}

/// Dispatcher with the given adapters registered in order, highest priority first.
pub fn dispatcher_with(
    config: DispatcherConfig,
    adapters: &[(&str, Arc<FakeAdapter>)],
) -> Dispatcher {
    let dispatcher = Dispatcher::new(config).expect("test config is valid");
    let count = adapters.len() as i32;
    for (index, (name, adapter)) in adapters.iter().enumerate() {
        let adapter: Arc<dyn ProviderAdapter> = adapter.clone();
        dispatcher
            .register_provider(
                *name,
                adapter,
                ProviderSettings::default().with_priority(count - index as i32),
            )
            .expect("provider names are unique");
    }
    dispatcher
}

pub fn video(provider: &str, prompt: &str) -> GenerationRequest {
    GenerationRequest::new(provider, "gen-3", prompt).with_parameter("duration", 4)
}
