//! Test helper utilities for multi-gen unit tests
//!
//! IMPORTANT: These helpers are test-only and should NEVER be used in production code.

#![allow(dead_code)]

use crate::config::{CacheConfig, CircuitBreakerConfig, DispatcherConfig};
use crate::core_types::{
    AdapterResult, Capabilities, GenerationRequest, GenerationResponse, ProviderAdapter,
    ResultPayload,
};
use crate::error::{ErrorCode, ErrorDetails};
use crate::internals::fallback::FallbackChain;
use crate::internals::retry::{BackoffStrategy, RetryPolicy};
use parking_lot::Mutex;
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

/// What a scripted adapter does on one call.
#[derive(Debug, Clone)]
pub enum Step {
    Succeed,
    Fail(ErrorDetails),
    /// Sleep before succeeding (drives timeouts under paused time)
    Hang(Duration),
    Panic,
    Processing,
}

/// Adapter that replays a fixed script, then repeats a final step forever.
pub struct ScriptedAdapter {
    name: String,
    script: Mutex<VecDeque<Step>>,
    then: Step,
    calls: AtomicU32,
    capabilities: Capabilities,
    rejection: Option<ErrorDetails>,
    healthy: bool,
    seen: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedAdapter {
    pub fn new(name: &str, script: Vec<Step>, then: Step) -> Self {
        Self {
            name: name.to_string(),
            script: Mutex::new(script.into()),
            then,
            calls: AtomicU32::new(0),
            capabilities: Capabilities::default(),
            rejection: None,
            healthy: true,
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn always(name: &str, step: Step) -> Self {
        Self::new(name, Vec::new(), step)
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn rejecting(mut self, error: ErrorDetails) -> Self {
        self.rejection = Some(error);
        self
    }

    pub fn unhealthy(mut self) -> Self {
        self.healthy = false;
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen_requests(&self) -> Vec<GenerationRequest> {
        self.seen.lock().clone()
    }

    fn next_step(&self) -> Step {
        self.script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.then.clone())
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for ScriptedAdapter {
    fn capabilities(&self) -> Capabilities {
        self.capabilities.clone()
    }

    fn validate_request(&self, _request: &GenerationRequest) -> Option<ErrorDetails> {
        self.rejection.clone()
    }

    async fn execute(&self, request: &GenerationRequest) -> AdapterResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().push(request.clone());

        match self.next_step() {
            Step::Succeed => Ok(success_response(&self.name, &request.model)),
            Step::Fail(error) => Err(error),
            Step::Hang(duration) => {
                tokio::time::sleep(duration).await;
                Ok(success_response(&self.name, &request.model))
            }
            Step::Panic => panic!("scripted adapter panic"),
            Step::Processing => {
                let mut job = ResultPayload::new();
                job.insert("job_id".to_string(), serde_json::json!("job-123"));
                Ok(GenerationResponse::processing(&self.name, &request.model, job))
            }
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }
}

pub fn success_response(provider: &str, model: &str) -> GenerationResponse {
    let mut result = ResultPayload::new();
    result.insert(
        "video_url".to_string(),
        serde_json::json!(format!("https://cdn.{provider}.test/asset.mp4")),
    );
    GenerationResponse::success(provider, model, result)
}

/// Retryable provider error that every default policy retries.
pub fn transient_error(provider: &str) -> ErrorDetails {
    ErrorDetails::new(ErrorCode::ProviderError, provider, "upstream returned 503")
}

/// Retry policy with millisecond delays to keep tests fast.
pub fn fast_retry_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy {
        max_attempts,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        backoff_multiplier: 2.0,
        strategy: BackoffStrategy::Exponential,
        jitter: 0.0,
        ..RetryPolicy::default()
    }
}

/// Config with fast retries, a small cache and no fallback chain.
pub fn test_config(max_attempts: u32) -> DispatcherConfig {
    DispatcherConfig {
        cache: CacheConfig {
            max_size: 16,
            ..CacheConfig::default()
        },
        retry: fast_retry_policy(max_attempts),
        fallback: FallbackChain::default(),
        circuit_breaker: CircuitBreakerConfig {
            threshold: 3,
            timeout: Duration::from_secs(30),
        },
        default_request_timeout: Duration::from_secs(5),
    }
}

pub fn codes(list: &[ErrorCode]) -> HashSet<ErrorCode> {
    list.iter().copied().collect()
}

pub fn video_request(provider: &str, prompt: &str) -> GenerationRequest {
    GenerationRequest::new(provider, "gen-3", prompt).with_parameter("duration", 4)
}
