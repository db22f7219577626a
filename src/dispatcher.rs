//! Generation dispatcher
//!
//! The dispatcher is the single entry point callers use. One `execute` call
//! walks this state machine:
//!
//! ```text
//! cache lookup ──hit──> return cached response
//!      │ miss
//!      v
//! candidate selection (fallback chain order, requested provider first)
//!      │
//!      v
//! validation ──invalid──> fail, no retry, no fallback
//!      │
//!      v
//! for each candidate:
//!     circuit open / at capacity ──> skip
//!     retry loop against this candidate
//!         success ──> cache write, metrics, return
//!     failure eligible for fallback? ──> next candidate
//!                                 else ──> fail
//! ```
//!
//! `execute` never panics across its boundary and never returns an `Err`:
//! every outcome, including a panicking adapter, comes back as a
//! [`GenerationResponse`].
//!
//! Concurrent identical requests are not coalesced. Two callers that miss
//! the cache for the same fingerprint both reach the provider.

use crate::config::{DispatcherConfig, ProviderSettings};
use crate::core_types::{
    GenerationRequest, GenerationResponse, ProviderAdapter, ResponseStatus,
};
use crate::error::{DispatchError, DispatchResult, ErrorDetails, ErrorSeverity};
use crate::internals::cache::{fingerprint, CacheStats, ResponseCache};
use crate::internals::metrics::{Metrics, MetricsSnapshot};
use crate::logging::{log_debug, log_error, log_info, log_warn, request_span};
use crate::providers::{ProviderEntry, ProviderInfo};
use futures_util::future::join_all;
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Multi-provider dispatcher with caching, retry, circuit breaking and fallback.
///
/// Share it behind an `Arc` and call [`execute`](Self::execute) from as many
/// tasks as needed.
///
/// # Example
///
/// ```rust,no_run
/// use multi_gen::{Dispatcher, DispatcherConfig, GenerationRequest, ProviderSettings};
/// # use std::sync::Arc;
/// # async fn example(adapter: Arc<dyn multi_gen::ProviderAdapter>) -> anyhow::Result<()> {
/// let dispatcher = Dispatcher::new(DispatcherConfig::default())?;
/// dispatcher.register_provider("runway", adapter, ProviderSettings::default())?;
///
/// let request = GenerationRequest::new("runway", "gen-3", "a lighthouse at dusk")
///     .with_parameter("duration", 4);
/// let response = dispatcher.execute(request).await;
/// if response.is_success() {
///     println!("served by {}", response.provider);
/// }
/// # Ok(())
/// # }
/// ```
pub struct Dispatcher {
    config: DispatcherConfig,
    providers: RwLock<HashMap<String, Arc<ProviderEntry>>>,
    cache: ResponseCache,
    metrics: Metrics,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("providers", &self.providers.read().keys().collect::<Vec<_>>())
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

impl Dispatcher {
    /// Create a dispatcher with no registered providers.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] if the configuration fails
    /// [`DispatcherConfig::validate`].
    pub fn new(config: DispatcherConfig) -> DispatchResult<Self> {
        config.validate()?;

        let cache = ResponseCache::new(
            config.cache.max_size,
            config.cache.default_ttl,
            config.cache.eviction_policy,
        );

        log_debug!(
            cache_enabled = config.cache.enabled,
            cache_policy = ?config.cache.eviction_policy,
            retry_max_attempts = config.retry.max_attempts,
            fallback_chain = ?config.fallback.providers,
            circuit_threshold = config.circuit_breaker.threshold,
            "Dispatcher created"
        );

        Ok(Self {
            config,
            providers: RwLock::new(HashMap::new()),
            cache,
            metrics: Metrics::new(),
        })
    }

    /// Create a dispatcher configured from `MULTI_GEN_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] if a variable cannot be parsed
    /// or the resulting configuration is invalid.
    pub fn from_env() -> DispatchResult<Self> {
        Self::new(DispatcherConfig::from_env()?)
    }

    pub fn config(&self) -> &DispatcherConfig {
        &self.config
    }

    // =========================================================================
    // Provider administration
    // =========================================================================

    /// Register an adapter under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::DuplicateProvider`] if `name` is taken and
    /// [`DispatchError::Configuration`] if `name` is empty.
    pub fn register_provider(
        &self,
        name: impl Into<String>,
        adapter: Arc<dyn ProviderAdapter>,
        settings: ProviderSettings,
    ) -> DispatchResult<()> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(DispatchError::configuration("provider name must not be empty"));
        }

        let mut providers = self.providers.write();
        if providers.contains_key(&name) {
            return Err(DispatchError::duplicate_provider(name));
        }

        log_info!(
            provider = %name,
            priority = settings.priority,
            weight = settings.weight,
            enabled = settings.enabled,
            "Provider registered"
        );

        let entry = ProviderEntry::new(
            name.clone(),
            adapter,
            settings,
            self.config.circuit_breaker.threshold,
            self.config.circuit_breaker.timeout,
        );
        providers.insert(name, Arc::new(entry));
        Ok(())
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownProvider`] if `name` is not registered.
    pub fn unregister_provider(&self, name: &str) -> DispatchResult<()> {
        match self.providers.write().remove(name) {
            Some(_) => {
                log_info!(provider = %name, "Provider unregistered");
                Ok(())
            }
            None => Err(DispatchError::unknown_provider(name)),
        }
    }

    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownProvider`] if `name` is not registered.
    pub fn set_provider_enabled(&self, name: &str, enabled: bool) -> DispatchResult<()> {
        let entry = self.entry(name)?;
        entry.set_enabled(enabled);
        log_info!(provider = %name, enabled = enabled, "Provider availability changed");
        Ok(())
    }

    /// Close a provider's circuit and forget its failure history.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::UnknownProvider`] if `name` is not registered.
    pub fn reset_circuit(&self, name: &str) -> DispatchResult<()> {
        self.entry(name)?.reset_circuit();
        log_info!(provider = %name, "Circuit breaker reset by operator");
        Ok(())
    }

    /// Registered providers, highest priority first.
    pub fn list_providers(&self) -> Vec<ProviderInfo> {
        let mut infos: Vec<ProviderInfo> =
            self.providers.read().values().map(|e| e.info()).collect();
        infos.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
        infos
    }

    pub fn provider_info(&self, name: &str) -> Option<ProviderInfo> {
        self.providers.read().get(name).map(|e| e.info())
    }

    fn entry(&self, name: &str) -> DispatchResult<Arc<ProviderEntry>> {
        self.providers
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| DispatchError::unknown_provider(name))
    }

    /// Run every adapter's health check concurrently.
    ///
    /// A panicking check reports the provider as unhealthy.
    pub async fn health_check_all(&self) -> HashMap<String, bool> {
        let entries: Vec<Arc<ProviderEntry>> = self.providers.read().values().cloned().collect();

        let checks = entries.into_iter().map(|entry| async move {
            let healthy = AssertUnwindSafe(entry.adapter().health_check())
                .catch_unwind()
                .await
                .unwrap_or(false);
            log_debug!(provider = %entry.name(), healthy = healthy, "Provider health checked");
            (entry.name().to_string(), healthy)
        });

        join_all(checks).await.into_iter().collect()
    }

    // =========================================================================
    // Metrics and cache administration
    // =========================================================================

    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
        log_info!("Dispatcher metrics reset");
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Cache key a request would be stored under.
    pub fn cache_key(&self, request: &GenerationRequest) -> String {
        fingerprint(
            &request.provider,
            &request.model,
            &request.prompt,
            &request.parameters,
        )
    }

    pub fn invalidate_cache_key(&self, key: &str) -> bool {
        self.cache.invalidate(key)
    }

    /// Drop every cached response fingerprinted for `provider`.
    pub fn invalidate_provider_cache(&self, provider: &str) -> usize {
        let removed = self.cache.invalidate_provider(provider);
        log_info!(provider = %provider, removed = removed, "Provider cache invalidated");
        removed
    }

    /// Drop every cached response fingerprinted for `provider` and `model`.
    pub fn invalidate_model_cache(&self, provider: &str, model: &str) -> usize {
        let removed = self.cache.invalidate_model(provider, model);
        log_info!(
            provider = %provider,
            model = %model,
            removed = removed,
            "Model cache invalidated"
        );
        removed
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        log_info!("Response cache cleared");
    }

    /// Sweep expired cache entries. Returns how many were removed.
    pub fn cleanup_cache(&self) -> usize {
        self.cache.cleanup_expired()
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Dispatch a request. Always returns a response; branch on
    /// [`GenerationResponse::is_success`] and the error code.
    pub async fn execute(&self, request: GenerationRequest) -> GenerationResponse {
        self.execute_with_cancellation(request, CancellationToken::new())
            .await
    }

    /// Like [`execute`](Self::execute), but stops at the next attempt
    /// boundary once `cancel` fires. An in-flight adapter call is never
    /// interrupted; a backoff sleep is.
    pub async fn execute_with_cancellation(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> GenerationResponse {
        let span = request_span(&request);
        self.dispatch(request, cancel).instrument(span).await
    }

    async fn dispatch(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> GenerationResponse {
        let started = Instant::now();
        let cache_key = self.config.cache.enabled.then(|| self.cache_key(&request));

        if let Some(key) = cache_key.as_deref() {
            if let Some(mut cached) = self.cache.get(key) {
                self.metrics.record_cache_hit(&cached.provider);
                log_debug!(
                    cache_key = %key,
                    provider = %cached.provider,
                    "Serving response from cache"
                );
                cached.request_id = request.id.clone();
                cached.from_cache = true;
                return cached;
            }
            self.metrics.record_cache_miss();
        }

        let candidates = self.select_candidates(&request);

        if let Some(error) = self.validate(&request, candidates.first()) {
            return self.finish_failure(&request, None, error, started);
        }

        let mut last_failure: Option<(String, ErrorDetails)> = None;

        for (index, entry) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                break;
            }
            if !entry.circuit_allows(Instant::now()) {
                log_debug!(provider = %entry.name(), "Skipping provider with open circuit");
                continue;
            }
            if !entry.has_capacity() {
                log_debug!(
                    provider = %entry.name(),
                    in_flight = entry.current_concurrent(),
                    "Skipping provider at concurrency limit"
                );
                continue;
            }

            if index > 0 {
                self.metrics.record_fallback();
                log_info!(
                    provider = %entry.name(),
                    candidate_index = index,
                    "Falling back to next provider"
                );
            }

            match self.attempt_with_retries(entry, &request, &cancel).await {
                Ok(response) => {
                    return self.finish_served(
                        &request,
                        entry.name(),
                        response,
                        cache_key.as_deref(),
                        started,
                    );
                }
                Err(error) => {
                    let has_next = index + 1 < candidates.len();
                    let fall_back = has_next
                        && !cancel.is_cancelled()
                        && self.config.fallback.should_fallback(&error);

                    log_debug!(
                        provider = %entry.name(),
                        error_code = %error.code,
                        retryable = error.retryable,
                        fall_back = fall_back,
                        "Provider exhausted"
                    );

                    last_failure = Some((entry.name().to_string(), error));
                    if !fall_back {
                        break;
                    }
                }
            }
        }

        match last_failure {
            Some((provider, error)) => {
                self.finish_failure(&request, Some(provider.as_str()), error, started)
            }
            None if cancel.is_cancelled() => {
                let error = ErrorDetails::unknown("", "request cancelled before any attempt");
                self.finish_failure(&request, None, error, started)
            }
            None => {
                self.finish_failure(&request, None, ErrorDetails::no_available_providers(), started)
            }
        }
    }

    /// Candidates in dispatch order, restricted to registered, enabled providers.
    fn select_candidates(&self, request: &GenerationRequest) -> Vec<Arc<ProviderEntry>> {
        let providers = self.providers.read();
        let chain = &self.config.fallback;

        let names: Vec<&str> = if chain.is_active() {
            chain.ordered_from(&request.provider)
        } else {
            vec![request.provider.as_str()]
        };

        let mut seen = HashSet::new();
        names
            .into_iter()
            .filter(|name| seen.insert(*name))
            .filter_map(|name| providers.get(name))
            .filter(|entry| entry.is_enabled())
            .cloned()
            .collect()
    }

    /// Local checks, then the first candidate's capabilities and adapter
    /// validation. Failures here are caller errors.
    fn validate(
        &self,
        request: &GenerationRequest,
        first: Option<&Arc<ProviderEntry>>,
    ) -> Option<ErrorDetails> {
        if request.prompt.trim().is_empty() {
            return Some(ErrorDetails::invalid_request("prompt must not be empty"));
        }
        if request.timeout.is_some_and(|t| t.is_zero()) {
            return Some(ErrorDetails::invalid_request("timeout must be positive"));
        }

        let entry = first?;
        let routed = request.routed_to(entry.name());
        let adapter = entry.adapter();

        let checked = std::panic::catch_unwind(AssertUnwindSafe(|| {
            adapter
                .capabilities()
                .check(&routed)
                .or_else(|| adapter.validate_request(&routed))
        }));

        match checked {
            Ok(None) => None,
            Ok(Some(error)) => Some(error.for_provider(entry.name()).with_retryable(false)),
            Err(panic) => Some(ErrorDetails::unknown(
                entry.name(),
                format!("request validation panicked: {}", panic_message(panic.as_ref())),
            )),
        }
    }

    /// Retry loop against one candidate.
    async fn attempt_with_retries(
        &self,
        entry: &ProviderEntry,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationResponse, ErrorDetails> {
        let routed = request.routed_to(entry.name());
        let timeout = request.timeout.unwrap_or(self.config.default_request_timeout);
        let policy = &self.config.retry;
        let mut attempts_made: u32 = 0;

        loop {
            attempts_made += 1;
            log_debug!(
                provider = %entry.name(),
                attempt = attempts_made,
                max_attempts = policy.max_attempts,
                "Calling provider"
            );

            let error = match self.call_adapter(entry, &routed, timeout).await {
                Ok(response) => {
                    entry.record_success();
                    return Ok(response);
                }
                Err(error) => error,
            };

            entry.record_failure(Instant::now());

            if !policy.should_retry(&error, attempts_made) {
                return Err(error);
            }

            let delay = policy.wait_for(&error, attempts_made - 1);
            log_debug!(
                provider = %entry.name(),
                attempt = attempts_made,
                delay_ms = delay.as_millis() as u64,
                error_code = %error.code,
                "Provider call failed, retrying after delay"
            );

            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    log_debug!(provider = %entry.name(), "Request cancelled during backoff");
                    return Err(error);
                }
                _ = sleep(delay) => {}
            }

            self.metrics.record_retry();
        }
    }

    /// One adapter call under the in-flight guard, timeout and panic boundary.
    async fn call_adapter(
        &self,
        entry: &ProviderEntry,
        request: &GenerationRequest,
        timeout: Duration,
    ) -> Result<GenerationResponse, ErrorDetails> {
        let _in_flight = entry.enter();
        let call = AssertUnwindSafe(entry.adapter().execute(request)).catch_unwind();

        match tokio::time::timeout(timeout, call).await {
            Err(_elapsed) => Err(ErrorDetails::timeout(entry.name(), timeout.as_secs_f64())),
            Ok(Err(panic)) => Err(ErrorDetails::unknown(
                entry.name(),
                format!("adapter panicked: {}", panic_message(panic.as_ref())),
            )),
            Ok(Ok(Err(error))) => Err(error.for_provider(entry.name())),
            Ok(Ok(Ok(response))) => accept_response(entry.name(), response),
        }
    }

    fn finish_served(
        &self,
        request: &GenerationRequest,
        provider: &str,
        mut response: GenerationResponse,
        cache_key: Option<&str>,
        started: Instant,
    ) -> GenerationResponse {
        let elapsed_ms = elapsed_ms(started);
        response.provider = provider.to_string();
        if response.model.is_empty() {
            response.model = request.model.clone();
        }
        response.request_id = request.id.clone();
        response.processing_time_ms = elapsed_ms;
        response.from_cache = false;

        if response.is_success() {
            if let Some(key) = cache_key {
                self.cache
                    .set_for(&request.provider, &request.model, key, response.clone(), None);
            }
            self.metrics.record_success(provider, elapsed_ms);
            log_info!(
                provider = %provider,
                processing_time_ms = elapsed_ms,
                "Generation succeeded"
            );
        } else {
            self.metrics.record_processing(provider, elapsed_ms);
            log_info!(
                provider = %provider,
                processing_time_ms = elapsed_ms,
                "Generation accepted for asynchronous processing"
            );
        }

        response
    }

    fn finish_failure(
        &self,
        request: &GenerationRequest,
        provider: Option<&str>,
        error: ErrorDetails,
        started: Instant,
    ) -> GenerationResponse {
        let elapsed_ms = elapsed_ms(started);
        self.metrics.record_failure(provider, error.code, elapsed_ms);

        match error.severity() {
            ErrorSeverity::Critical | ErrorSeverity::Error => log_error!(
                provider = provider.unwrap_or("none"),
                error_code = %error.code,
                message = %error.message,
                "Generation failed"
            ),
            ErrorSeverity::Warning => log_warn!(
                provider = provider.unwrap_or("none"),
                error_code = %error.code,
                message = %error.message,
                "Generation failed"
            ),
            ErrorSeverity::Info => log_info!(
                provider = provider.unwrap_or("none"),
                error_code = %error.code,
                message = %error.message,
                "Generation rejected"
            ),
        }

        GenerationResponse::failure(
            provider.unwrap_or(&request.provider),
            request.model.clone(),
            error,
        )
        .with_request_id(request.id.clone())
        .with_processing_time_ms(elapsed_ms)
    }
}

/// Split an adapter's `Ok` response into served (success/processing) or failed.
///
/// A served response must carry a result; one without is a provider error.
fn accept_response(
    provider: &str,
    mut response: GenerationResponse,
) -> Result<GenerationResponse, ErrorDetails> {
    if let Some(error) = response.error.take() {
        return Err(error.for_provider(provider));
    }
    match response.status {
        ResponseStatus::Success | ResponseStatus::Processing if response.result.is_none() => {
            Err(ErrorDetails::provider_error(
                provider,
                "provider returned a success without a result",
            ))
        }
        ResponseStatus::Success | ResponseStatus::Processing => Ok(response),
        ResponseStatus::Failed => Err(ErrorDetails::provider_error(
            provider,
            "provider returned a failed response without error details",
        )),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
