//! Dispatcher configuration
//!
//! [`DispatcherConfig`] is built once at startup and never mutated. Runtime
//! state (circuit breakers, cache entries, counters) lives in the
//! [`Dispatcher`](crate::Dispatcher), not here.

use crate::error::{DispatchError, DispatchResult};
use crate::internals::cache::EvictionPolicy;
use crate::internals::fallback::FallbackChain;
use crate::internals::retry::{BackoffStrategy, RetryPolicy};
use crate::logging::log_debug;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Response cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    pub max_size: usize,
    /// TTL for entries stored without an explicit one
    pub default_ttl: Duration,
    pub eviction_policy: EvictionPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_size: 1000,
            default_ttl: Duration::from_secs(3600),
            eviction_policy: EvictionPolicy::Lru,
        }
    }
}

/// Circuit breaker settings applied to every registered provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures that open the circuit
    pub threshold: u32,
    /// Time since the last failure before an open circuit may close
    pub timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            threshold: 5,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Per-provider settings supplied at registration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Higher sorts first in provider listings. Dispatch order comes from
    /// the fallback chain, not from this value.
    pub priority: i32,
    /// Informational only: reported in listings, never consulted when
    /// selecting a provider
    pub weight: u32,
    pub enabled: bool,
    /// In-flight call cap; `None` is unlimited
    pub max_concurrent: Option<u32>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            priority: 0,
            weight: 1,
            enabled: true,
            max_concurrent: None,
        }
    }
}

impl ProviderSettings {
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_weight(mut self, weight: u32) -> Self {
        self.weight = weight;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: u32) -> Self {
        self.max_concurrent = Some(max_concurrent);
        self
    }
}

/// System-wide dispatcher configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    pub cache: CacheConfig,
    pub retry: RetryPolicy,
    pub fallback: FallbackChain,
    pub circuit_breaker: CircuitBreakerConfig,
    /// Timeout for requests that do not carry their own
    pub default_request_timeout: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            retry: RetryPolicy::default(),
            fallback: FallbackChain::default(),
            circuit_breaker: CircuitBreakerConfig::default(),
            default_request_timeout: Duration::from_secs(300),
        }
    }
}

impl DispatcherConfig {
    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] if:
    /// - `retry.max_attempts` is zero
    /// - `retry.backoff_multiplier` is below 1.0 or `retry.jitter` is outside `[0, 1]`
    /// - `retry.max_delay` is shorter than `retry.initial_delay`
    /// - the cache is enabled with `max_size == 0`
    /// - `circuit_breaker.threshold` is zero
    /// - `default_request_timeout` is zero
    pub fn validate(&self) -> DispatchResult<()> {
        if self.retry.max_attempts == 0 {
            return Err(DispatchError::configuration(
                "retry.max_attempts must be at least 1",
            ));
        }
        if !(self.retry.backoff_multiplier >= 1.0) {
            return Err(DispatchError::configuration(
                "retry.backoff_multiplier must be >= 1.0",
            ));
        }
        if self.retry.max_delay < self.retry.initial_delay {
            return Err(DispatchError::configuration(
                "retry.max_delay must not be shorter than retry.initial_delay",
            ));
        }
        if !(0.0..=1.0).contains(&self.retry.jitter) {
            return Err(DispatchError::configuration(
                "retry.jitter must be within [0, 1]",
            ));
        }
        if self.cache.enabled && self.cache.max_size == 0 {
            return Err(DispatchError::configuration(
                "cache.max_size must be positive when the cache is enabled",
            ));
        }
        if self.circuit_breaker.threshold == 0 {
            return Err(DispatchError::configuration(
                "circuit_breaker.threshold must be at least 1",
            ));
        }
        if self.default_request_timeout.is_zero() {
            return Err(DispatchError::configuration(
                "default_request_timeout must be positive",
            ));
        }
        Ok(())
    }

    /// Load configuration from `MULTI_GEN_*` environment variables on top of
    /// the defaults, then validate it.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Configuration`] if a variable is present but
    /// cannot be parsed, or if the resulting configuration fails
    /// [`validate`](Self::validate).
    pub fn from_env() -> DispatchResult<Self> {
        let mut config = Self::default();

        if let Some(enabled) = env_parse::<bool>("MULTI_GEN_CACHE_ENABLED")? {
            config.cache.enabled = enabled;
        }
        if let Some(max_size) = env_parse::<usize>("MULTI_GEN_CACHE_MAX_SIZE")? {
            config.cache.max_size = max_size;
        }
        if let Some(ttl) = env_parse::<u64>("MULTI_GEN_CACHE_TTL_SECS")? {
            config.cache.default_ttl = Duration::from_secs(ttl);
        }
        if let Some(policy) = env_var("MULTI_GEN_CACHE_POLICY") {
            config.cache.eviction_policy = EvictionPolicy::parse(&policy).ok_or_else(|| {
                DispatchError::configuration(format!(
                    "MULTI_GEN_CACHE_POLICY: unknown eviction policy '{policy}'"
                ))
            })?;
        }

        if let Some(attempts) = env_parse::<u32>("MULTI_GEN_RETRY_MAX_ATTEMPTS")? {
            config.retry.max_attempts = attempts;
        }
        if let Some(ms) = env_parse::<u64>("MULTI_GEN_RETRY_INITIAL_DELAY_MS")? {
            config.retry.initial_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env_parse::<u64>("MULTI_GEN_RETRY_MAX_DELAY_MS")? {
            config.retry.max_delay = Duration::from_millis(ms);
        }
        if let Some(strategy) = env_var("MULTI_GEN_RETRY_STRATEGY") {
            config.retry.strategy = BackoffStrategy::parse(&strategy).ok_or_else(|| {
                DispatchError::configuration(format!(
                    "MULTI_GEN_RETRY_STRATEGY: unknown strategy '{strategy}'"
                ))
            })?;
        }

        if let Some(providers) = env_var("MULTI_GEN_FALLBACK_PROVIDERS") {
            config.fallback.providers = providers
                .split(',')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string)
                .collect();
        }
        if let Some(enabled) = env_parse::<bool>("MULTI_GEN_FALLBACK_ENABLED")? {
            config.fallback.enabled = enabled;
        }

        if let Some(threshold) = env_parse::<u32>("MULTI_GEN_CIRCUIT_THRESHOLD")? {
            config.circuit_breaker.threshold = threshold;
        }
        if let Some(secs) = env_parse::<u64>("MULTI_GEN_CIRCUIT_TIMEOUT_SECS")? {
            config.circuit_breaker.timeout = Duration::from_secs(secs);
        }

        config.validate()?;

        log_debug!(
            cache_enabled = config.cache.enabled,
            cache_max_size = config.cache.max_size,
            cache_policy = ?config.cache.eviction_policy,
            retry_max_attempts = config.retry.max_attempts,
            retry_strategy = ?config.retry.strategy,
            fallback_providers = ?config.fallback.providers,
            circuit_threshold = config.circuit_breaker.threshold,
            "Dispatcher configuration loaded from environment"
        );

        Ok(config)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T: FromStr>(name: &str) -> DispatchResult<Option<T>> {
    let Some(raw) = env_var(name) else {
        return Ok(None);
    };
    raw.trim().parse::<T>().map(Some).map_err(|_| {
        DispatchError::configuration(format!("{name}: cannot parse value '{raw}'"))
    })
}
