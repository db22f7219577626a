//! # multi-gen
//!
//! Resilient dispatch of generation requests across interchangeable image and
//! video generation providers.
//!
//! ## Key Features
//!
//! - **Unified Contract**: One request/response/error shape for every provider
//! - **Response Cache**: Fingerprinted, bounded, LRU/LFU/TTL eviction
//! - **Retry Policy**: Exponential, linear or fixed backoff honouring `retry_after`
//! - **Circuit Breaker**: Per-provider, lazily closing after a cooldown
//! - **Fallback Chain**: Hand failed requests to the next provider by error code
//! - **Metrics**: Counters and histograms for operator dashboards
//!
//! Provider adapters (the code that speaks a provider's wire format) live
//! outside this crate and plug in through [`ProviderAdapter`].
//!
//! ## Example
//!
//! ```rust,no_run
//! use multi_gen::{
//!     Dispatcher, DispatcherConfig, ErrorCode, FallbackChain, GenerationRequest,
//!     ProviderSettings,
//! };
//! # use std::sync::Arc;
//!
//! # async fn example(
//! #     runway: Arc<dyn multi_gen::ProviderAdapter>,
//! #     pika: Arc<dyn multi_gen::ProviderAdapter>,
//! # ) -> anyhow::Result<()> {
//! let config = DispatcherConfig {
//!     fallback: FallbackChain::new(["runway", "pika"])
//!         .with_error_codes([ErrorCode::Timeout, ErrorCode::InsufficientCredits]),
//!     ..DispatcherConfig::default()
//! };
//!
//! let dispatcher = Dispatcher::new(config)?;
//! dispatcher.register_provider("runway", runway, ProviderSettings::default().with_priority(2))?;
//! dispatcher.register_provider("pika", pika, ProviderSettings::default().with_priority(1))?;
//!
//! let request = GenerationRequest::new("runway", "gen-3", "a paper boat in the rain")
//!     .with_parameter("duration", 4);
//! let response = dispatcher.execute(request).await;
//! match response.error_code() {
//!     None => println!("served by {}", response.provider),
//!     Some(code) => println!("failed with {code}"),
//! }
//! # Ok(())
//! # }
//! ```

// Core types for the unified generation contract
pub mod core_types;

// Logging utilities (re-exports tracing with log_* naming) - internal only
pub(crate) mod logging;

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod internals;
pub mod providers;

#[cfg(test)]
pub mod tests;

// Re-export main types
pub use config::{CacheConfig, CircuitBreakerConfig, DispatcherConfig, ProviderSettings};
pub use dispatcher::Dispatcher;
pub use error::{
    DispatchError, DispatchResult, ErrorCategory, ErrorCode, ErrorDetails, ErrorSeverity,
};
pub use providers::ProviderInfo;

// Re-export core types (contract and adapter boundary)
pub use core_types::{
    AdapterResult, Capabilities, GenerationRequest, GenerationResponse, MediaType, Parameters,
    ProviderAdapter, ResponseStatus, ResultPayload,
};

// Re-export resilience building blocks
pub use internals::cache::{fingerprint, CacheEntry, CacheStats, EvictionPolicy, ResponseCache};
pub use internals::circuit::{CircuitBreaker, CircuitState};
pub use internals::fallback::FallbackChain;
pub use internals::metrics::{Metrics, MetricsSnapshot};
pub use internals::retry::{BackoffStrategy, RetryPolicy};

// Cancellation handle accepted by `Dispatcher::execute_with_cancellation`
pub use tokio_util::sync::CancellationToken;
