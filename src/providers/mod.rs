//! Provider registration
//!
//! Adapters themselves live outside this crate. This module holds what the
//! dispatcher keeps per registered adapter:
//!
//! - **registry**: settings, circuit breaker and in-flight accounting

pub mod registry;

pub use registry::{InFlightGuard, ProviderEntry, ProviderInfo};
