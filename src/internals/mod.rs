//! Resilience building blocks used by the dispatcher
//!
//! Each piece is independent of the dispatch loop and testable on its own:
//! response cache, retry policy, fallback chain, circuit breaker and metrics.

pub mod cache;
pub mod circuit;
pub mod fallback;
pub mod metrics;
pub mod retry;
