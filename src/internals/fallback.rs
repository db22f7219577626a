//! Fallback chain across providers
//!
//! Fallback is decided independently of `retryable`: an error that is
//! pointless to retry on one provider (e.g. insufficient credits) may still be
//! worth sending to the next one.

use crate::error::{ErrorCode, ErrorDetails};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Ordered provider list; position is priority.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackChain {
    pub providers: Vec<String>,
    pub enabled: bool,
    pub fallback_error_codes: HashSet<ErrorCode>,
}

impl Default for FallbackChain {
    fn default() -> Self {
        Self {
            providers: Vec::new(),
            enabled: true,
            fallback_error_codes: HashSet::from([
                ErrorCode::ProviderError,
                ErrorCode::Timeout,
                ErrorCode::RateLimitExceeded,
                ErrorCode::InsufficientCredits,
                ErrorCode::NetworkError,
            ]),
        }
    }
}

impl FallbackChain {
    pub fn new<I, S>(providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            providers: providers.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_error_codes<I>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = ErrorCode>,
    {
        self.fallback_error_codes = codes.into_iter().collect();
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// A chain only shapes candidate selection when enabled and non-empty.
    pub fn is_active(&self) -> bool {
        self.enabled && !self.providers.is_empty()
    }

    pub fn should_fallback(&self, error: &ErrorDetails) -> bool {
        self.enabled && self.fallback_error_codes.contains(&error.code)
    }

    /// Provider after `current`, or `None` when `current` is last or absent.
    pub fn next_provider(&self, current: &str) -> Option<&str> {
        let position = self.providers.iter().position(|p| p == current)?;
        self.providers.get(position + 1).map(String::as_str)
    }

    /// Chain order with `requested` moved to the front when it is a member.
    pub fn ordered_from<'a>(&'a self, requested: &'a str) -> Vec<&'a str> {
        let mut ordered = Vec::with_capacity(self.providers.len());
        if self.providers.iter().any(|p| p == requested) {
            ordered.push(requested);
        }
        ordered.extend(
            self.providers
                .iter()
                .map(String::as_str)
                .filter(|p| *p != requested),
        );
        ordered
    }
}
