//! Error types for generation dispatch.
//!
//! Two distinct kinds of failure exist in this crate:
//!
//! - [`ErrorDetails`] describes why a *generation* failed. It travels inside a
//!   [`GenerationResponse`](crate::GenerationResponse) and is what callers of
//!   [`Dispatcher::execute`](crate::Dispatcher::execute) branch on. Its
//!   [`ErrorCode`] is a closed taxonomy shared by every provider adapter.
//! - [`DispatchError`] describes an *operator* mistake: invalid configuration,
//!   registering the same provider twice, toggling a provider that does not
//!   exist. These are returned through [`DispatchResult`] and never reach the
//!   generation path.
//!
//! # Example
//!
//! ```rust
//! use multi_gen::{ErrorCode, ErrorDetails};
//!
//! let err = ErrorDetails::rate_limited("runway", "slow down").with_retry_after(30);
//! assert_eq!(err.code, ErrorCode::RateLimitExceeded);
//! assert!(err.retryable);
//! assert_eq!(err.retry_after_secs, Some(30));
//! ```

use crate::logging::{log_debug, log_error, log_warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Error categorization types
// ============================================================================

/// High-level categorization of error codes for routing and alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// The caller sent something no provider will accept.
    Client,

    /// A provider or the network misbehaved.
    External,

    /// Temporary failures that are expected to clear on their own.
    Transient,

    /// Something unexpected happened inside an adapter.
    Internal,
}

/// Severity level for logging and alerting decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    /// System is unusable or data integrity is at risk.
    Critical,

    /// Action failed but system is stable.
    Error,

    /// Unexpected but recoverable situation.
    Warning,

    /// Expected failure (e.g. a rejected prompt).
    Info,
}

// ============================================================================
// Error taxonomy
// ============================================================================

/// Closed set of failure codes every adapter maps its failures onto.
///
/// | Code | Category | Retryable by default |
/// |------|----------|----------------------|
/// | `INVALID_REQUEST` | Client | No |
/// | `AUTHENTICATION_FAILED` | Client | No |
/// | `RATE_LIMIT_EXCEEDED` | Transient | Yes |
/// | `PROVIDER_ERROR` | External | Yes |
/// | `TIMEOUT` | Transient | Yes |
/// | `INVALID_MODEL` | Client | No |
/// | `INSUFFICIENT_CREDITS` | External | No |
/// | `CONTENT_POLICY_VIOLATION` | Client | No |
/// | `NETWORK_ERROR` | Transient | Yes |
/// | `UNKNOWN_ERROR` | Internal | No |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    AuthenticationFailed,
    RateLimitExceeded,
    ProviderError,
    Timeout,
    InvalidModel,
    InsufficientCredits,
    ContentPolicyViolation,
    NetworkError,
    UnknownError,
}

impl ErrorCode {
    /// Every code in the taxonomy, in declaration order.
    pub const ALL: [ErrorCode; 10] = [
        ErrorCode::InvalidRequest,
        ErrorCode::AuthenticationFailed,
        ErrorCode::RateLimitExceeded,
        ErrorCode::ProviderError,
        ErrorCode::Timeout,
        ErrorCode::InvalidModel,
        ErrorCode::InsufficientCredits,
        ErrorCode::ContentPolicyViolation,
        ErrorCode::NetworkError,
        ErrorCode::UnknownError,
    ];

    /// Wire name of the code, e.g. `"RATE_LIMIT_EXCEEDED"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "INVALID_REQUEST",
            Self::AuthenticationFailed => "AUTHENTICATION_FAILED",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::ProviderError => "PROVIDER_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::InvalidModel => "INVALID_MODEL",
            Self::InsufficientCredits => "INSUFFICIENT_CREDITS",
            Self::ContentPolicyViolation => "CONTENT_POLICY_VIOLATION",
            Self::NetworkError => "NETWORK_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    /// Parse a wire name back into a code. Case-insensitive.
    pub fn parse(value: &str) -> Option<Self> {
        let upper = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|code| code.as_str() == upper)
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidRequest => ErrorCategory::Client,
            Self::AuthenticationFailed => ErrorCategory::Client,
            Self::RateLimitExceeded => ErrorCategory::Transient,
            Self::ProviderError => ErrorCategory::External,
            Self::Timeout => ErrorCategory::Transient,
            Self::InvalidModel => ErrorCategory::Client,
            Self::InsufficientCredits => ErrorCategory::External,
            Self::ContentPolicyViolation => ErrorCategory::Client,
            Self::NetworkError => ErrorCategory::Transient,
            Self::UnknownError => ErrorCategory::Internal,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidRequest => ErrorSeverity::Info,
            Self::AuthenticationFailed => ErrorSeverity::Error,
            Self::RateLimitExceeded => ErrorSeverity::Warning,
            Self::ProviderError => ErrorSeverity::Error,
            Self::Timeout => ErrorSeverity::Warning,
            Self::InvalidModel => ErrorSeverity::Error,
            Self::InsufficientCredits => ErrorSeverity::Error,
            Self::ContentPolicyViolation => ErrorSeverity::Info,
            Self::NetworkError => ErrorSeverity::Warning,
            Self::UnknownError => ErrorSeverity::Critical,
        }
    }

    /// Retryability an adapter should report when it has no better signal.
    ///
    /// The dispatcher never consults this; it trusts `ErrorDetails::retryable`.
    pub fn default_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimitExceeded | Self::ProviderError | Self::Timeout | Self::NetworkError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Structured generation failure
// ============================================================================

/// Why a generation failed.
///
/// Adapters must fill `retryable` correctly: the retry loop trusts it
/// verbatim. `retry_after_secs` is a provider-mandated minimum wait and always
/// wins over the computed backoff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    pub retryable: bool,
    /// Provider that reported the failure; empty for locally detected errors.
    #[serde(default)]
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_after_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub details: HashMap<String, serde_json::Value>,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.provider.is_empty() {
            write!(f, "{}: {}", self.code, self.message)
        } else {
            write!(f, "{} from {}: {}", self.code, self.provider, self.message)
        }
    }
}

impl std::error::Error for ErrorDetails {}

impl ErrorDetails {
    /// Build an error with the code's default retryability. Does not log.
    pub fn new(code: ErrorCode, provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            retryable: code.default_retryable(),
            provider: provider.into(),
            retry_after_secs: None,
            details: HashMap::new(),
        }
    }

    pub fn with_retryable(mut self, retryable: bool) -> Self {
        self.retryable = retryable;
        self
    }

    pub fn with_retry_after(mut self, seconds: u64) -> Self {
        self.retry_after_secs = Some(seconds);
        self
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.details.insert(key.into(), v);
        }
        self
    }

    /// Attribute the error to `provider` if the adapter left it blank.
    pub fn for_provider(mut self, provider: &str) -> Self {
        if self.provider.is_empty() {
            self.provider = provider.to_string();
        }
        self
    }

    pub fn category(&self) -> ErrorCategory {
        self.code.category()
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.code.severity()
    }

    // =========================================================================
    // Constructor methods with automatic logging
    // =========================================================================
    //
    // These methods log at the level matching the code's severity. Use them
    // from adapters instead of building the struct by hand.

    /// Locally detected malformed or unsupported request. Never retryable.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        let message = message.into();
        log_debug!(
            error_code = "INVALID_REQUEST",
            message = %message,
            "Generation request rejected by validation"
        );
        Self::new(ErrorCode::InvalidRequest, "", message).with_retryable(false)
    }

    pub fn authentication_failed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_code = "AUTHENTICATION_FAILED",
            provider = %provider,
            message = %message,
            "Provider authentication failed"
        );
        Self::new(ErrorCode::AuthenticationFailed, provider, message)
    }

    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_code = "RATE_LIMIT_EXCEEDED",
            provider = %provider,
            message = %message,
            "Provider rate limit exceeded"
        );
        Self::new(ErrorCode::RateLimitExceeded, provider, message)
    }

    pub fn provider_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_code = "PROVIDER_ERROR",
            provider = %provider,
            message = %message,
            "Provider reported a failure"
        );
        Self::new(ErrorCode::ProviderError, provider, message)
    }

    pub fn timeout(provider: impl Into<String>, timeout_seconds: f64) -> Self {
        let provider = provider.into();
        log_warn!(
            error_code = "TIMEOUT",
            provider = %provider,
            timeout_seconds = timeout_seconds,
            "Provider call timed out"
        );
        Self::new(
            ErrorCode::Timeout,
            provider,
            format!("request timed out after {timeout_seconds}s"),
        )
        .with_detail("timeout_seconds", timeout_seconds)
    }

    pub fn invalid_model(provider: impl Into<String>, model: impl Into<String>) -> Self {
        let provider = provider.into();
        let model = model.into();
        log_error!(
            error_code = "INVALID_MODEL",
            provider = %provider,
            model = %model,
            "Provider does not offer the requested model"
        );
        Self::new(
            ErrorCode::InvalidModel,
            provider,
            format!("unknown model: {model}"),
        )
    }

    pub fn insufficient_credits(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_code = "INSUFFICIENT_CREDITS",
            provider = %provider,
            message = %message,
            "Provider account is out of credits"
        );
        Self::new(ErrorCode::InsufficientCredits, provider, message)
    }

    pub fn content_policy_violation(
        provider: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_debug!(
            error_code = "CONTENT_POLICY_VIOLATION",
            provider = %provider,
            message = %message,
            "Provider rejected prompt content"
        );
        Self::new(ErrorCode::ContentPolicyViolation, provider, message)
    }

    pub fn network_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_warn!(
            error_code = "NETWORK_ERROR",
            provider = %provider,
            message = %message,
            "Network failure while calling provider"
        );
        Self::new(ErrorCode::NetworkError, provider, message)
    }

    /// Unexpected adapter failure, e.g. a panic caught at the dispatch boundary.
    pub fn unknown(provider: impl Into<String>, message: impl Into<String>) -> Self {
        let provider = provider.into();
        let message = message.into();
        log_error!(
            error_code = "UNKNOWN_ERROR",
            provider = %provider,
            message = %message,
            "Unexpected failure in provider adapter"
        );
        Self::new(ErrorCode::UnknownError, provider, message).with_retryable(false)
    }

    /// The failure returned when no candidate provider could even be attempted.
    pub fn no_available_providers() -> Self {
        log_warn!(
            error_code = "PROVIDER_ERROR",
            "No available providers for request"
        );
        Self::new(ErrorCode::ProviderError, "", "no available providers").with_retryable(false)
    }
}

// ============================================================================
// Operator-facing errors
// ============================================================================

/// Convenient result type for operator-facing dispatcher calls.
pub type DispatchResult<T> = std::result::Result<T, DispatchError>;

/// Errors from configuring or administering a [`Dispatcher`](crate::Dispatcher).
#[derive(Error, Debug)]
pub enum DispatchError {
    /// Configuration is invalid or could not be parsed.
    #[error("Dispatcher configuration error: {message}")]
    Configuration {
        /// Description of the configuration problem.
        message: String,
    },

    /// A provider with this name is already registered.
    #[error("Provider already registered: {provider}")]
    DuplicateProvider {
        /// The provider name that was registered twice.
        provider: String,
    },

    /// No provider with this name is registered.
    #[error("Provider not registered: {provider}")]
    UnknownProvider {
        /// The provider name that was requested.
        provider: String,
    },
}

impl DispatchError {
    pub fn configuration(message: impl Into<String>) -> Self {
        let message = message.into();
        log_error!(
            error_type = "configuration_error",
            message = %message,
            "Dispatcher configuration validation failed"
        );
        Self::Configuration { message }
    }

    pub fn duplicate_provider(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        log_warn!(
            provider = %provider,
            error_type = "duplicate_provider",
            "Provider registered twice"
        );
        Self::DuplicateProvider { provider }
    }

    pub fn unknown_provider(provider: impl Into<String>) -> Self {
        let provider = provider.into();
        log_warn!(
            provider = %provider,
            error_type = "unknown_provider",
            "Operation on unregistered provider"
        );
        Self::UnknownProvider { provider }
    }
}
