// ============================================================================
// Unit Tests for the Generation Error Taxonomy
//
// UNIT UNDER TEST: ErrorCode, ErrorDetails, DispatchError
//
// BUSINESS RESPONSIBILITY:
//   - Provides a closed failure taxonomy every provider adapter maps onto
//   - Categorizes codes for alerting and decides default retryability
//   - Carries provider-mandated retry-after hints through the dispatcher
//   - Separates operator mistakes (DispatchError) from generation failures
//
// TEST COVERAGE:
//   - Wire names and parsing of every code
//   - Category, severity and default retryability mapping
//   - Constructor defaults (validation errors are never retryable)
//   - Builder methods and provider attribution
// ============================================================================

use crate::error::{DispatchError, ErrorCategory, ErrorCode, ErrorDetails, ErrorSeverity};

#[cfg(test)]
mod error_code_tests {
    use super::*;

    #[test]
    fn test_every_code_round_trips_through_its_wire_name() {
        for code in ErrorCode::ALL {
            assert_eq!(
                ErrorCode::parse(code.as_str()),
                Some(code),
                "{code} should parse back from its wire name"
            );
        }
        assert_eq!(ErrorCode::parse("timeout"), Some(ErrorCode::Timeout));
        assert_eq!(ErrorCode::parse("NOT_A_CODE"), None);
    }

    #[test]
    fn test_serde_uses_screaming_snake_case() {
        // Arrange
        let code = ErrorCode::InsufficientCredits;

        // Act
        let json = serde_json::to_string(&code).unwrap();
        let back: ErrorCode = serde_json::from_str("\"CONTENT_POLICY_VIOLATION\"").unwrap();

        // Assert
        assert_eq!(json, "\"INSUFFICIENT_CREDITS\"");
        assert_eq!(back, ErrorCode::ContentPolicyViolation);
    }

    #[test]
    fn test_transient_codes_are_retryable_by_default() {
        let retryable: Vec<ErrorCode> = ErrorCode::ALL
            .into_iter()
            .filter(ErrorCode::default_retryable)
            .collect();

        assert_eq!(
            retryable,
            vec![
                ErrorCode::RateLimitExceeded,
                ErrorCode::ProviderError,
                ErrorCode::Timeout,
                ErrorCode::NetworkError,
            ],
            "Only transient and provider-side failures should default to retryable"
        );
    }

    #[test]
    fn test_categories_drive_alerting() {
        assert_eq!(ErrorCode::InvalidRequest.category(), ErrorCategory::Client);
        assert_eq!(ErrorCode::Timeout.category(), ErrorCategory::Transient);
        assert_eq!(ErrorCode::ProviderError.category(), ErrorCategory::External);
        assert_eq!(ErrorCode::UnknownError.category(), ErrorCategory::Internal);
        assert_eq!(ErrorCode::UnknownError.severity(), ErrorSeverity::Critical);
        assert_eq!(ErrorCode::InvalidRequest.severity(), ErrorSeverity::Info);
    }
}

#[cfg(test)]
mod error_details_tests {
    use super::*;

    #[test]
    fn test_invalid_request_is_never_retryable() {
        // Act
        let error = ErrorDetails::invalid_request("prompt must not be empty");

        // Assert
        assert_eq!(error.code, ErrorCode::InvalidRequest);
        assert!(!error.retryable, "Validation errors must never be retried");
        assert!(error.provider.is_empty(), "Locally detected errors have no provider");
    }

    #[test]
    fn test_insufficient_credits_is_not_retryable() {
        let error = ErrorDetails::insufficient_credits("runway", "balance is 0");

        assert!(!error.retryable);
        assert_eq!(error.provider, "runway");
    }

    #[test]
    fn test_unknown_error_is_not_retryable_even_though_adapters_may_say_so() {
        let error = ErrorDetails::unknown("pika", "adapter panicked");

        assert_eq!(error.code, ErrorCode::UnknownError);
        assert!(!error.retryable);
    }

    #[test]
    fn test_rate_limit_carries_retry_after_hint() {
        // Act
        let error = ErrorDetails::rate_limited("runway", "429").with_retry_after(12);

        // Assert
        assert!(error.retryable);
        assert_eq!(error.retry_after_secs, Some(12));
    }

    #[test]
    fn test_timeout_records_the_limit_in_details() {
        let error = ErrorDetails::timeout("luma", 2.5);

        assert_eq!(error.code, ErrorCode::Timeout);
        assert_eq!(error.details.get("timeout_seconds"), Some(&serde_json::json!(2.5)));
        assert!(error.message.contains("2.5"));
    }

    #[test]
    fn test_for_provider_only_fills_blank_attribution() {
        let blank = ErrorDetails::new(ErrorCode::NetworkError, "", "reset by peer");
        let owned = ErrorDetails::new(ErrorCode::NetworkError, "pika", "reset by peer");

        assert_eq!(blank.for_provider("runway").provider, "runway");
        assert_eq!(owned.for_provider("runway").provider, "pika");
    }

    #[test]
    fn test_display_includes_code_and_provider() {
        let error = ErrorDetails::new(ErrorCode::ProviderError, "runway", "503");

        assert_eq!(error.to_string(), "PROVIDER_ERROR from runway: 503");
        assert_eq!(
            ErrorDetails::no_available_providers().to_string(),
            "PROVIDER_ERROR: no available providers"
        );
    }
}

#[cfg(test)]
mod dispatch_error_tests {
    use super::*;

    #[test]
    fn test_operator_errors_render_context() {
        assert_eq!(
            DispatchError::duplicate_provider("runway").to_string(),
            "Provider already registered: runway"
        );
        assert_eq!(
            DispatchError::unknown_provider("kling").to_string(),
            "Provider not registered: kling"
        );
        assert!(DispatchError::configuration("bad")
            .to_string()
            .contains("bad"));
    }
}
