//! Logging utilities for multi-gen
//!
//! Re-exports tracing macros with log_* naming convention for consistency,
//! plus the span every dispatch runs inside.

use crate::core_types::GenerationRequest;

// Re-export tracing macros with log_* naming
#[allow(unused_imports)]
pub use tracing::{
    debug as log_debug,
    error as log_error,
    info as log_info,
    trace as log_trace,
    warn as log_warn,
};

/// Span covering one `Dispatcher::execute` call.
///
/// Every attempt, retry and fallback log line emitted while the request is in
/// flight inherits `request_id` and `requested_provider` from this span.
pub(crate) fn request_span(request: &GenerationRequest) -> tracing::Span {
    tracing::info_span!(
        "dispatch",
        request_id = %request.id,
        requested_provider = %request.provider,
        model = %request.model,
        media_type = ?request.media_type,
    )
}
