//! Provider adapter boundary
//!
//! An adapter translates a [`GenerationRequest`] into one provider's wire
//! format and back. Adapters live outside this crate; the dispatcher only
//! sees this trait.

use crate::core_types::request::{GenerationRequest, MediaType};
use crate::core_types::response::GenerationResponse;
use crate::error::ErrorDetails;
use serde::{Deserialize, Serialize};

/// Result of one adapter call: a success/processing response or a failure.
pub type AdapterResult = std::result::Result<GenerationResponse, ErrorDetails>;

/// Static limits a provider advertises, consulted by request validation.
///
/// Empty lists and `None` limits mean "no restriction".
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// Largest `(width, height)` the provider renders
    pub max_resolution: Option<(u32, u32)>,
    /// Container/encoding formats, e.g. `"mp4"`, `"png"`
    #[serde(default)]
    pub supported_formats: Vec<String>,
    #[serde(default)]
    pub media_types: Vec<MediaType>,
    /// Longest clip in seconds
    pub max_duration: Option<f64>,
    #[serde(default)]
    pub supports_batch: bool,
    pub rate_limit_per_minute: Option<u32>,
    #[serde(default)]
    pub features: Vec<String>,
}

/// Trait every generation provider adapter implements.
///
/// `execute` must map transport and provider failures onto the fixed
/// [`ErrorCode`](crate::ErrorCode) taxonomy with a correct `retryable` flag.
/// Adapters should not retry internally; the dispatcher owns retry, timeout
/// and fallback.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Provider-specific request checks. Return a non-retryable error to reject.
    fn validate_request(&self, _request: &GenerationRequest) -> Option<ErrorDetails> {
        None
    }

    /// Perform the generation call.
    async fn execute(&self, request: &GenerationRequest) -> AdapterResult;

    /// Cheap liveness probe for operator health endpoints.
    async fn health_check(&self) -> bool;
}

impl Capabilities {
    /// Check a request against these limits. Returns the first violation as
    /// a non-retryable `INVALID_REQUEST`.
    pub fn check(&self, request: &GenerationRequest) -> Option<ErrorDetails> {
        if !self.media_types.is_empty() && !self.media_types.contains(&request.media_type) {
            return Some(ErrorDetails::invalid_request(format!(
                "media type '{}' is not supported",
                request.media_type
            )));
        }

        if let (Some(max), Some(duration)) = (self.max_duration, request.parameter_f64("duration")) {
            if duration > max {
                return Some(ErrorDetails::invalid_request(format!(
                    "duration {duration}s exceeds maximum of {max}s"
                )));
            }
        }

        if let Some((max_w, max_h)) = self.max_resolution {
            match requested_resolution(request) {
                Err(error) => return Some(error),
                Ok(Some((width, height))) if width > max_w || height > max_h => {
                    return Some(ErrorDetails::invalid_request(format!(
                        "resolution {width}x{height} exceeds maximum of {max_w}x{max_h}"
                    )));
                }
                Ok(_) => {}
            }
        }

        if !self.supported_formats.is_empty() {
            if let Some(format) = request.parameter_str("format") {
                let supported = self
                    .supported_formats
                    .iter()
                    .any(|f| f.eq_ignore_ascii_case(format));
                if !supported {
                    return Some(ErrorDetails::invalid_request(format!(
                        "format '{format}' is not supported"
                    )));
                }
            }
        }

        None
    }
}

/// `resolution: "WxH"`, or `width` and `height` given separately.
///
/// Present but malformed dimensions are an error rather than "unspecified".
fn requested_resolution(request: &GenerationRequest) -> Result<Option<(u32, u32)>, ErrorDetails> {
    if let Some(resolution) = request.parameter_str("resolution") {
        let parsed = resolution
            .trim()
            .split_once(|c: char| c.eq_ignore_ascii_case(&'x'))
            .and_then(|(w, h)| {
                let width = w.trim().parse::<u32>().ok()?;
                let height = h.trim().parse::<u32>().ok()?;
                Some((width, height))
            });
        return parsed.map(Some).ok_or_else(|| {
            ErrorDetails::invalid_request(format!(
                "resolution '{resolution}' is not of the form WxH"
            ))
        });
    }

    match (request.parameter_f64("width"), request.parameter_f64("height")) {
        (Some(width), Some(height)) => Ok(Some((
            pixel_count("width", width)?,
            pixel_count("height", height)?,
        ))),
        _ => Ok(None),
    }
}

fn pixel_count(name: &str, value: f64) -> Result<u32, ErrorDetails> {
    if value.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&value) {
        Ok(value as u32)
    } else {
        Err(ErrorDetails::invalid_request(format!(
            "{name} must be a non-negative whole number of pixels, got {value}"
        )))
    }
}
