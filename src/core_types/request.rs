//! Unified generation request
//!
//! One request describes one logical generation. The dispatcher may hand it
//! to several providers (retries, fallback) but the `id` never changes, so
//! callers can correlate every attempt to the request they submitted.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Provider parameters, used verbatim for cache fingerprinting.
///
/// Insertion order is irrelevant: the fingerprint sorts keys before hashing.
pub type Parameters = HashMap<String, serde_json::Value>;

/// Kind of media a request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    #[default]
    Video,
    Audio,
    Text,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Audio => "audio",
            MediaType::Text => "text",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A provider-agnostic generation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Stable across retries and fallbacks
    pub id: String,
    /// Preferred provider; rewritten by the dispatcher on fallback
    pub provider: String,
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub media_type: MediaType,
    #[serde(default)]
    pub parameters: Parameters,
    /// Per-call timeout; `None` uses the dispatcher's configured default
    #[serde(default)]
    pub timeout: Option<Duration>,
    /// Opaque caller data, not part of the fingerprint
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl GenerationRequest {
    /// Create a request with a freshly generated id.
    pub fn new(
        provider: impl Into<String>,
        model: impl Into<String>,
        prompt: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            provider: provider.into(),
            model: model.into(),
            prompt: prompt.into(),
            media_type: MediaType::default(),
            parameters: Parameters::new(),
            timeout: None,
            metadata: HashMap::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_media_type(mut self, media_type: MediaType) -> Self {
        self.media_type = media_type;
        self
    }

    /// Add a single parameter. Values that fail to serialize are dropped.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.parameters.insert(key.into(), v);
        }
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters.extend(parameters);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        if let Ok(v) = serde_json::to_value(value) {
            self.metadata.insert(key.into(), v);
        }
        self
    }

    /// Copy of this request addressed to another provider, same id.
    pub(crate) fn routed_to(&self, provider: &str) -> Self {
        let mut routed = self.clone();
        routed.provider = provider.to_string();
        routed
    }

    /// Numeric parameter, accepting both JSON numbers and numeric strings.
    pub fn parameter_f64(&self, key: &str) -> Option<f64> {
        match self.parameters.get(key)? {
            serde_json::Value::Number(n) => n.as_f64(),
            serde_json::Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn parameter_str(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).and_then(|v| v.as_str())
    }
}
