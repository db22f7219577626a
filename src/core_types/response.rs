//! Unified generation response

use crate::error::{ErrorCode, ErrorDetails};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Opaque provider payload (asset URLs, job ids, seeds, ...).
pub type ResultPayload = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseStatus {
    Success,
    Failed,
    /// Provider accepted an asynchronous job that has not finished yet
    Processing,
}

/// Outcome of a generation request.
///
/// A failed response carries `error` and no `result`; every other status
/// carries `result` and no `error`. Build responses through the
/// constructors to keep that invariant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// Id of the request this answers
    #[serde(default)]
    pub request_id: String,
    pub status: ResponseStatus,
    /// Provider that actually served the request
    pub provider: String,
    pub model: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetails>,
    #[serde(default)]
    pub processing_time_ms: u64,
    pub timestamp: DateTime<Utc>,
    /// Served from the response cache without contacting a provider
    #[serde(default)]
    pub from_cache: bool,
}

impl GenerationResponse {
    pub fn success(
        provider: impl Into<String>,
        model: impl Into<String>,
        result: ResultPayload,
    ) -> Self {
        Self::build(ResponseStatus::Success, provider, model, Some(result), None)
    }

    pub fn processing(
        provider: impl Into<String>,
        model: impl Into<String>,
        job: ResultPayload,
    ) -> Self {
        Self::build(ResponseStatus::Processing, provider, model, Some(job), None)
    }

    pub fn failure(
        provider: impl Into<String>,
        model: impl Into<String>,
        error: ErrorDetails,
    ) -> Self {
        Self::build(ResponseStatus::Failed, provider, model, None, Some(error))
    }

    fn build(
        status: ResponseStatus,
        provider: impl Into<String>,
        model: impl Into<String>,
        result: Option<ResultPayload>,
        error: Option<ErrorDetails>,
    ) -> Self {
        Self {
            request_id: String::new(),
            status,
            provider: provider.into(),
            model: model.into(),
            result,
            error,
            processing_time_ms: 0,
            timestamp: Utc::now(),
            from_cache: false,
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_processing_time_ms(mut self, processing_time_ms: u64) -> Self {
        self.processing_time_ms = processing_time_ms;
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == ResponseStatus::Success && self.error.is_none()
    }

    pub fn is_processing(&self) -> bool {
        self.status == ResponseStatus::Processing && self.error.is_none()
    }

    pub fn error_code(&self) -> Option<ErrorCode> {
        self.error.as_ref().map(|e| e.code)
    }
}
