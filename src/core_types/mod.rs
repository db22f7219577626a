//! Core types for unified multi-provider generation
//!
//! ## Organization
//! - `request` - The provider-agnostic request callers submit
//! - `response` - The response every dispatch returns
//! - `provider` - The adapter trait and provider capabilities

pub mod provider;
pub mod request;
pub mod response;

// Re-export commonly used types
pub use provider::{AdapterResult, Capabilities, ProviderAdapter};
pub use request::{GenerationRequest, MediaType, Parameters};
pub use response::{GenerationResponse, ResponseStatus, ResultPayload};

#[cfg(test)]
pub use provider::MockProviderAdapter;
