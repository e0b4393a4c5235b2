//! Generation provider interface.
//!
//! A [`GenerationProvider`] turns a single-unit request (one concept
//! text, one icon, one screen image, one cover variant, one cover
//! video) into bytes. The pipeline owns retries, timeouts, and fan-out;
//! providers perform exactly one attempt per call.

pub mod error;
pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use vitrine_core::types::UnitKind;

pub use error::ProviderError;
pub use http::HttpGenerationProvider;

/// One generation attempt for one unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub unit_kind: UnitKind,
    pub prompt: String,
    /// URLs of previously generated assets the provider may condition
    /// on (e.g. the cover image when rendering the cover video).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_urls: Vec<String>,
}

impl GenerationRequest {
    pub fn new(unit_kind: UnitKind, prompt: impl Into<String>) -> Self {
        Self {
            unit_kind,
            prompt: prompt.into(),
            reference_urls: Vec::new(),
        }
    }

    pub fn with_references(mut self, urls: Vec<String>) -> Self {
        self.reference_urls = urls;
        self
    }
}

/// Result of a successful generation attempt.
#[derive(Debug, Clone)]
pub struct GeneratedAsset {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

/// Backend capable of producing content for a single unit.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Perform one generation attempt. No internal retries.
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAsset, ProviderError>;
}
