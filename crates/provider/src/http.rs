//! HTTP generation provider.
//!
//! Speaks a small JSON-in, bytes-out protocol: `POST {base}/generate`
//! with the request body, response is the raw asset bytes with its
//! `Content-Type` header. Status codes map onto [`ProviderError`]
//! variants so the pipeline can decide what to retry.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use crate::error::ProviderError;
use crate::{GeneratedAsset, GenerationProvider, GenerationRequest};

const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(120);

/// [`GenerationProvider`] backed by a remote HTTP generation service.
pub struct HttpGenerationProvider {
    client: reqwest::Client,
    base_url: String,
}

impl HttpGenerationProvider {
    /// Connect to the service at `base_url` with the default
    /// per-attempt timeout.
    pub fn new(base_url: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(base_url, DEFAULT_ATTEMPT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::Unknown(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn error_for(status: StatusCode, response: reqwest::Response) -> ProviderError {
        let detail = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ProviderError::InvalidInput(detail)
            }
            s if s.is_client_error() => ProviderError::Rejected(format!("{s}: {detail}")),
            s => ProviderError::Unknown(format!("{s}: {detail}")),
        }
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationProvider {
    async fn generate(&self, request: GenerationRequest) -> Result<GeneratedAsset, ProviderError> {
        let url = format!("{}/generate", self.base_url);
        debug!(unit_kind = %request.unit_kind, url = %url, "Sending generation request");

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ProviderError::Timeout
                } else {
                    ProviderError::Unknown(format!("request failed: {e}"))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::error_for(status, response).await);
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_else(|| request.unit_kind.content_type())
            .to_string();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Unknown(format!("failed to read response body: {e}")))?;

        Ok(GeneratedAsset {
            bytes: bytes.to_vec(),
            content_type,
        })
    }
}
