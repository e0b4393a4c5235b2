//! Single-unit execution: one generation attempt chain with retry,
//! per-attempt timeout, and cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use vitrine_core::retry::{jittered, RetryPolicy};
use vitrine_core::types::UnitKind;
use vitrine_provider::{GenerationProvider, GenerationRequest, ProviderError};
use vitrine_store::{AssetRef, AssetStore};

use crate::error::UnitError;

/// Everything needed to run one unit.
#[derive(Debug, Clone)]
pub struct UnitSpec {
    /// Stable slot index within the stage (0 for single-unit stages).
    pub slot: usize,
    /// Human-readable unit name, e.g. `screen_3`; used in failure
    /// records and logs.
    pub name: String,
    pub kind: UnitKind,
    pub request: GenerationRequest,
}

/// Final result of a unit after all attempts.
#[derive(Debug)]
pub struct UnitOutcome {
    pub slot: usize,
    pub name: String,
    pub kind: UnitKind,
    /// Provider calls actually issued.
    pub attempts: u32,
    pub result: Result<AssetRef, UnitError>,
}

/// Run one unit to completion: attempt, retry on transient failure
/// with jittered exponential backoff, stop early on cancellation or a
/// non-retryable error. The asset is stored before success is
/// reported, so a successful outcome always carries a fetchable
/// reference.
pub async fn run_unit(
    provider: Arc<dyn GenerationProvider>,
    assets: Arc<dyn AssetStore>,
    spec: UnitSpec,
    policy: RetryPolicy,
    attempt_timeout: Duration,
    cancel: CancellationToken,
) -> UnitOutcome {
    let mut attempts = 0;
    let result = loop {
        if cancel.is_cancelled() {
            break Err(UnitError::Cancelled);
        }
        attempts += 1;
        debug!(unit = %spec.name, attempt = attempts, "Starting generation attempt");

        let attempt = tokio::time::timeout(attempt_timeout, provider.generate(spec.request.clone()));
        let response = tokio::select! {
            _ = cancel.cancelled() => break Err(UnitError::Cancelled),
            r = attempt => r,
        };

        let error = match response {
            Ok(Ok(generated)) => {
                match assets.put(generated.bytes, &generated.content_type).await {
                    Ok(asset) => break Ok(asset),
                    Err(e) => break Err(UnitError::Store(e.to_string())),
                }
            }
            Ok(Err(e)) => e,
            Err(_) => ProviderError::Timeout,
        };

        if !error.is_retryable() || attempts >= policy.max_attempts() {
            break Err(UnitError::Provider(error));
        }

        let delay = jittered(policy.backoff_after(attempts));
        warn!(
            unit = %spec.name,
            attempt = attempts,
            error = %error,
            backoff_ms = delay.as_millis() as u64,
            "Generation attempt failed; retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => break Err(UnitError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
    };

    UnitOutcome {
        slot: spec.slot,
        name: spec.name,
        kind: spec.kind,
        attempts,
        result,
    }
}
