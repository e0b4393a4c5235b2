//! Pipeline error types.

use vitrine_core::error::CoreError;
use vitrine_core::types::{JobId, OwnerId};
use vitrine_provider::ProviderError;
use vitrine_store::StoreError;

/// Errors returned from job submission.
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] CoreError),

    #[error("Owner not found: {0}")]
    OwnerNotFound(OwnerId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors returned from job cancellation.
#[derive(Debug, thiserror::Error)]
pub enum CancelError {
    #[error("Job not found: {0}")]
    NotFound(JobId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Why a unit did not produce an asset.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UnitError {
    #[error("{0}")]
    Provider(ProviderError),

    #[error("Asset storage failed: {0}")]
    Store(String),

    #[error("cancelled")]
    Cancelled,
}
