use vitrine_core::types::JobId;

/// Errors surfaced by the storage layer.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    JobNotFound(JobId),

    #[error("Job already exists: {0}")]
    DuplicateJob(JobId),

    #[error("Job {0} is terminal and its record is immutable")]
    TerminalJob(JobId),

    #[error("Invalid patch: {0}")]
    InvalidPatch(String),

    #[error("Storage error: {0}")]
    Internal(String),
}
