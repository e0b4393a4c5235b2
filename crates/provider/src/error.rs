/// Errors returned by a generation provider.
///
/// `Clone` so a single failure can be both recorded on the job and
/// reported to the caller.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Provider request timed out")]
    Timeout,

    #[error("Provider rejected the request: {0}")]
    Rejected(String),

    #[error("Invalid generation input: {0}")]
    InvalidInput(String),

    #[error("Provider error: {0}")]
    Unknown(String),
}

impl ProviderError {
    /// Whether retrying the same request can plausibly succeed.
    ///
    /// Invalid input is deterministic and never retried; everything
    /// else is treated as transient.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_not_retryable() {
        assert!(!ProviderError::InvalidInput("empty prompt".into()).is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ProviderError::Timeout.is_retryable());
        assert!(ProviderError::Rejected("overloaded".into()).is_retryable());
        assert!(ProviderError::Unknown("boom".into()).is_retryable());
    }
}
