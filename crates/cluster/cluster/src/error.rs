use thiserror::Error;

/// Errors returned by cluster control-plane operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClusterError {
    /// The addressed resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The operation is not supported for this resource kind or backend.
    #[error("unsupported: {0}")]
    Unsupported(String),

    /// The control plane rejected the request.
    #[error("api error ({code}): {message}")]
    Api { code: u16, message: String },

    /// The control plane could not be reached.
    #[error("connection error: {0}")]
    Connection(String),

    /// The operation did not complete in time.
    #[error("operation timed out")]
    Timeout,
}

impl ClusterError {
    /// Whether retrying the same call could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout => true,
            Self::Api { code, .. } => *code == 429 || *code >= 500,
            Self::NotFound(_) | Self::Unsupported(_) => false,
        }
    }
}
