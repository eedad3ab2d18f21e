use thiserror::Error;

/// Errors returned by notification transports.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// An HTTP-level transport error occurred.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The remote endpoint returned a non-success status code.
    #[error("unexpected status {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    /// Slack answered `ok: false`.
    #[error("Slack API error: {0}")]
    Api(String),

    /// The remote endpoint answered HTTP 429.
    #[error("rate limited by remote endpoint")]
    RateLimited,

    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl NotifyError {
    /// Whether a later attempt might succeed.
    ///
    /// Informational only: step retries are governed by the step's failure
    /// policy, not by this flag.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) | Self::RateLimited => true,
            Self::UnexpectedStatus { status, .. } => *status >= 500,
            Self::Api(_) | Self::InvalidPayload(_) | Self::Configuration(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_is_retryable() {
        assert!(NotifyError::RateLimited.is_retryable());
    }

    #[test]
    fn server_errors_are_retryable() {
        let err = NotifyError::UnexpectedStatus {
            status: 502,
            body: "bad gateway".into(),
        };
        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "unexpected status 502: bad gateway");
    }

    #[test]
    fn client_errors_are_not_retryable() {
        let err = NotifyError::UnexpectedStatus {
            status: 400,
            body: "bad request".into(),
        };
        assert!(!err.is_retryable());
        assert!(!NotifyError::Api("invalid_auth".into()).is_retryable());
        assert!(!NotifyError::Configuration("no token".into()).is_retryable());
    }
}
