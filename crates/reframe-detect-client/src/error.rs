//! Detection client error types.

use reframe_models::ErrorKind;
use thiserror::Error;

pub type DetectClientResult<T> = Result<T, DetectClientError>;

#[derive(Debug, Error)]
pub enum DetectClientError {
    #[error("Detection service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Frame encoding failed: {0}")]
    Encode(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DetectClientError {
    pub fn is_retryable(&self) -> bool {
        match self {
            DetectClientError::ServiceUnavailable(_) => true,
            DetectClientError::Network(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        ErrorKind::CollaboratorFailure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(DetectClientError::ServiceUnavailable("503".into()).is_retryable());
        assert!(!DetectClientError::InvalidResponse("bad".into()).is_retryable());
        assert!(!DetectClientError::Encode("empty".into()).is_retryable());
    }
}
