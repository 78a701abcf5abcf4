//! Worker error types.

use reframe_detect_client::DetectClientError;
use reframe_media::MediaError;
use reframe_models::{ErrorKind, RequestError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Worker is shutting down")]
    ShuttingDown,

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Detection service error: {0}")]
    DetectClient(#[from] DetectClientError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Stable classification reported to callers.
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkerError::InvalidRequest(e) => e.kind(),
            WorkerError::Media(e) => e.kind(),
            WorkerError::DetectClient(e) => e.kind(),
            WorkerError::Timeout(_) => ErrorKind::Timeout,
            WorkerError::ShuttingDown => ErrorKind::Cancelled,
            WorkerError::ConfigError(_) | WorkerError::Io(_) => ErrorKind::CollaboratorFailure,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_kinds() {
        assert_eq!(
            WorkerError::from(RequestError::invalid("bad")).kind(),
            ErrorKind::InvalidRequest
        );
        assert_eq!(
            WorkerError::from(MediaError::FileNotFound(PathBuf::from("/x.mp4"))).kind(),
            ErrorKind::NotFound
        );
        assert_eq!(
            WorkerError::from(MediaError::Cancelled).kind(),
            ErrorKind::Cancelled
        );
        assert_eq!(WorkerError::Timeout(5).kind(), ErrorKind::Timeout);
        assert_eq!(
            WorkerError::from(DetectClientError::RequestFailed("500".into())).kind(),
            ErrorKind::CollaboratorFailure
        );
    }
}
