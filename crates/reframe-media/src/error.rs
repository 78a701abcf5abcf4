//! Error types for media operations.

use std::path::PathBuf;

use reframe_models::ErrorKind;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during probing, planning and rendering.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message} (command: {command})")]
    FfmpegFailed {
        message: String,
        command: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message} (command: {command})")]
    FfprobeFailed {
        message: String,
        command: String,
        stderr: Option<String>,
    },

    #[error("Video not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Video cannot be opened: {0}")]
    InvalidVideo(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Trajectory is empty: {0}")]
    EmptyTrajectory(String),

    #[error("Detector '{detector}' failed at frame {frame}: {message}")]
    DetectionFailed {
        detector: String,
        frame: u64,
        message: String,
    },

    #[error("Frame decoding failed: {0}")]
    DecodeFailed(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        command: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            command: command.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a detection failure error.
    pub fn detection_failed(
        detector: impl Into<String>,
        frame: u64,
        message: impl Into<String>,
    ) -> Self {
        Self::DetectionFailed {
            detector: detector.into(),
            frame,
            message: message.into(),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest(message.into())
    }

    pub fn decode_failed(message: impl Into<String>) -> Self {
        Self::DecodeFailed(message.into())
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            MediaError::FileNotFound(_) | MediaError::InvalidVideo(_) => ErrorKind::NotFound,
            MediaError::InvalidRequest(_) | MediaError::EmptyTrajectory(_) => {
                ErrorKind::InvalidRequest
            }
            MediaError::Cancelled => ErrorKind::Cancelled,
            MediaError::Timeout(_) => ErrorKind::Timeout,
            _ => ErrorKind::CollaboratorFailure,
        }
    }

    /// Captured stderr for collaborator failures.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            MediaError::FfmpegFailed { stderr, .. } | MediaError::FfprobeFailed { stderr, .. } => {
                stderr.as_deref()
            }
            _ => None,
        }
    }
}
