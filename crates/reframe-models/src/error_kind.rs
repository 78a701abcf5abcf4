//! Stable error classification shared by every response surface.

use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Error category reported alongside every failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Source path missing or unreadable by the decoder
    NotFound,
    /// Malformed request or unusable input data
    InvalidRequest,
    /// Detector, decoder or encoder failed
    CollaboratorFailure,
    /// Request aborted by the caller
    Cancelled,
    /// Request exceeded its deadline
    Timeout,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::CollaboratorFailure => "collaborator_failure",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
