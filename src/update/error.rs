//! Error types for the firmware update orchestrator.

use thiserror::Error;

/// Result type alias for update operations.
pub type UpdateResult<T> = Result<T, UpdateError>;

/// Broad failure classes reported to the operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection-level failure on any request.
    Transport,
    /// A response arrived but was not in the expected shape.
    Protocol,
    /// Free-text failure embedded in the device's flash log.
    DeviceReported,
    /// Rejected before any request was issued.
    UserInput,
}

/// Errors that can occur while uploading or flashing an image.
#[derive(Debug, Error)]
pub enum UpdateError {
    /// HTTP client error from reqwest.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Standard I/O error (reading the local image or the response stream).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Device answered with a non-success HTTP status.
    #[error("Device returned HTTP {status} for {endpoint}")]
    HttpStatus { status: u16, endpoint: String },

    /// Step response could not be parsed.
    #[error("Unexpected response from {endpoint}: {reason}")]
    Protocol { endpoint: String, reason: String },

    /// The device reported a failure in the flash log.
    #[error("{detail}")]
    DeviceReported { detail: String },

    /// Operator input was rejected.
    #[error("Invalid input: {reason}")]
    UserInput { reason: String },

    /// Another update session has not finished yet.
    #[error("An update is already in progress for {image}")]
    SessionActive { image: String },
}

impl UpdateError {
    /// Shorthand for a user input rejection.
    pub fn user_input(reason: impl Into<String>) -> Self {
        UpdateError::UserInput {
            reason: reason.into(),
        }
    }

    /// Classify this error into the operator-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpdateError::Http(_) | UpdateError::Io(_) | UpdateError::HttpStatus { .. } => {
                ErrorKind::Transport
            }
            UpdateError::Protocol { .. } => ErrorKind::Protocol,
            UpdateError::DeviceReported { .. } => ErrorKind::DeviceReported,
            UpdateError::UserInput { .. } | UpdateError::SessionActive { .. } => {
                ErrorKind::UserInput
            }
        }
    }

    /// Get a user-friendly error code for support purposes.
    pub fn error_code(&self) -> &'static str {
        match self {
            UpdateError::Http(_) => "UPD-001",
            UpdateError::Io(_) => "UPD-002",
            UpdateError::HttpStatus { .. } => "UPD-003",
            UpdateError::Protocol { .. } => "UPD-010",
            UpdateError::DeviceReported { .. } => "UPD-020",
            UpdateError::UserInput { .. } => "UPD-030",
            UpdateError::SessionActive { .. } => "UPD-031",
        }
    }
}
