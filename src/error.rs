//! Error types for kalam-bind.
//!
//! Two layers:
//!
//! - [`OperationError`] is what a network-backed operation resolves with when it
//!   fails. It carries a closed [`ErrorKind`] so UI code can branch on the kind
//!   instead of matching on message text.
//! - [`KalamBindError`] covers crate-level failures (configuration, option
//!   parsing) and wraps an [`OperationError`] when one escapes a binding call.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type for crate-level operations
pub type Result<T> = std::result::Result<T, KalamBindError>;

/// Result type of a single transport call or tracked operation
pub type OperationResult<T> = std::result::Result<T, OperationError>;

/// Closed classification of operation failures surfaced to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Authentication rejected (wrong password or unknown account)
    InvalidCredentials,
    /// Request failed validation before reaching the remote service
    MalformedRequest,
    /// Resource already exists (e.g. account name already registered)
    Conflict,
    /// Anything the transport could not classify
    Unknown,
}

impl ErrorKind {
    /// Classify an HTTP-style status code.
    ///
    /// Provided for transport implementations that talk to an HTTP endpoint:
    /// - 400, 422 → `MalformedRequest`
    /// - 401, 403 → `InvalidCredentials`
    /// - 409 → `Conflict`
    /// - everything else → `Unknown`
    pub fn from_status(status: u16) -> Self {
        match status {
            400 | 422 => Self::MalformedRequest,
            401 | 403 => Self::InvalidCredentials,
            409 => Self::Conflict,
            _ => Self::Unknown,
        }
    }

    /// Stable string form, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::MalformedRequest => "malformed_request",
            Self::Conflict => "conflict",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of a single asynchronous operation (auth call or subscription flush).
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("{kind}: {message}")]
pub struct OperationError {
    /// Machine-readable classification
    pub kind: ErrorKind,
    /// Human-readable text, usually provided by the transport
    pub message: String,
}

impl OperationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn invalid_credentials(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidCredentials, message)
    }

    pub fn malformed_request(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedRequest, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn unknown(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unknown, message)
    }

    /// Build an error from an HTTP-style status code and response text.
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::from_status(status), message)
    }
}

/// Crate-level errors.
#[derive(Error, Debug)]
pub enum KalamBindError {
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Operation failed: {0}")]
    OperationFailed(#[from] OperationError),
}

impl From<serde_json::Error> for KalamBindError {
    fn from(err: serde_json::Error) -> Self {
        KalamBindError::SerializationError(err.to_string())
    }
}
