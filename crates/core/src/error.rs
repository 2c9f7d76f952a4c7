//! Error types for Workbench.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using Workbench's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error type for Workbench.
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Caller Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    // =========================================================================
    // Execution Errors (Command Runner / Tool handlers)
    // =========================================================================
    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Command timed out after {0}ms")]
    Timeout(u64),

    #[error("Command output exceeded {0} bytes")]
    OutputLimitExceeded(usize),

    // =========================================================================
    // Model Gateway Errors
    // =========================================================================
    #[error("Provider error: {0}")]
    Provider(String),

    // =========================================================================
    // Generic Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Coarse error category reported to callers alongside the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    AccessDenied,
    Execution,
    Provider,
    NotFound,
    Conflict,
    Internal,
}

impl Error {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an access denied error.
    pub fn access_denied(msg: impl Into<String>) -> Self {
        Self::AccessDenied(msg.into())
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a tool not found error.
    pub fn tool_not_found(name: impl AsRef<str>) -> Self {
        Self::NotFound(format!("tool '{}'", name.as_ref()))
    }

    /// Create an already-exists error.
    pub fn already_exists(what: impl Into<String>) -> Self {
        Self::AlreadyExists(what.into())
    }

    /// Create an execution error.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Create a provider error.
    pub fn provider(msg: impl Into<String>) -> Self {
        Self::Provider(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::AccessDenied(_) => ErrorKind::AccessDenied,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::AlreadyExists(_) => ErrorKind::Conflict,
            Self::Execution(_) | Self::Timeout(_) | Self::OutputLimitExceeded(_) => {
                ErrorKind::Execution
            }
            Self::Provider(_) => ErrorKind::Provider,
            Self::Config(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Internal(_)
            | Self::Other(_) => ErrorKind::Internal,
        }
    }

    /// Message safe to hand to the calling layer.
    ///
    /// Internal failures are reported without detail; everything else is
    /// reported verbatim.
    pub fn public_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => "internal error".to_string(),
            _ => self.to_string(),
        }
    }
}
