//! Error types for office-relay
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

use crate::envelope::ErrorKey;

/// All error types that can occur in the relay
#[derive(Debug, Error)]
pub enum RelayError {
    /// Tool name not present in the registry
    #[error("Tool not found: {name}")]
    ToolNotFound {
        name: String,
        suggestion: Option<String>,
    },

    /// Name already registered and overwrite is not allowed
    #[error("Already registered: {0}")]
    Conflict(String),

    /// Tool name is empty, too long or has characters outside `[A-Za-z0-9_.-]`
    #[error("Invalid tool name: {0:?}")]
    InvalidToolName(String),

    /// Action name does not follow the `module.method` shape
    #[error("Invalid action name: {0:?}")]
    InvalidActionName(String),

    /// Office host could not be reached
    #[error(
        "Cannot reach the office host at {url}: {reason}. \
         Make sure the office application is running and the add-in is loaded."
    )]
    Connection { url: String, reason: String },

    /// Office host did not answer within the budget
    #[error("Request timed out after {elapsed_ms}ms (budget {budget_ms}ms)")]
    Timeout { elapsed_ms: u64, budget_ms: u64 },

    /// Response could not be decoded or broke the envelope contract
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Tool or action handler failed
    #[error("Handler error: {0}")]
    Handler(String),

    /// Configuration could not be loaded
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl RelayError {
    /// Envelope taxonomy entry this error is reported under
    pub fn error_key(&self) -> ErrorKey {
        match self {
            Self::ToolNotFound { .. } => ErrorKey::ToolNotFound,
            Self::InvalidActionName(_) => ErrorKey::ParamInvalid,
            Self::Connection { .. } => ErrorKey::ConnectionRefused,
            Self::Timeout { .. } => ErrorKey::Timeout,
            Self::Protocol(_) => ErrorKey::ProtocolError,
            Self::Conflict(_)
            | Self::InvalidToolName(_)
            | Self::Handler(_)
            | Self::Config(_)
            | Self::Io(_)
            | Self::Json(_) => ErrorKey::InternalError,
        }
    }

    /// Whether the office host itself is unreachable or slow
    pub fn is_relay_failure(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Result type alias for relay operations
pub type Result<T> = std::result::Result<T, RelayError>;
