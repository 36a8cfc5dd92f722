//! Error taxonomy shared by both sides of the relay
//!
//! Every failure that reaches an agent is reported under one of these keys,
//! whether it was raised by the registry, the relay client or the office host.

use serde::{Deserialize, Serialize};

/// Broad class of an error, serialized as the envelope's `error.type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Caller supplied insufficient or malformed arguments
    Validation,
    /// Requested tool or action is unknown
    NotFound,
    /// Office host state does not meet the operation's precondition
    Business,
    /// Office host is unreachable or slow
    Connection,
    /// Unexpected failure inside a handler or the relay itself
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::NotFound => "not_found",
            Self::Business => "business",
            Self::Connection => "connection",
            Self::Internal => "internal",
        }
    }
}

/// Known error keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKey {
    ParamMissing,
    ParamInvalid,
    ActionNotFound,
    ToolNotFound,
    DocumentNotFound,
    OperationFailed,
    ConnectionRefused,
    Timeout,
    ProtocolError,
    InternalError,
}

impl ErrorKey {
    pub const ALL: [ErrorKey; 10] = [
        Self::ParamMissing,
        Self::ParamInvalid,
        Self::ActionNotFound,
        Self::ToolNotFound,
        Self::DocumentNotFound,
        Self::OperationFailed,
        Self::ConnectionRefused,
        Self::Timeout,
        Self::ProtocolError,
        Self::InternalError,
    ];

    /// Wire code, e.g. `PARAM_MISSING`
    pub fn code(&self) -> &'static str {
        match self {
            Self::ParamMissing => "PARAM_MISSING",
            Self::ParamInvalid => "PARAM_INVALID",
            Self::ActionNotFound => "ACTION_NOT_FOUND",
            Self::ToolNotFound => "TOOL_NOT_FOUND",
            Self::DocumentNotFound => "DOCUMENT_NOT_FOUND",
            Self::OperationFailed => "OPERATION_FAILED",
            Self::ConnectionRefused => "CONNECTION_REFUSED",
            Self::Timeout => "TIMEOUT",
            Self::ProtocolError => "PROTOCOL_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ParamMissing | Self::ParamInvalid => ErrorKind::Validation,
            Self::ActionNotFound | Self::ToolNotFound => ErrorKind::NotFound,
            Self::DocumentNotFound | Self::OperationFailed => ErrorKind::Business,
            Self::ConnectionRefused | Self::Timeout => ErrorKind::Connection,
            Self::ProtocolError | Self::InternalError => ErrorKind::Internal,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            Self::ParamMissing => "A required parameter is missing",
            Self::ParamInvalid => "A parameter has an invalid value",
            Self::ActionNotFound => "The requested action is not registered",
            Self::ToolNotFound => "The requested tool is not registered",
            Self::DocumentNotFound => "No document is open in the office host",
            Self::OperationFailed => "The office host could not complete the operation",
            Self::ConnectionRefused => "The office host is not reachable",
            Self::Timeout => "The office host did not respond in time",
            Self::ProtocolError => "The office host sent a response that could not be understood",
            Self::InternalError => "An internal error occurred",
        }
    }

    pub fn default_suggestion(&self) -> Option<&'static str> {
        match self {
            Self::ParamMissing | Self::ParamInvalid => {
                Some("Check the tool's input schema and retry with corrected arguments")
            }
            Self::ActionNotFound => Some("Call listActions to see the registered actions"),
            Self::ToolNotFound => Some("Call tools/list to see the available tools"),
            Self::DocumentNotFound => Some("Open a document in the office application first"),
            Self::ConnectionRefused | Self::Timeout => {
                Some("Make sure the office application is running and the add-in is loaded")
            }
            Self::OperationFailed | Self::ProtocolError | Self::InternalError => None,
        }
    }

    /// Look up a key from its wire code
    pub fn from_code(code: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|k| k.code() == code)
    }
}

impl std::fmt::Display for ErrorKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
