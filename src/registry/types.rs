//! Tool call request/result types
//!
//! Results always carry `content`; `error` is present exactly when the call failed.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::envelope::{Envelope, EnvelopeError, ErrorKey};
use crate::id::generate_request_id;

/// A single tool invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation id, agent-supplied or generated
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

impl ToolCallRequest {
    /// Create a request with a generated correlation id
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self::with_id(generate_request_id(), name, arguments)
    }

    /// Create a request with an explicit correlation id
    pub fn with_id(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

/// One piece of result content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentItem {
    Text { text: String },
    Json { data: Value },
}

impl ContentItem {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn json(data: Value) -> Self {
        Self::Json { data }
    }

    /// Render as plain text for transports that only carry text
    pub fn to_text(&self) -> String {
        match self {
            Self::Text { text } => text.clone(),
            Self::Json { data } => serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string()),
        }
    }
}

/// Outcome of a tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallResult {
    pub id: String,
    pub success: bool,
    #[serde(default)]
    pub content: Vec<ContentItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolCallResult {
    pub fn success(id: impl Into<String>, content: Vec<ContentItem>) -> Self {
        Self {
            id: id.into(),
            success: true,
            content,
            error: None,
        }
    }

    pub fn failure(id: impl Into<String>, error: impl Into<String>, content: Vec<ContentItem>) -> Self {
        Self {
            id: id.into(),
            success: false,
            content,
            error: Some(error.into()),
        }
    }

    /// Success with a single text item
    pub fn text(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self::success(id, vec![ContentItem::text(text)])
    }

    /// Success with a single json item
    pub fn json(id: impl Into<String>, data: Value) -> Self {
        Self::success(id, vec![ContentItem::json(data)])
    }

    /// Re-wrap an envelope
    ///
    /// Success data becomes the content (strings as text, everything else as
    /// json). A failed envelope keeps its whole error object as json content
    /// and summarises it in `error`.
    pub fn from_envelope(id: impl Into<String>, envelope: Envelope) -> Self {
        match envelope.into_result() {
            Ok(Value::String(text)) => Self::text(id, text),
            Ok(data) => Self::json(id, data),
            Err(error) => Self::from_error(id, &error),
        }
    }

    /// Failure built from an envelope error object
    pub fn from_error(id: impl Into<String>, error: &EnvelopeError) -> Self {
        let content = serde_json::to_value(error)
            .map(|v| vec![ContentItem::json(json!({ "error": v }))])
            .unwrap_or_default();
        Self::failure(id, describe(error), content)
    }

    /// Error code, when the failure came from an envelope
    pub fn error_code(&self) -> Option<String> {
        self.content.iter().find_map(|item| match item {
            ContentItem::Json { data } => data["error"]["code"].as_str().map(String::from),
            ContentItem::Text { .. } => None,
        })
    }

    pub fn is_validation_failure(&self) -> bool {
        matches!(
            self.error_code().as_deref().and_then(ErrorKey::from_code),
            Some(ErrorKey::ParamMissing | ErrorKey::ParamInvalid)
        )
    }
}

/// `[CODE] message: raw detail (suggestion)`
fn describe(error: &EnvelopeError) -> String {
    let mut text = error.summary();
    let detail = error
        .details
        .as_ref()
        .and_then(|d| d.get("message"))
        .and_then(Value::as_str)
        .filter(|m| *m != error.message);
    if let Some(detail) = detail {
        text.push_str(": ");
        text.push_str(detail);
    }
    if let Some(suggestion) = &error.suggestion {
        text.push_str(&format!(" ({})", suggestion));
    }
    text
}
