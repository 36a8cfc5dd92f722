//! Response envelope spoken by both the remote router and the relay client
//!
//! Wire shape (camelCase):
//! `{success, data, error, requestId, duration, timestamp}`.
//! Exactly one of `data` / `error` is non-null and it agrees with `success`.

use std::any::Any;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::codes::ErrorKey;
use crate::error::RelayError;

/// Error object carried by a failed envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeError {
    /// Taxonomy code (e.g. "ACTION_NOT_FOUND"); remote codes pass through untouched
    pub code: String,
    /// Broad class of the error (e.g. "validation")
    #[serde(rename = "type")]
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Diagnostic payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
    /// Actionable hint for the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl EnvelopeError {
    /// Create an error with the key's default message and suggestion
    pub fn new(key: ErrorKey) -> Self {
        Self {
            code: key.code().to_string(),
            kind: key.kind().as_str().to_string(),
            message: key.default_message().to_string(),
            details: None,
            suggestion: key.default_suggestion().map(String::from),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Known taxonomy key, if the code is one of ours
    pub fn key(&self) -> Option<ErrorKey> {
        ErrorKey::from_code(&self.code)
    }

    /// One-line form used in tool results: `[CODE] message`
    pub fn summary(&self) -> String {
        format!("[{}] {}", self.code, self.message)
    }
}

impl From<&RelayError> for EnvelopeError {
    fn from(err: &RelayError) -> Self {
        let key = err.error_key();
        let mut error = EnvelopeError::new(key).with_details(json!({
            "message": err.to_string(),
            "stack": source_chain(err),
        }));
        if key != ErrorKey::InternalError {
            error.message = err.to_string();
        }
        if let RelayError::ToolNotFound {
            suggestion: Some(suggestion),
            ..
        } = err
        {
            error.suggestion = Some(suggestion.clone());
        }
        error
    }
}

impl From<RelayError> for EnvelopeError {
    fn from(err: RelayError) -> Self {
        Self::from(&err)
    }
}

impl std::fmt::Display for EnvelopeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())?;
        if let Some(suggestion) = &self.suggestion {
            write!(f, " ({})", suggestion)?;
        }
        Ok(())
    }
}

impl std::error::Error for EnvelopeError {}

/// Uniform success/error/timing wrapper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub error: Option<EnvelopeError>,
    #[serde(default)]
    pub request_id: Option<String>,
    /// Milliseconds between the request start and envelope construction
    #[serde(default)]
    pub duration: u64,
    /// RFC 3339 UTC timestamp
    #[serde(default)]
    pub timestamp: String,
}

impl Envelope {
    /// Build a success envelope; a `null` payload becomes `{}`
    pub fn success(data: Value, request_id: Option<String>, started: Option<Instant>) -> Self {
        let data = if data.is_null() { json!({}) } else { data };
        Self {
            success: true,
            data: Some(data),
            error: None,
            request_id,
            duration: elapsed_ms(started),
            timestamp: timestamp_now(),
        }
    }

    /// Build an error envelope from a taxonomy key
    pub fn error(
        key: ErrorKey,
        request_id: Option<String>,
        started: Option<Instant>,
        details: Option<Value>,
        suggestion: Option<String>,
    ) -> Self {
        let mut error = EnvelopeError::new(key);
        error.details = details;
        if suggestion.is_some() {
            error.suggestion = suggestion;
        }
        Self::from_error(error, request_id, started)
    }

    /// Build an error envelope from a fully formed error object
    pub fn from_error(error: EnvelopeError, request_id: Option<String>, started: Option<Instant>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error),
            request_id,
            duration: elapsed_ms(started),
            timestamp: timestamp_now(),
        }
    }

    /// Map a caught error to an envelope
    ///
    /// Relay-level errors keep their own code and message; everything else is
    /// reported as `INTERNAL_ERROR` with the raw message and source chain in
    /// `details`.
    pub fn from_exception(err: &RelayError, request_id: Option<String>, started: Option<Instant>) -> Self {
        Self::from_error(EnvelopeError::from(err), request_id, started)
    }

    /// Map a caught panic payload to an `INTERNAL_ERROR` envelope
    ///
    /// Only the payload message survives unwinding, so there is no `stack`.
    pub fn from_panic(payload: &(dyn Any + Send), request_id: Option<String>, started: Option<Instant>) -> Self {
        let message = panic_message(payload);
        let error = EnvelopeError::new(ErrorKey::InternalError).with_details(json!({ "message": message }));
        Self::from_error(error, request_id, started)
    }

    /// Re-stamp correlation id and duration
    pub fn stamp(mut self, request_id: Option<String>, started: Option<Instant>) -> Self {
        self.request_id = request_id;
        self.duration = elapsed_ms(started);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// HTTP status the host answers with: the code lives in the body
    pub fn http_status(&self) -> u16 {
        if self.success { 200 } else { 500 }
    }

    /// Check the `success` / `data` / `error` invariant
    pub fn validate(&self) -> std::result::Result<(), String> {
        match (self.success, &self.data, &self.error) {
            (true, Some(_), None) => Ok(()),
            (false, None, Some(_)) => Ok(()),
            (true, _, Some(_)) => Err("success envelope carries an error".to_string()),
            (true, None, None) => Err("success envelope has no data".to_string()),
            (false, Some(_), _) => Err("failed envelope carries data".to_string()),
            (false, None, None) => Err("failed envelope has no error".to_string()),
        }
    }

    /// Split into payload or error
    pub fn into_result(self) -> std::result::Result<Value, EnvelopeError> {
        match (self.success, self.data, self.error) {
            (true, data, _) => Ok(data.unwrap_or_else(|| json!({}))),
            (false, _, Some(error)) => Err(error),
            (false, _, None) => Err(EnvelopeError::new(ErrorKey::ProtocolError)),
        }
    }
}

/// Milliseconds since `started`, 0 when absent
pub fn elapsed_ms(started: Option<Instant>) -> u64 {
    started
        .map(|s| Instant::now().saturating_duration_since(s).as_millis() as u64)
        .unwrap_or(0)
}

/// Current UTC time, millisecond precision
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Best-effort text of a panic payload
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

fn source_chain(err: &dyn std::error::Error) -> Vec<String> {
    let mut chain = vec![err.to_string()];
    let mut current = err.source();
    while let Some(source) = current {
        chain.push(source.to_string());
        current = source.source();
    }
    chain
}
