//! Diagnostic `echo.*` actions
//!
//! Stand-ins for office automation handlers, so a bare host can be exercised
//! end to end without an office application behind it.

use std::time::Duration;

use serde_json::{Value, json};

use crate::envelope::{EnvelopeError, ErrorKey};
use crate::error::Result;
use crate::router::{ActionHandler, RemoteRouter, action_fn};

/// Longest delay `echo.delay` will honour
pub const MAX_DELAY_MS: u64 = 60_000;

/// `echo.ping`, `echo.echo`, `echo.delay` and `echo.fail`
pub fn diagnostic_actions() -> Vec<(&'static str, std::sync::Arc<dyn ActionHandler>)> {
    vec![
        ("echo.ping", action_fn(|_, _| async { Ok(json!({ "pong": true })) })),
        ("echo.echo", action_fn(|params, _| async move { Ok(params) })),
        (
            "echo.delay",
            action_fn(|params, _| async move {
                let ms = match params.get("ms") {
                    None | Some(Value::Null) => 0,
                    Some(value) => value.as_u64().ok_or_else(|| {
                        EnvelopeError::new(ErrorKey::ParamInvalid)
                            .with_message("Parameter 'ms' must be a non-negative integer")
                    })?,
                };
                let ms = ms.min(MAX_DELAY_MS);
                tokio::time::sleep(Duration::from_millis(ms)).await;
                Ok(json!({ "sleptMs": ms }))
            }),
        ),
        (
            "echo.fail",
            action_fn(|params, _| async move {
                let code = params.get("code").and_then(Value::as_str).unwrap_or("OPERATION_FAILED");
                let key = ErrorKey::from_code(code).unwrap_or(ErrorKey::OperationFailed);
                let mut error = EnvelopeError::new(key);
                if let Some(message) = params.get("message").and_then(Value::as_str) {
                    error = error.with_message(message);
                }
                Err(error)
            }),
        ),
    ]
}

/// Register the diagnostic actions on a router
pub fn register_diagnostic_actions(router: &RemoteRouter) -> Result<usize> {
    router.register_all(diagnostic_actions())
}
