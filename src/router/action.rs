//! Action names and the handler trait
//!
//! An action is a `module.method` string mapped to a handler on the office
//! host side. Names are validated when registered so typos fail loudly at
//! bootstrap instead of surfacing later as `ACTION_NOT_FOUND`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::EnvelopeError;
use crate::error::{RelayError, Result};

/// Validated action name, e.g. `excel.getCellValue`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ActionName(String);

impl ActionName {
    /// Parse and validate an action name
    ///
    /// One or more non-empty segments of `[A-Za-z0-9_-]` joined by `.`.
    pub fn parse(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        let valid = !name.is_empty()
            && name.split('.').all(|segment| {
                !segment.is_empty()
                    && segment
                        .chars()
                        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
            });
        if valid {
            Ok(Self(name))
        } else {
            Err(RelayError::InvalidActionName(name))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Module prefix: everything before the first `.`, or the whole name
    pub fn module(&self) -> &str {
        module_of(&self.0)
    }
}

/// Module prefix of a raw action string
pub fn module_of(action: &str) -> &str {
    action.split('.').next().unwrap_or(action)
}

impl std::fmt::Display for ActionName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ActionName {
    type Error = RelayError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for ActionName {
    type Error = RelayError;

    fn try_from(value: &str) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<ActionName> for String {
    fn from(name: ActionName) -> Self {
        name.0
    }
}

/// Per-request metadata handed to every action handler
#[derive(Debug, Clone)]
pub struct ActionContext {
    pub action: ActionName,
    pub request_id: Option<String>,
    pub started: Instant,
}

/// Outcome of an action handler
pub type ActionResult = std::result::Result<Value, EnvelopeError>;

/// Handler for one action
#[async_trait]
pub trait ActionHandler: Send + Sync {
    async fn handle(&self, params: Value, ctx: ActionContext) -> ActionResult;
}

/// Adapter turning an async closure into an [`ActionHandler`]
pub struct FnAction<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> ActionHandler for FnAction<F>
where
    F: Fn(Value, ActionContext) -> Fut + Send + Sync,
    Fut: Future<Output = ActionResult> + Send,
{
    async fn handle(&self, params: Value, ctx: ActionContext) -> ActionResult {
        (self.func)(params, ctx).await
    }
}

/// Wrap an async closure as a shareable handler
pub fn action_fn<F, Fut>(func: F) -> Arc<dyn ActionHandler>
where
    F: Fn(Value, ActionContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ActionResult> + Send + 'static,
{
    Arc::new(FnAction { func })
}
