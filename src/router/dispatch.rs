//! Remote Router - inbound dispatch table on the office host side
//!
//! Maps `module.method` action strings to handlers and guarantees that every
//! request, known or not, comes back as an [`Envelope`].

use std::collections::{BTreeSet, HashMap};
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use futures::FutureExt;
use log::{debug, error, warn};
use serde_json::{Value, json};

use crate::envelope::{Envelope, EnvelopeError, ErrorKey, timestamp_now};
use crate::error::{RelayError, Result};

use super::action::{ActionContext, ActionHandler, ActionName, module_of};

/// Built-in actions seeded at construction; they cannot be replaced or removed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemAction {
    Ping,
    Status,
    ListActions,
}

impl SystemAction {
    pub const ALL: [SystemAction; 3] = [Self::Ping, Self::Status, Self::ListActions];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Status => "status",
            Self::ListActions => "listActions",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|a| a.name() == name)
    }
}

/// Action table plus dispatch
pub struct RemoteRouter {
    actions: RwLock<HashMap<ActionName, Arc<dyn ActionHandler>>>,
    allow_overwrite: bool,
    started_at: Instant,
}

impl RemoteRouter {
    /// Create a router holding only the system actions
    pub fn new() -> Self {
        Self {
            actions: RwLock::new(HashMap::new()),
            allow_overwrite: false,
            started_at: Instant::now(),
        }
    }

    /// Allow re-registering an existing action to replace its handler
    pub fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Register a handler for an action
    pub fn register(&self, action: &str, handler: Arc<dyn ActionHandler>) -> Result<()> {
        self.register_all([(action, handler)]).map(|_| ())
    }

    /// Register several handlers at once
    ///
    /// Fail-fast and atomic: every name is validated and checked for
    /// conflicts before any entry is inserted.
    pub fn register_all<'a, I>(&self, entries: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, Arc<dyn ActionHandler>)>,
    {
        let mut batch: Vec<(ActionName, Arc<dyn ActionHandler>)> = Vec::new();
        for (action, handler) in entries {
            let name = ActionName::parse(action)?;
            if SystemAction::from_name(name.as_str()).is_some() {
                return Err(RelayError::Conflict(format!("{} is a system action", name)));
            }
            if !self.allow_overwrite && batch.iter().any(|(n, _)| n == &name) {
                return Err(RelayError::Conflict(name.to_string()));
            }
            batch.push((name, handler));
        }

        let mut actions = self.actions.write().unwrap_or_else(PoisonError::into_inner);
        if !self.allow_overwrite {
            if let Some((name, _)) = batch.iter().find(|(n, _)| actions.contains_key(n)) {
                return Err(RelayError::Conflict(name.to_string()));
            }
        }

        let count = batch.len();
        for (name, handler) in batch {
            if actions.insert(name.clone(), handler).is_some() {
                debug!("Replaced handler for action {}", name);
            }
        }
        Ok(count)
    }

    /// Remove an action; system actions are never removed
    pub fn unregister(&self, action: &str) -> bool {
        let Ok(name) = ActionName::parse(action) else {
            return false;
        };
        self.actions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&name)
            .is_some()
    }

    pub fn has_action(&self, action: &str) -> bool {
        if SystemAction::from_name(action).is_some() {
            return true;
        }
        ActionName::parse(action)
            .map(|name| {
                self.actions
                    .read()
                    .unwrap_or_else(PoisonError::into_inner)
                    .contains_key(&name)
            })
            .unwrap_or(false)
    }

    /// All action names, system actions included, sorted
    pub fn list_actions(&self) -> Vec<String> {
        let actions = self.actions.read().unwrap_or_else(PoisonError::into_inner);
        let mut names: Vec<String> = SystemAction::ALL
            .iter()
            .map(|a| a.name().to_string())
            .chain(actions.keys().map(|n| n.to_string()))
            .collect();
        names.sort();
        names
    }

    /// Number of actions, system actions included
    pub fn action_count(&self) -> usize {
        SystemAction::ALL.len() + self.actions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Resolve an action and run its handler
    pub async fn dispatch(
        &self,
        action: Option<&str>,
        params: Value,
        request_id: Option<String>,
        started: Option<Instant>,
    ) -> Envelope {
        let action = action.map(str::trim).unwrap_or_default();
        if action.is_empty() {
            let error = EnvelopeError::new(ErrorKey::ParamMissing)
                .with_message("Missing required parameter: 'action'");
            return Envelope::from_error(error, request_id, started);
        }

        let name = match ActionName::parse(action) {
            Ok(name) => name,
            Err(err) => {
                let error = EnvelopeError::new(ErrorKey::ParamInvalid)
                    .with_message(err.to_string())
                    .with_details(json!({ "action": action }));
                return Envelope::from_error(error, request_id, started);
            }
        };

        if let Some(system) = SystemAction::from_name(name.as_str()) {
            return Envelope::success(self.system_response(system), request_id, started);
        }

        let handler = self
            .actions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&name)
            .cloned();

        let Some(handler) = handler else {
            warn!("Unknown action requested: {}", name);
            let error = EnvelopeError::new(ErrorKey::ActionNotFound)
                .with_message(format!("Unknown action: {}", action))
                .with_details(json!({ "action": action }))
                .with_suggestion(self.suggest(action));
            return Envelope::from_error(error, request_id, started);
        };

        debug!("Dispatching {} (request {:?})", name, request_id);
        let ctx = ActionContext {
            action: name.clone(),
            request_id: request_id.clone(),
            started: started.unwrap_or_else(Instant::now),
        };

        let outcome = AssertUnwindSafe(handler.handle(params, ctx)).catch_unwind().await;
        let envelope = match outcome {
            Ok(Ok(data)) => Envelope::success(data, None, None),
            Ok(Err(error)) => {
                debug!("Action {} failed: {}", name, error.summary());
                Envelope::from_error(error, None, None)
            }
            Err(payload) => {
                error!("Action {} panicked", name);
                Envelope::from_panic(payload.as_ref(), None, None)
            }
        };
        envelope.stamp(request_id, started)
    }

    /// Hint listing same-module actions, or all modules when there are none
    pub fn suggest(&self, action: &str) -> String {
        let module = module_of(action);
        let prefix = format!("{}.", module);
        let names = self.list_actions();

        let same_module: Vec<&str> = names
            .iter()
            .map(String::as_str)
            .filter(|n| n.starts_with(&prefix))
            .collect();
        if !same_module.is_empty() {
            return format!("Available actions in '{}': {}", module, same_module.join(", "));
        }

        let modules: BTreeSet<&str> = names.iter().map(|n| module_of(n)).collect();
        format!(
            "Available modules: {}",
            modules.into_iter().collect::<Vec<_>>().join(", ")
        )
    }

    fn system_response(&self, action: SystemAction) -> Value {
        match action {
            SystemAction::Ping => json!({
                "pong": true,
                "timestamp": timestamp_now(),
            }),
            SystemAction::Status => json!({
                "status": "running",
                "version": env!("CARGO_PKG_VERSION"),
                "uptimeMs": self.started_at.elapsed().as_millis() as u64,
                "actionCount": self.action_count(),
            }),
            SystemAction::ListActions => {
                let actions = self.list_actions();
                json!({
                    "count": actions.len(),
                    "actions": actions,
                })
            }
        }
    }
}

impl Default for RemoteRouter {
    fn default() -> Self {
        Self::new()
    }
}
