//! Tool Registry - agent-facing dispatch table
//!
//! Owns tool-name → (definition, handler). Arguments are validated against the
//! definition's schema before a handler ever runs, and every handler failure,
//! panics included, comes back as a `success: false` result.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Instant;

use async_trait::async_trait;
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde_json::{Map, Value};

use crate::envelope::{Envelope, EnvelopeError, ErrorKey};
use crate::error::{RelayError, Result};

use super::definition::{ToolCategory, ToolDefinition};
use super::types::{ToolCallRequest, ToolCallResult};

/// Per-call metadata handed to every tool handler
#[derive(Debug, Clone)]
pub struct ToolContext {
    pub request_id: String,
    pub tool: String,
    pub started: Instant,
}

/// Handler for one tool
///
/// `arguments` is always a JSON object that already passed schema validation.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(&self, arguments: Value, ctx: ToolContext) -> Result<ToolCallResult>;
}

struct FnTool<F> {
    func: F,
}

#[async_trait]
impl<F, Fut> ToolHandler for FnTool<F>
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<ToolCallResult>> + Send,
{
    async fn call(&self, arguments: Value, ctx: ToolContext) -> Result<ToolCallResult> {
        (self.func)(arguments, ctx).await
    }
}

/// Wrap an async closure as a shareable tool handler
pub fn tool_fn<F, Fut>(func: F) -> Arc<dyn ToolHandler>
where
    F: Fn(Value, ToolContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<ToolCallResult>> + Send + 'static,
{
    Arc::new(FnTool { func })
}

/// A definition paired with the handler that implements it
pub struct RegisteredTool {
    pub definition: ToolDefinition,
    pub handler: Arc<dyn ToolHandler>,
}

#[derive(Default)]
struct Tables {
    tools: HashMap<String, Arc<RegisteredTool>>,
    by_category: HashMap<ToolCategory, BTreeSet<String>>,
}

impl Tables {
    fn insert(&mut self, tool: RegisteredTool) {
        let name = tool.definition.name.clone();
        let category = tool.definition.category;
        if let Some(old) = self.tools.insert(name.clone(), Arc::new(tool)) {
            if let Some(names) = self.by_category.get_mut(&old.definition.category) {
                names.remove(&name);
            }
            debug!("Replaced tool {}", name);
        }
        self.by_category.entry(category).or_default().insert(name);
    }

    fn remove(&mut self, name: &str) -> bool {
        let Some(old) = self.tools.remove(name) else {
            return false;
        };
        if let Some(names) = self.by_category.get_mut(&old.definition.category) {
            names.remove(name);
        }
        true
    }
}

/// Registry of agent-callable tools
pub struct ToolRegistry {
    tables: RwLock<Tables>,
    allow_overwrite: bool,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            allow_overwrite: false,
        }
    }

    /// Allow re-registering an existing name to replace its definition and handler
    pub fn with_overwrite(mut self, allow: bool) -> Self {
        self.allow_overwrite = allow;
        self
    }

    /// Register a tool
    pub fn register(&self, definition: ToolDefinition, handler: Arc<dyn ToolHandler>) -> Result<()> {
        self.register_all(vec![(definition, handler)]).map(|_| ())
    }

    /// Register several tools at once
    ///
    /// Fail-fast and atomic: names are checked against the table and within the
    /// batch before anything is inserted.
    pub fn register_all(&self, tools: Vec<(ToolDefinition, Arc<dyn ToolHandler>)>) -> Result<usize> {
        let mut seen = BTreeSet::new();
        for (definition, _) in &tools {
            if !ToolDefinition::is_valid_name(&definition.name) {
                return Err(RelayError::InvalidToolName(definition.name.clone()));
            }
            if !seen.insert(definition.name.as_str()) && !self.allow_overwrite {
                return Err(RelayError::Conflict(definition.name.clone()));
            }
        }

        let mut tables = self.tables.write().unwrap_or_else(PoisonError::into_inner);
        if !self.allow_overwrite {
            if let Some(name) = seen.iter().find(|n| tables.tools.contains_key(**n)) {
                return Err(RelayError::Conflict(name.to_string()));
            }
        }

        let count = tools.len();
        for (definition, handler) in tools {
            tables.insert(RegisteredTool { definition, handler });
        }
        info!("Registered {} tool(s), {} total", count, tables.tools.len());
        Ok(count)
    }

    /// Remove a tool; removing an unknown name is a no-op
    pub fn unregister(&self, name: &str) -> bool {
        self.tables
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
    }

    pub fn has_tool(&self, name: &str) -> bool {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tools
            .contains_key(name)
    }

    pub fn get_definition(&self, name: &str) -> Option<ToolDefinition> {
        self.get(name).map(|t| t.definition.clone())
    }

    /// All definitions, sorted by name
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut tools: Vec<ToolDefinition> = tables.tools.values().map(|t| t.definition.clone()).collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    /// Definitions in one category, sorted by name
    pub fn tools_by_category(&self, category: ToolCategory) -> Vec<ToolDefinition> {
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        tables
            .by_category
            .get(&category)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|n| tables.tools.get(n))
                    .map(|t| t.definition.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.tables.read().unwrap_or_else(PoisonError::into_inner).tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, name: &str) -> Option<Arc<RegisteredTool>> {
        self.tables
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .tools
            .get(name)
            .cloned()
    }

    /// Tools sharing the requested name's leading segment
    fn suggest(&self, name: &str) -> Option<String> {
        let prefix = name.split(['_', '.']).next().filter(|p| !p.is_empty())?;
        let tables = self.tables.read().unwrap_or_else(PoisonError::into_inner);
        let mut similar: Vec<&str> = tables
            .tools
            .keys()
            .filter(|k| k.split(['_', '.']).next() == Some(prefix))
            .map(String::as_str)
            .collect();
        if similar.is_empty() {
            return None;
        }
        similar.sort_unstable();
        Some(format!("Similar tools: {}", similar.join(", ")))
    }

    /// Validate arguments and run a tool
    ///
    /// Only an unknown tool is an `Err`; validation failures and handler
    /// failures are `Ok` results with `success: false`.
    pub async fn call_tool(&self, request: ToolCallRequest) -> Result<ToolCallResult> {
        let started = Instant::now();
        let ToolCallRequest { id, name, arguments } = request;

        let Some(tool) = self.get(&name) else {
            warn!("Unknown tool requested: {}", name);
            let suggestion = self.suggest(&name);
            return Err(RelayError::ToolNotFound { name, suggestion });
        };

        let arguments = match arguments {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => {
                let error = EnvelopeError::new(ErrorKey::ParamInvalid)
                    .with_message(format!("Arguments for '{}' must be a JSON object", name))
                    .with_details(serde_json::json!({ "arguments": other }));
                return Ok(ToolCallResult::from_error(id, &error));
            }
        };

        if let Err(error) = tool.definition.input_schema.validate(&arguments) {
            debug!("Rejected call to {}: {}", name, error.summary());
            return Ok(ToolCallResult::from_error(id, &error));
        }

        let ctx = ToolContext {
            request_id: id.clone(),
            tool: name.clone(),
            started,
        };
        debug!("Calling tool {} (request {})", name, id);

        let outcome = AssertUnwindSafe(tool.handler.call(Value::Object(arguments), ctx))
            .catch_unwind()
            .await;

        let mut result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(err)) => {
                warn!("Tool {} failed: {}", name, err);
                let envelope = Envelope::from_exception(&err, Some(id.clone()), Some(started));
                ToolCallResult::from_envelope(id.clone(), envelope)
            }
            Err(payload) => {
                error!("Tool {} panicked", name);
                let envelope = Envelope::from_panic(payload.as_ref(), Some(id.clone()), Some(started));
                ToolCallResult::from_envelope(id.clone(), envelope)
            }
        };
        result.id = id;
        Ok(result)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::definition::ParamType;
    use crate::registry::types::ContentItem;
    use serde_json::json;
    use std::time::Duration;

    fn echo_tool(name: &str) -> (ToolDefinition, Arc<dyn ToolHandler>) {
        let definition = ToolDefinition::new(name, "Echo arguments back")
            .with_category(ToolCategory::System)
            .with_required_param("sheet", ParamType::String, "Sheet name");
        let handler = tool_fn(|args, ctx| async move { Ok(ToolCallResult::json(ctx.request_id, args)) });
        (definition, handler)
    }

    fn constant(name: &str, category: ToolCategory, text: &'static str) -> (ToolDefinition, Arc<dyn ToolHandler>) {
        let definition = ToolDefinition::new(name, text).with_category(category);
        let handler = tool_fn(move |_, ctx| async move { Ok(ToolCallResult::text(ctx.request_id, text)) });
        (definition, handler)
    }

    #[test]
    fn test_register_and_unregister() {
        let registry = ToolRegistry::new();
        let (def, handler) = echo_tool("excel_echo");
        registry.register(def, handler).unwrap();
        assert!(registry.has_tool("excel_echo"));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("excel_echo"));
        assert!(!registry.has_tool("excel_echo"));
        assert!(!registry.unregister("excel_echo"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_duplicate_register_keeps_original() {
        let registry = ToolRegistry::new();
        let (def, handler) = constant("t", ToolCategory::System, "first");
        registry.register(def, handler).unwrap();
        let (def, handler) = constant("t", ToolCategory::System, "second");
        let err = registry.register(def, handler).unwrap_err();
        assert!(matches!(err, RelayError::Conflict(_)));

        let result = registry.call_tool(ToolCallRequest::new("t", json!({}))).await.unwrap();
        assert_eq!(result.content, vec![ContentItem::text("first")]);
        assert_eq!(registry.get_definition("t").unwrap().description, "first");
    }

    #[tokio::test]
    async fn test_overwrite_replaces_and_reindexes() {
        let registry = ToolRegistry::new().with_overwrite(true);
        let (def, handler) = constant("t", ToolCategory::Spreadsheet, "first");
        registry.register(def, handler).unwrap();
        let (def, handler) = constant("t", ToolCategory::Document, "second");
        registry.register(def, handler).unwrap();

        assert!(registry.tools_by_category(ToolCategory::Spreadsheet).is_empty());
        assert_eq!(registry.tools_by_category(ToolCategory::Document).len(), 1);
        let result = registry.call_tool(ToolCallRequest::new("t", json!({}))).await.unwrap();
        assert_eq!(result.content, vec![ContentItem::text("second")]);
    }

    #[test]
    fn test_register_all_is_atomic() {
        let registry = ToolRegistry::new();
        let (def, handler) = constant("b", ToolCategory::System, "b");
        registry.register(def, handler).unwrap();

        let batch = vec![
            constant("a", ToolCategory::System, "a"),
            constant("b", ToolCategory::System, "b"),
            constant("c", ToolCategory::System, "c"),
        ];
        assert!(matches!(registry.register_all(batch), Err(RelayError::Conflict(n)) if n == "b"));
        assert!(!registry.has_tool("a"));
        assert!(!registry.has_tool("c"));

        let batch = vec![constant("x", ToolCategory::System, "x"), constant("x", ToolCategory::System, "x")];
        assert!(registry.register_all(batch).is_err());
        assert!(!registry.has_tool("x"));
    }

    #[test]
    fn test_register_rejects_bad_name() {
        let registry = ToolRegistry::new();
        let (def, handler) = constant("has space", ToolCategory::System, "x");
        assert!(matches!(registry.register(def, handler), Err(RelayError::InvalidToolName(_))));
    }

    #[test]
    fn test_list_sorted_and_by_category() {
        let registry = ToolRegistry::new();
        registry
            .register_all(vec![
                constant("word_text", ToolCategory::Document, "w"),
                constant("excel_b", ToolCategory::Spreadsheet, "b"),
                constant("excel_a", ToolCategory::Spreadsheet, "a"),
            ])
            .unwrap();

        let names: Vec<String> = registry.list_tools().into_iter().map(|t| t.name).collect();
        assert_eq!(names, vec!["excel_a", "excel_b", "word_text"]);

        let sheets: Vec<String> = registry
            .tools_by_category(ToolCategory::Spreadsheet)
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(sheets, vec!["excel_a", "excel_b"]);
        assert!(registry.tools_by_category(ToolCategory::Presentation).is_empty());
    }

    #[tokio::test]
    async fn test_missing_required_key() {
        let registry = ToolRegistry::new();
        let (def, handler) = echo_tool("excel_echo");
        registry.register(def, handler).unwrap();

        let result = registry
            .call_tool(ToolCallRequest::with_id("r1", "excel_echo", json!({})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.id, "r1");
        let error = result.error.unwrap();
        assert!(error.starts_with("[PARAM_MISSING]"));
        assert!(error.contains("'sheet'"));
    }

    #[tokio::test]
    async fn test_non_object_arguments_rejected() {
        let registry = ToolRegistry::new();
        let (def, handler) = echo_tool("excel_echo");
        registry.register(def, handler).unwrap();

        let result = registry
            .call_tool(ToolCallRequest::new("excel_echo", json!([1, 2])))
            .await
            .unwrap();
        assert!(result.is_validation_failure());
        assert_eq!(result.error_code().as_deref(), Some("PARAM_INVALID"));
    }

    #[tokio::test]
    async fn test_null_arguments_treated_as_empty() {
        let registry = ToolRegistry::new();
        let (def, handler) = constant("t", ToolCategory::System, "ok");
        registry.register(def, handler).unwrap();
        let result = registry.call_tool(ToolCallRequest::new("t", Value::Null)).await.unwrap();
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_valid_call_passes_arguments() {
        let registry = ToolRegistry::new();
        let (def, handler) = echo_tool("excel_echo");
        registry.register(def, handler).unwrap();

        let result = registry
            .call_tool(ToolCallRequest::with_id("r2", "excel_echo", json!({"sheet": "S1", "extra": 2})))
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.error.is_none());
        assert_eq!(result.content, vec![ContentItem::json(json!({"sheet": "S1", "extra": 2}))]);
    }

    #[tokio::test]
    async fn test_unknown_tool_is_error_with_suggestion() {
        let registry = ToolRegistry::new();
        let (def, handler) = echo_tool("excel_echo");
        registry.register(def, handler).unwrap();

        let err = registry
            .call_tool(ToolCallRequest::new("excel_missing", json!({})))
            .await
            .unwrap_err();
        match err {
            RelayError::ToolNotFound { name, suggestion } => {
                assert_eq!(name, "excel_missing");
                assert!(suggestion.unwrap().contains("excel_echo"));
            }
            other => panic!("unexpected {other:?}"),
        }

        let err = registry.call_tool(ToolCallRequest::new("zzz", json!({}))).await.unwrap_err();
        assert!(matches!(err, RelayError::ToolNotFound { suggestion: None, .. }));
    }

    #[tokio::test]
    async fn test_failing_handler_surfaces_message() {
        let registry = ToolRegistry::new();
        let handler = tool_fn(|_, _| async { Err(RelayError::Handler("boom".into())) });
        registry.register(ToolDefinition::new("bad", "Always fails"), handler).unwrap();

        let result = registry.call_tool(ToolCallRequest::new("bad", json!({}))).await.unwrap();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("boom"));
    }

    #[tokio::test]
    async fn test_panicking_handler_is_contained() {
        let registry = ToolRegistry::new();
        let handler = tool_fn(|_, _| async { panic!("kaboom") });
        registry.register(ToolDefinition::new("panics", "Panics"), handler).unwrap();

        let result = registry
            .call_tool(ToolCallRequest::with_id("p1", "panics", json!({})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.id, "p1");
        assert_eq!(result.error_code().as_deref(), Some("INTERNAL_ERROR"));
        assert!(result.error.unwrap().contains("kaboom"));
    }

    #[tokio::test]
    async fn test_result_id_follows_request() {
        let registry = ToolRegistry::new();
        let handler = tool_fn(|_, _| async { Ok(ToolCallResult::text("wrong-id", "x")) });
        registry.register(ToolDefinition::new("t", "t"), handler).unwrap();
        let result = registry
            .call_tool(ToolCallRequest::with_id("right-id", "t", json!({})))
            .await
            .unwrap();
        assert_eq!(result.id, "right-id");
    }

    #[tokio::test]
    async fn test_concurrent_calls_keep_their_payloads() {
        let registry = Arc::new(ToolRegistry::new());
        let handler = tool_fn(|args, ctx| async move {
            let n = args["n"].as_u64().unwrap_or(0);
            tokio::time::sleep(Duration::from_millis(20 - n % 20)).await;
            Ok(ToolCallResult::json(ctx.request_id, json!({"n": n})))
        });
        registry.register(ToolDefinition::new("slow", "slow"), handler).unwrap();

        let calls = (0..20u64).map(|n| {
            let registry = registry.clone();
            tokio::spawn(async move {
                let result = registry
                    .call_tool(ToolCallRequest::with_id(format!("id-{n}"), "slow", json!({"n": n})))
                    .await
                    .unwrap();
                (n, result)
            })
        });
        for (n, result) in futures::future::join_all(calls).await.into_iter().map(|r| r.unwrap()) {
            assert_eq!(result.id, format!("id-{n}"));
            assert_eq!(result.content, vec![ContentItem::json(json!({"n": n}))]);
        }
    }
}
