//! Tool handlers backed by the relay client

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::registry::{
    ToolCallResult, ToolCatalog, ToolCategory, ToolContext, ToolDefinition, ToolHandler, ToolRegistry,
};
use crate::router::ActionName;

use super::client::RelayClient;

/// Name of the local connection diagnostic tool
pub const RELAY_STATUS_TOOL: &str = "relay_status";

/// Forwards a tool call to one remote action
pub struct RelayToolHandler {
    client: Arc<RelayClient>,
    method: ActionName,
    timeout: Option<Duration>,
}

impl RelayToolHandler {
    pub fn new(client: Arc<RelayClient>, method: ActionName) -> Self {
        Self {
            client,
            method,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout_ms: Option<u64>) -> Self {
        self.timeout = timeout_ms.map(Duration::from_millis);
        self
    }

    pub fn method(&self) -> &ActionName {
        &self.method
    }
}

#[async_trait]
impl ToolHandler for RelayToolHandler {
    async fn call(&self, arguments: Value, ctx: ToolContext) -> Result<ToolCallResult> {
        let envelope = self
            .client
            .invoke_with_id(ctx.request_id.clone(), self.method.as_str(), arguments, self.timeout)
            .await?;
        Ok(ToolCallResult::from_envelope(ctx.request_id, envelope))
    }
}

/// Reports the relay's view of the office host after a fresh ping
pub struct ConnectionStatusTool {
    client: Arc<RelayClient>,
}

impl ConnectionStatusTool {
    pub fn new(client: Arc<RelayClient>) -> Self {
        Self { client }
    }

    pub fn definition() -> ToolDefinition {
        ToolDefinition::new(
            RELAY_STATUS_TOOL,
            "Check whether the office host is reachable and report the last connection error",
        )
        .with_category(ToolCategory::System)
    }
}

#[async_trait]
impl ToolHandler for ConnectionStatusTool {
    async fn call(&self, _arguments: Value, ctx: ToolContext) -> Result<ToolCallResult> {
        self.client.check_connection().await;
        let status = serde_json::to_value(self.client.connection_status())?;
        Ok(ToolCallResult::json(ctx.request_id, status))
    }
}

/// Bind every catalog entry to its remote action
pub fn relay_tools(catalog: &ToolCatalog, client: &Arc<RelayClient>) -> Vec<(ToolDefinition, Arc<dyn ToolHandler>)> {
    let mut tools: Vec<(ToolDefinition, Arc<dyn ToolHandler>)> = catalog
        .all()
        .map(|tool| {
            let handler = RelayToolHandler::new(Arc::clone(client), tool.method.clone()).with_timeout(tool.timeout_ms);
            (tool.definition.clone(), Arc::new(handler) as Arc<dyn ToolHandler>)
        })
        .collect();
    tools.sort_by(|a, b| a.0.name.cmp(&b.0.name));
    tools
}

/// Register the catalog's relay tools plus `relay_status`
pub fn register_relay_tools(registry: &ToolRegistry, catalog: &ToolCatalog, client: &Arc<RelayClient>) -> Result<usize> {
    let mut tools = relay_tools(catalog, client);
    if !catalog.contains(RELAY_STATUS_TOOL) {
        tools.push((
            ConnectionStatusTool::definition(),
            Arc::new(ConnectionStatusTool::new(Arc::clone(client))),
        ));
    }
    registry.register_all(tools)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envelope::{EnvelopeError, ErrorKey};
    use crate::registry::{ContentItem, ToolCallRequest};
    use crate::relay::client::RelayClientConfig;
    use crate::relay::transport::InProcessTransport;
    use crate::router::{RemoteRouter, action_fn};
    use serde_json::json;

    const CATALOG: &str = r#"
tools:
  - name: excel_get_cell
    description: Read a cell
    category: spreadsheet
    method: excel.getCellValue
    params:
      address: { type: string }
    required: [address]
  - name: word_get_text
    description: Read the document
    category: document
    method: word.getText
    timeout_ms: 50
"#;

    fn setup() -> (ToolRegistry, Arc<RelayClient>) {
        let router = RemoteRouter::new();
        router
            .register(
                "excel.getCellValue",
                action_fn(|params, _| async move { Ok(json!({"address": params["address"], "value": 42})) }),
            )
            .unwrap();
        router
            .register(
                "word.getText",
                action_fn(|_, _| async move {
                    tokio::time::sleep(Duration::from_millis(200)).await;
                    Err(EnvelopeError::new(ErrorKey::DocumentNotFound))
                }),
            )
            .unwrap();

        let transport = InProcessTransport::new(Arc::new(router));
        let client = Arc::new(RelayClient::with_transport(RelayClientConfig::default(), Arc::new(transport)));
        let registry = ToolRegistry::new();
        let catalog = ToolCatalog::from_yaml(CATALOG).unwrap();
        let count = register_relay_tools(&registry, &catalog, &client).unwrap();
        assert_eq!(count, 3);
        (registry, client)
    }

    #[tokio::test]
    async fn test_relay_tool_success() {
        let (registry, _) = setup();
        let result = registry
            .call_tool(ToolCallRequest::with_id("r1", "excel_get_cell", json!({"address": "B2"})))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.id, "r1");
        assert_eq!(result.content, vec![ContentItem::json(json!({"address": "B2", "value": 42}))]);
    }

    #[tokio::test]
    async fn test_relay_tool_validation_happens_before_relay() {
        let (registry, client) = setup();
        let result = registry
            .call_tool(ToolCallRequest::new("excel_get_cell", json!({})))
            .await
            .unwrap();
        assert!(result.error.unwrap().contains("'address'"));
        assert!(client.connection_status().last_heartbeat.is_none());
    }

    #[tokio::test]
    async fn test_relay_tool_timeout_from_catalog() {
        let (registry, _) = setup();
        let result = registry
            .call_tool(ToolCallRequest::new("word_get_text", json!({})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_code().as_deref(), Some("TIMEOUT"));
        assert!(result.error.unwrap().contains("budget 50ms"));
    }

    #[tokio::test]
    async fn test_status_tool() {
        let (registry, _) = setup();
        let result = registry
            .call_tool(ToolCallRequest::new(RELAY_STATUS_TOOL, json!({})))
            .await
            .unwrap();
        assert!(result.success);
        match &result.content[0] {
            ContentItem::Json { data } => {
                assert_eq!(data["connected"], true);
                assert!(data["lastHeartbeat"].is_string());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_maps_to_connection_refused() {
        let config = RelayClientConfig {
            timeout_ms: 2_000,
            ..RelayClientConfig::with_base_url("http://127.0.0.1:1")
        };
        let client = Arc::new(RelayClient::new(config).unwrap());
        let registry = ToolRegistry::new();
        let catalog = ToolCatalog::from_yaml(CATALOG).unwrap();
        register_relay_tools(&registry, &catalog, &client).unwrap();

        let result = registry
            .call_tool(ToolCallRequest::new("excel_get_cell", json!({"address": "A1"})))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.error_code().as_deref(), Some("CONNECTION_REFUSED"));
        assert!(result.error.unwrap().contains("add-in is loaded"));
    }
}
