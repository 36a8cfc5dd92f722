//! Agent server - exposes the Tool Registry over stdio JSON-RPC
//!
//! Requests are read line by line. `tools/call` runs as its own task so a slow
//! office operation never blocks the next request; every response funnels
//! through a single writer task.

use std::sync::Arc;

use log::{debug, info, warn};
use serde_json::{Value, json};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::error::{RelayError, Result};
use crate::id::generate_request_id;
use crate::registry::{ToolCallRequest, ToolCallResult, ToolRegistry};

use super::messages::{INVALID_REQUEST, RpcError, RpcRequest, RpcResponse};

/// MCP protocol revision reported by `initialize`
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const OUTBOX_CAPACITY: usize = 64;

/// Stdio JSON-RPC server over a tool registry
#[derive(Clone)]
pub struct AgentServer {
    registry: Arc<ToolRegistry>,
    name: String,
}

impl AgentServer {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            name: env!("CARGO_PKG_NAME").to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Serve until `input` reaches EOF, then drain in-flight calls
    pub async fn run<R, W>(&self, input: R, output: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<RpcResponse>(OUTBOX_CAPACITY);
        let writer = tokio::spawn(write_responses(rx, output));

        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(response) = self.handle_line(line, &tx).await {
                if tx.send(response).await.is_err() {
                    warn!("Response writer stopped; ending agent session");
                    break;
                }
            }
        }

        info!("Agent input closed; waiting for in-flight calls");
        drop(tx);
        writer
            .await
            .map_err(|e| RelayError::Handler(format!("response writer failed: {}", e)))?
    }

    /// Serve on the process's stdin/stdout
    pub async fn run_stdio(&self) -> Result<()> {
        let stdin = tokio::io::BufReader::new(tokio::io::stdin());
        self.run(stdin, tokio::io::stdout()).await
    }

    /// Handle one line; `None` when the response is sent later or not at all
    async fn handle_line(&self, line: &str, tx: &mpsc::Sender<RpcResponse>) -> Option<RpcResponse> {
        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => return Some(RpcResponse::error(Value::Null, RpcError::parse_error(e))),
        };
        let id = value.get("id").cloned().unwrap_or(Value::Null);
        let request: RpcRequest = match serde_json::from_value(value) {
            Ok(request) => request,
            Err(e) => {
                return Some(RpcResponse::error(
                    id,
                    RpcError::new(INVALID_REQUEST, format!("Invalid request: {}", e)),
                ));
            }
        };

        if request.is_notification() {
            debug!("Ignoring notification {}", request.method);
            return None;
        }

        let id = request.id.clone().unwrap_or(Value::Null);
        match request.method.as_str() {
            "initialize" => Some(RpcResponse::success(id, self.initialize_result())),
            "ping" => Some(RpcResponse::success(id, json!({}))),
            "tools/list" => Some(RpcResponse::success(id, self.tools_list_result())),
            "tools/call" => {
                let server = self.clone();
                let tx = tx.clone();
                let params = request.params.unwrap_or(Value::Null);
                tokio::spawn(async move {
                    let response = server.call_tool(id, params).await;
                    if tx.send(response).await.is_err() {
                        warn!("Dropping tool response: writer closed");
                    }
                });
                None
            }
            other => Some(RpcResponse::error(id, RpcError::method_not_found(other))),
        }
    }

    fn initialize_result(&self) -> Value {
        json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.name,
                "version": env!("CARGO_PKG_VERSION"),
            },
        })
    }

    fn tools_list_result(&self) -> Value {
        json!({ "tools": self.registry.list_tools() })
    }

    /// Run one `tools/call`; failures inside the tool are results, not RPC errors
    pub async fn call_tool(&self, id: Value, params: Value) -> RpcResponse {
        let Some(name) = params.get("name").and_then(Value::as_str) else {
            return RpcResponse::error(id, RpcError::invalid_params("Missing 'name' in tools/call params"));
        };
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);
        let request_id = params
            .get("requestId")
            .and_then(Value::as_str)
            .map(String::from)
            .unwrap_or_else(generate_request_id);

        let request = ToolCallRequest::with_id(request_id, name, arguments);
        match self.registry.call_tool(request).await {
            Ok(result) => RpcResponse::success(id, call_result(&result)),
            Err(RelayError::ToolNotFound { name, suggestion }) => {
                let mut error = RpcError::invalid_params(format!("Tool not found: {}", name));
                if let Some(suggestion) = suggestion {
                    error = error.with_data(json!({ "suggestion": suggestion }));
                }
                RpcResponse::error(id, error)
            }
            Err(err) => RpcResponse::error(id, RpcError::internal(err.to_string())),
        }
    }
}

/// `{content, isError, requestId}`; every item is rendered as text for the agent
fn call_result(result: &ToolCallResult) -> Value {
    let mut content = Vec::new();
    if let Some(error) = result.error.as_ref().filter(|_| !result.success) {
        content.push(json!({ "type": "text", "text": error }));
    }
    content.extend(
        result
            .content
            .iter()
            .map(|item| json!({ "type": "text", "text": item.to_text() })),
    );
    json!({
        "content": content,
        "isError": !result.success,
        "requestId": result.id,
    })
}

async fn write_responses<W>(mut rx: mpsc::Receiver<RpcResponse>, mut output: W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    while let Some(response) = rx.recv().await {
        let mut line = serde_json::to_string(&response)?;
        line.push('\n');
        output.write_all(line.as_bytes()).await?;
        output.flush().await?;
    }
    Ok(())
}
