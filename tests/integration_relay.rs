//! End-to-end relay integration tests
//!
//! A real office host listener on 127.0.0.1:0, a relay client speaking HTTP to
//! it, and a tool registry on top.

use std::sync::Arc;
use std::time::Duration;

use office_relay::envelope::{EnvelopeError, ErrorKey};
use office_relay::error::RelayError;
use office_relay::host::{self, HostHandle};
use office_relay::registry::{ContentItem, ToolCallRequest, ToolCatalog, ToolRegistry};
use office_relay::relay::{RelayClient, RelayClientConfig, register_relay_tools};
use office_relay::router::{RemoteRouter, action_fn};
use serde_json::json;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

const CATALOG: &str = r#"
tools:
  - name: host_ping
    description: Ping through the host
    method: echo.ping
  - name: host_echo
    description: Echo arguments
    method: echo.echo
    params:
      message: { type: string }
    required: [message]
  - name: excel_get_cell
    description: Read a cell
    category: spreadsheet
    method: excel.getCellValue
    params:
      address: { type: string }
    required: [address]
  - name: word_get_text
    description: Read the document body
    category: document
    method: word.getText
"#;

async fn start_host() -> HostHandle {
    let router = RemoteRouter::new();
    host::register_diagnostic_actions(&router).unwrap();
    router
        .register(
            "excel.getCellValue",
            action_fn(|params, _| async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok(json!({"address": params["address"], "value": 7}))
            }),
        )
        .unwrap();
    router
        .register(
            "word.getText",
            action_fn(|_, _| async { Err(EnvelopeError::new(ErrorKey::DocumentNotFound)) }),
        )
        .unwrap();

    let listener = host::bind("127.0.0.1:0").await.unwrap();
    host::spawn(listener, Arc::new(router)).unwrap()
}

fn client_for(url: &str, timeout_ms: u64) -> Arc<RelayClient> {
    let config = RelayClientConfig {
        timeout_ms,
        ..RelayClientConfig::with_base_url(url)
    };
    Arc::new(RelayClient::new(config).unwrap())
}

fn registry_for(client: &Arc<RelayClient>) -> ToolRegistry {
    let registry = ToolRegistry::new();
    let catalog = ToolCatalog::from_yaml(CATALOG).unwrap();
    register_relay_tools(&registry, &catalog, client).unwrap();
    registry
}

#[tokio::test]
async fn test_http_round_trip_ping() {
    let host = start_host().await;
    let client = client_for(&host.url(), 5_000);
    let registry = registry_for(&client);

    let result = registry
        .call_tool(ToolCallRequest::with_id("req-rt", "host_ping", json!({})))
        .await
        .unwrap();
    assert!(result.success, "{:?}", result.error);
    assert_eq!(result.id, "req-rt");
    assert_eq!(result.content, vec![ContentItem::json(json!({"pong": true}))]);
    assert!(client.connection_status().connected);

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_request_id_threads_through_both_hops() {
    let host = start_host().await;
    let client = client_for(&host.url(), 5_000);

    let envelope = client
        .invoke_with_id("req-thread".into(), "echo.echo", json!({"a": 1}), None)
        .await
        .unwrap();
    assert_eq!(envelope.request_id.as_deref(), Some("req-thread"));
    assert_eq!(envelope.data.unwrap(), json!({"a": 1}));
    assert!(!envelope.timestamp.is_empty());

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_namespace_prefix_reaches_host() {
    let host = start_host().await;
    let config = RelayClientConfig {
        namespace: Some("office".to_string()),
        ..RelayClientConfig::with_base_url(host.url())
    };
    let client = RelayClient::new(config).unwrap();
    assert!(client.endpoint().ends_with("/office"));
    assert!(client.check_connection().await);

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_remote_error_is_not_reinterpreted() {
    let host = start_host().await;
    let client = client_for(&host.url(), 5_000);
    let registry = registry_for(&client);

    let result = registry
        .call_tool(ToolCallRequest::new("word_get_text", json!({})))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error_code().as_deref(), Some("DOCUMENT_NOT_FOUND"));
    assert!(result.error.unwrap().contains("[DOCUMENT_NOT_FOUND]"));

    let envelope = client.invoke("excel.missing", json!({}), None).await.unwrap();
    let error = envelope.error.unwrap();
    assert_eq!(error.code, "ACTION_NOT_FOUND");
    assert!(error.suggestion.unwrap().contains("excel.getCellValue"));

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timeout_and_late_response_discarded() {
    let host = start_host().await;
    let client = client_for(&host.url(), 5_000);

    let err = client
        .invoke_with_id(
            "req-late".into(),
            "excel.getCellValue",
            json!({"address": "A1"}),
            Some(Duration::from_millis(50)),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Timeout { budget_ms: 50, .. }));

    // Reuse the id; nothing from the abandoned call may leak into this one
    let envelope = client
        .invoke_with_id("req-late".into(), "echo.delay", json!({"ms": 300}), None)
        .await
        .unwrap();
    assert_eq!(envelope.data.unwrap(), json!({"sleptMs": 300}));
    assert_eq!(client.pending_count().await, 0);

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_timeout_surfaces_through_registry() {
    let host = start_host().await;
    let client = client_for(&host.url(), 50);
    let registry = registry_for(&client);

    let result = registry
        .call_tool(ToolCallRequest::new("excel_get_cell", json!({"address": "B3"})))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error_code().as_deref(), Some("TIMEOUT"));

    host.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_connection_refused() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let client = client_for(&format!("http://127.0.0.1:{port}"), 5_000);
    let registry = registry_for(&client);

    let result = registry
        .call_tool(ToolCallRequest::new("host_ping", json!({})))
        .await
        .unwrap();
    assert!(!result.success);
    assert_eq!(result.error_code().as_deref(), Some("CONNECTION_REFUSED"));
    assert!(result.error.unwrap().contains("office application is running"));

    assert!(!client.check_connection().await);
    assert!(client.connection_status().last_error.is_some());
}

#[tokio::test]
async fn test_concurrent_calls_keep_their_payloads() {
    let host = start_host().await;
    let client = client_for(&host.url(), 5_000);
    let registry = Arc::new(registry_for(&client));

    let calls = (0..32).map(|n| {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let message = format!("message-{n}");
            let result = registry
                .call_tool(ToolCallRequest::with_id(
                    format!("req-{n}"),
                    "host_echo",
                    json!({"message": message}),
                ))
                .await
                .unwrap();
            (n, result)
        })
    });

    for joined in futures::future::join_all(calls).await {
        let (n, result) = joined.unwrap();
        assert!(result.success);
        assert_eq!(result.id, format!("req-{n}"));
        assert_eq!(
            result.content,
            vec![ContentItem::json(json!({"message": format!("message-{n}")}))]
        );
    }

    host.shutdown().await.unwrap();
}

/// Integration test: a timed-out call releases its connection to a stalled host
#[tokio::test]
async fn test_timeout_closes_connection_to_stalled_host() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    // Read the request, never answer, report when the client hangs up
    let (closed_tx, closed_rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut buf = [0u8; 1024];
        loop {
            match socket.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
        let _ = closed_tx.send(());
    });

    let client = client_for(&format!("http://{addr}"), 5_000);
    let err = client
        .invoke("excel.stall", json!({}), Some(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(matches!(err, RelayError::Timeout { budget_ms: 50, .. }));
    assert_eq!(client.pending_count().await, 0);

    tokio::time::timeout(Duration::from_secs(2), closed_rx)
        .await
        .expect("connection still open after the relay gave up")
        .unwrap();
}
