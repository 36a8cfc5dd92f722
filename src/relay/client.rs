//! Relay Client - forwards tool calls to the office host
//!
//! Each request is handed to a spawned transport task and parked in a pending
//! table under its request id. The waiter gives up after the budget and aborts
//! the task; an answer that races in is delivered only if that exact entry is
//! still waiting.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError};
use std::time::{Duration, Instant};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use serde_json::{Value, json};
use tokio::sync::{Mutex, oneshot};

use crate::envelope::{Envelope, elapsed_ms};
use crate::error::{RelayError, Result};
use crate::id::{derive_request_id, generate_request_id};

use super::transport::{HttpTransport, RelayRequest, RelayTransport};

/// Configuration for the relay client
#[derive(Debug, Clone)]
pub struct RelayClientConfig {
    /// Office host listener, e.g. `http://127.0.0.1:8765`
    pub base_url: String,
    /// Optional path prefix appended to `base_url`
    pub namespace: Option<String>,
    /// Default per-request budget in milliseconds
    pub timeout_ms: u64,
    /// Budget for `check_connection` pings
    pub ping_timeout_ms: u64,
}

impl Default for RelayClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8765".to_string(),
            namespace: None,
            timeout_ms: 30_000,
            ping_timeout_ms: 5_000,
        }
    }
}

impl RelayClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }
}

/// Advisory view of the host connection
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    /// RFC 3339 time of the last successful exchange
    pub last_heartbeat: Option<String>,
    /// Reason the last failed exchange failed
    pub last_error: Option<String>,
    pub endpoint: String,
}

#[derive(Debug, Default)]
struct Health {
    connected: bool,
    last_heartbeat: Option<DateTime<Utc>>,
    last_error: Option<String>,
}

struct PendingRequest {
    seq: u64,
    sender: oneshot::Sender<Result<Envelope>>,
}

type PendingTable = Arc<Mutex<HashMap<String, PendingRequest>>>;

/// Client side of the relay
pub struct RelayClient {
    config: RelayClientConfig,
    transport: Arc<dyn RelayTransport>,
    pending: PendingTable,
    next_seq: AtomicU64,
    health: std::sync::Mutex<Health>,
}

impl RelayClient {
    /// Create a client speaking HTTP to `config.base_url`
    pub fn new(config: RelayClientConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.base_url, config.namespace.as_deref())?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client over an arbitrary transport
    pub fn with_transport(config: RelayClientConfig, transport: Arc<dyn RelayTransport>) -> Self {
        Self {
            config,
            transport,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_seq: AtomicU64::new(1),
            health: std::sync::Mutex::new(Health::default()),
        }
    }

    pub fn config(&self) -> &RelayClientConfig {
        &self.config
    }

    pub fn endpoint(&self) -> String {
        self.transport.endpoint()
    }

    /// Default budget for `invoke`
    pub fn default_timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    /// Send `method` with a fresh request id
    pub async fn invoke(&self, method: &str, params: Value, timeout: Option<Duration>) -> Result<Envelope> {
        self.invoke_with_id(generate_request_id(), method, params, timeout).await
    }

    /// Send `method` correlated under `request_id`
    ///
    /// If the id is already in flight a derived id is used instead. A failed
    /// envelope from the host is returned as `Ok`, its code untouched.
    pub async fn invoke_with_id(
        &self,
        request_id: String,
        method: &str,
        params: Value,
        timeout: Option<Duration>,
    ) -> Result<Envelope> {
        let started = Instant::now();
        let budget = timeout.unwrap_or_else(|| self.default_timeout());
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();

        let request_id = {
            let mut pending = self.pending.lock().await;
            let mut id = request_id;
            while pending.contains_key(&id) {
                id = derive_request_id(&id);
            }
            pending.insert(id.clone(), PendingRequest { seq, sender: tx });
            id
        };

        debug!("Relaying {} as {} (budget {:?})", method, request_id, budget);
        let request = RelayRequest::new(method, params, request_id.clone()).with_budget(budget);
        let task = tokio::spawn(deliver(
            Arc::clone(&self.transport),
            Arc::clone(&self.pending),
            request,
            seq,
        ));

        let outcome = match tokio::time::timeout(budget, rx).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(RelayError::Protocol("transport task ended without a response".into())),
            Err(_) => {
                // Abandon the exchange; dropping the request closes its connection
                task.abort();
                let mut pending = self.pending.lock().await;
                if pending.get(&request_id).is_some_and(|p| p.seq == seq) {
                    pending.remove(&request_id);
                }
                Err(RelayError::Timeout {
                    elapsed_ms: elapsed_ms(Some(started)),
                    budget_ms: budget.as_millis() as u64,
                })
            }
        };

        match &outcome {
            Ok(_) => self.mark_connected(),
            Err(err) => {
                warn!("Relay call {} ({}) failed: {}", method, request_id, err);
                self.mark_error(err.to_string());
            }
        }
        outcome
    }

    /// Ping the host; never fails, the reason lands in `connection_status`
    pub async fn check_connection(&self) -> bool {
        let budget = Duration::from_millis(self.config.ping_timeout_ms);
        let result = self.invoke("ping", json!({}), Some(budget)).await;
        let connected = match result {
            Ok(envelope) if envelope.success => true,
            Ok(envelope) => {
                let reason = envelope
                    .error
                    .map(|e| e.summary())
                    .unwrap_or_else(|| "ping failed".to_string());
                self.mark_error(reason);
                false
            }
            Err(_) => false,
        };

        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        if health.connected != connected {
            info!(
                "Office host at {} is {}",
                self.transport.endpoint(),
                if connected { "reachable" } else { "unreachable" }
            );
        }
        health.connected = connected;
        connected
    }

    pub fn connection_status(&self) -> ConnectionStatus {
        let health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        ConnectionStatus {
            connected: health.connected,
            last_heartbeat: health
                .last_heartbeat
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Millis, true)),
            last_error: health.last_error.clone(),
            endpoint: self.transport.endpoint(),
        }
    }

    /// Requests still waiting for an answer
    pub async fn pending_count(&self) -> usize {
        self.pending.lock().await.len()
    }

    fn mark_connected(&self) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        health.connected = true;
        health.last_heartbeat = Some(Utc::now());
        health.last_error = None;
    }

    fn mark_error(&self, reason: String) {
        let mut health = self.health.lock().unwrap_or_else(PoisonError::into_inner);
        health.last_error = Some(reason);
    }
}

/// Transport task: send, then hand the answer to the matching waiter
async fn deliver(transport: Arc<dyn RelayTransport>, pending: PendingTable, request: RelayRequest, seq: u64) {
    let expected = request.request_id.clone().unwrap_or_default();
    let outcome = transport.send(request).await.and_then(|envelope| match envelope.request_id.as_deref() {
        Some(got) if got != expected => Err(RelayError::Protocol(format!(
            "response correlation mismatch: sent {}, got {}",
            expected, got
        ))),
        _ => Ok(envelope),
    });

    let mut pending = pending.lock().await;
    match pending.get(&expected) {
        Some(entry) if entry.seq == seq => {
            if let Some(entry) = pending.remove(&expected) {
                let _ = entry.sender.send(outcome);
            }
        }
        _ => debug!("Dropping late response for {}", expected),
    }
}
