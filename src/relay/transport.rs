//! Transports carrying relay requests to the office host

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::envelope::Envelope;
use crate::error::{RelayError, Result};
use crate::router::RemoteRouter;

/// Outbound request body: `{action, params, requestId}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RelayRequest {
    /// Remote action, e.g. `excel.getCellValue`
    #[serde(rename = "action")]
    pub method: String,
    #[serde(default)]
    pub params: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Time the caller is willing to wait; never sent on the wire
    #[serde(skip)]
    pub budget: Option<Duration>,
}

impl RelayRequest {
    pub fn new(method: impl Into<String>, params: Value, request_id: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            params,
            request_id: Some(request_id.into()),
            budget: None,
        }
    }

    pub fn with_budget(mut self, budget: Duration) -> Self {
        self.budget = Some(budget);
        self
    }
}

/// Something that can deliver a request and bring back an envelope
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Deliver one request
    ///
    /// Unreachable host → `RelayError::Connection`; an undecodable body or an
    /// envelope breaking its invariant → `RelayError::Protocol`. A decodable
    /// failed envelope is `Ok`.
    async fn send(&self, request: RelayRequest) -> Result<Envelope>;

    /// Human-readable target, for logs and status
    fn endpoint(&self) -> String;
}

/// Join base URL and optional namespace prefix
pub fn endpoint_url(base_url: &str, namespace: Option<&str>) -> String {
    let base = base_url.trim_end_matches('/');
    match namespace.map(|n| n.trim_matches('/')).filter(|n| !n.is_empty()) {
        Some(ns) => format!("{}/{}", base, ns),
        None => base.to_string(),
    }
}

/// HTTP POST to the office host's embedded listener
pub struct HttpTransport {
    client: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(base_url: &str, namespace: Option<&str>) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client,
            url: endpoint_url(base_url, namespace),
        })
    }

    fn send_error(&self, err: reqwest::Error, request: &RelayRequest, started: Instant) -> RelayError {
        match request.budget {
            Some(budget) if err.is_timeout() => RelayError::Timeout {
                elapsed_ms: started.elapsed().as_millis() as u64,
                budget_ms: budget.as_millis() as u64,
            },
            _ => RelayError::Connection {
                url: self.url.clone(),
                reason: err.to_string(),
            },
        }
    }
}

#[async_trait]
impl RelayTransport for HttpTransport {
    async fn send(&self, request: RelayRequest) -> Result<Envelope> {
        let started = Instant::now();
        let mut builder = self
            .client
            .post(&self.url)
            .header("content-type", "application/json")
            .json(&request);
        // Bounds the whole exchange, so a stalled host cannot hold the socket
        if let Some(budget) = request.budget {
            builder = builder.timeout(budget);
        }

        let response = builder.send().await.map_err(|e| self.send_error(e, &request, started))?;

        // The host answers 500 for failed envelopes; the body is authoritative
        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|e| self.send_error(e, &request, started))?;
        debug!("{} answered HTTP {} ({} bytes)", self.url, status, body.len());

        let envelope: Envelope = serde_json::from_slice(&body).map_err(|e| {
            RelayError::Protocol(format!("undecodable response (HTTP {}): {}", status.as_u16(), e))
        })?;
        envelope.validate().map_err(RelayError::Protocol)?;
        Ok(envelope)
    }

    fn endpoint(&self) -> String {
        self.url.clone()
    }
}

/// Dispatches straight into a router in the same process
pub struct InProcessTransport {
    router: Arc<RemoteRouter>,
}

impl InProcessTransport {
    pub fn new(router: Arc<RemoteRouter>) -> Self {
        Self { router }
    }
}

#[async_trait]
impl RelayTransport for InProcessTransport {
    async fn send(&self, request: RelayRequest) -> Result<Envelope> {
        let envelope = self
            .router
            .dispatch(
                Some(&request.method),
                request.params,
                request.request_id,
                Some(Instant::now()),
            )
            .await;
        envelope.validate().map_err(RelayError::Protocol)?;
        Ok(envelope)
    }

    fn endpoint(&self) -> String {
        "in-process".to_string()
    }
}
