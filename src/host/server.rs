//! HTTP shim feeding the Remote Router
//!
//! A single path-independent endpoint: every POST is an action request, GET is
//! a status probe, OPTIONS answers CORS preflight before any body parsing.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{Method, StatusCode, header};
use axum::response::{IntoResponse, Json, Response};
use log::{debug, info, warn};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::envelope::{Envelope, EnvelopeError, ErrorKey};
use crate::error::{RelayError, Result};
use crate::router::{RemoteRouter, SystemAction};

const CORS_HEADERS: [(header::HeaderName, &str); 3] = [
    (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
    (header::ACCESS_CONTROL_ALLOW_METHODS, "GET, POST, OPTIONS"),
    (header::ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type"),
];

/// Inbound body `{action, params?, requestId?}`, read leniently
#[derive(Debug, Clone, PartialEq)]
pub struct InboundRequest {
    pub action: Option<String>,
    pub params: Value,
    pub request_id: Option<String>,
}

impl InboundRequest {
    /// Parse a request body; malformed or non-object JSON reads as `{}`
    pub fn parse(body: &[u8]) -> Self {
        let value = match serde_json::from_slice::<Value>(body) {
            Ok(value @ Value::Object(_)) => value,
            Ok(_) => json!({}),
            Err(e) => {
                if !body.is_empty() {
                    debug!("Treating malformed request body as {{}}: {}", e);
                }
                json!({})
            }
        };
        let params = match value.get("params") {
            None | Some(Value::Null) => json!({}),
            Some(params) => params.clone(),
        };
        Self {
            action: value.get("action").and_then(Value::as_str).map(String::from),
            params,
            request_id: value.get("requestId").and_then(Value::as_str).map(String::from),
        }
    }
}

/// Build the axum app answering on every path
pub fn app(router: Arc<RemoteRouter>) -> Router {
    Router::new().fallback(handle).with_state(router)
}

async fn handle(State(router): State<Arc<RemoteRouter>>, method: Method, body: Bytes) -> Response {
    let started = Instant::now();

    let (status, envelope) = match method {
        Method::OPTIONS => return (StatusCode::NO_CONTENT, CORS_HEADERS).into_response(),
        Method::POST => {
            let request = InboundRequest::parse(&body);
            let envelope = router
                .dispatch(
                    request.action.as_deref(),
                    request.params,
                    request.request_id,
                    Some(started),
                )
                .await;
            (status_of(&envelope), envelope)
        }
        Method::GET => {
            let envelope = router
                .dispatch(Some(SystemAction::Status.name()), json!({}), None, Some(started))
                .await;
            (status_of(&envelope), envelope)
        }
        other => {
            warn!("Rejecting HTTP {} request", other);
            let error = EnvelopeError::new(ErrorKey::ParamInvalid)
                .with_message(format!("HTTP method {} is not supported", other))
                .with_suggestion("Send actions as POST with a JSON body");
            (StatusCode::METHOD_NOT_ALLOWED, Envelope::from_error(error, None, Some(started)))
        }
    };

    (status, CORS_HEADERS, Json(envelope)).into_response()
}

fn status_of(envelope: &Envelope) -> StatusCode {
    StatusCode::from_u16(envelope.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
}

/// Bind the listener for `listen` (e.g. `127.0.0.1:8765`)
pub async fn bind(listen: &str) -> Result<TcpListener> {
    TcpListener::bind(listen)
        .await
        .map_err(|e| RelayError::Config(format!("failed to bind {}: {}", listen, e)))
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(listener: TcpListener, router: Arc<RemoteRouter>, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Office host listening on http://{} ({} actions)", addr, router.action_count());
    axum::serve(listener, app(router))
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Office host on {} stopped", addr);
    Ok(())
}

/// A server running in the background
pub struct HostHandle {
    pub addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<Result<()>>,
}

impl HostHandle {
    /// Base URL clients should post to
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Stop accepting connections and wait for the server task
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        self.task
            .await
            .map_err(|e| RelayError::Handler(format!("host server task failed: {}", e)))?
    }
}

/// Spawn the server on an already-bound listener
pub fn spawn(listener: TcpListener, router: Arc<RemoteRouter>) -> Result<HostHandle> {
    let addr = listener.local_addr()?;
    let (tx, rx) = oneshot::channel::<()>();
    let task = tokio::spawn(serve(listener, router, async move {
        let _ = rx.await;
    }));
    Ok(HostHandle {
        addr,
        shutdown: Some(tx),
        task,
    })
}
