//! Relay Client
//!
//! Carries tool calls from the agent-facing process to the office host and
//! brings the host's envelope back.

mod client;
mod tools;
mod transport;

pub use client::{ConnectionStatus, RelayClient, RelayClientConfig};
pub use tools::{ConnectionStatusTool, RELAY_STATUS_TOOL, RelayToolHandler, register_relay_tools, relay_tools};
pub use transport::{HttpTransport, InProcessTransport, RelayRequest, RelayTransport, endpoint_url};
