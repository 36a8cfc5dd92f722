//! Office-host side: HTTP listener in front of the Remote Router

mod actions;
mod server;

pub use actions::{MAX_DELAY_MS, diagnostic_actions, register_diagnostic_actions};
pub use server::{HostHandle, InboundRequest, app, bind, serve, spawn};
