//! office-relay - command relay between an AI agent and an office application
//!
//! An agent talks JSON-RPC to the [`agent`] server; tool calls are validated by
//! the [`registry`], forwarded by the [`relay`] client over HTTP, and resolved
//! on the office host by the [`router`]. Both hops speak the same [`envelope`].

pub mod agent;
pub mod config;
pub mod envelope;
pub mod error;
pub mod host;
pub mod id;
pub mod registry;
pub mod relay;
pub mod router;

pub use envelope::{Envelope, EnvelopeError, ErrorKey, ErrorKind};
pub use error::{RelayError, Result};
