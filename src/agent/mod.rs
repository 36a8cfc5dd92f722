//! Agent-facing stdio server

mod messages;
mod server;

pub use messages::{
    INTERNAL_ERROR, INVALID_PARAMS, INVALID_REQUEST, METHOD_NOT_FOUND, PARSE_ERROR, RpcError, RpcRequest, RpcResponse,
};
pub use server::{AgentServer, PROTOCOL_VERSION};
