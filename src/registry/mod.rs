//! Tool Registry
//!
//! Agent-facing side of the relay: definitions, argument validation and
//! dispatch to tool handlers.

mod catalog;
mod definition;
mod table;
mod types;

pub use catalog::{CatalogEntry, CatalogParam, CatalogTool, ToolCatalog};
pub use definition::{InputSchema, ParamSchema, ParamType, ToolCategory, ToolDefinition};
pub use table::{RegisteredTool, ToolContext, ToolHandler, ToolRegistry, tool_fn};
pub use types::{ContentItem, ToolCallRequest, ToolCallResult};
