//! Remote Router - action table and dispatch for the office host process
//!
//! This module provides:
//! - Validated action names
//! - The action handler trait and closure adapter
//! - The router with its built-in system actions

mod action;
mod dispatch;

pub use action::{ActionContext, ActionHandler, ActionName, ActionResult, FnAction, action_fn, module_of};
pub use dispatch::{RemoteRouter, SystemAction};
