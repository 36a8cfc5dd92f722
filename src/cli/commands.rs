//! CLI command definitions using clap.
//!
//! - agent: stdio tool server for an AI agent (default)
//! - host: HTTP listener standing in for the office add-in
//! - status / tools / call: one-shot diagnostics

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// office-relay - relays agent tool calls to an office application
#[derive(Parser, Debug)]
#[command(name = "office-relay")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Serve tools to an agent over stdio JSON-RPC
    Agent,

    /// Run an office host listener with the diagnostic echo actions
    Host {
        /// Address to listen on (overrides host.listen)
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Check whether the office host is reachable
    Status,

    /// List the tools an agent would see
    Tools {
        /// Only show tools in this category
        #[arg(short = 't', long)]
        category: Option<String>,
    },

    /// Call a tool once and print the result
    Call {
        /// Tool name
        tool: String,

        /// Arguments as a JSON object
        arguments: Option<String>,
    },
}
