//! CLI module for office-relay - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
