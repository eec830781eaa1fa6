//! CLI layer for docqa.
//!
//! Provides the command-line interface using clap, with commands for
//! asking questions, chatting, and managing document collections.

pub mod commands;
pub mod output;
pub mod parser;

pub use commands::{execute, run_chat};
pub use output::OutputFormat;
#[cfg(feature = "mcp")]
pub use parser::McpCommands;
pub use parser::{AgentArgs, Cli, CollectionCommands, Commands};
