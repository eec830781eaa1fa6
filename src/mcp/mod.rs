//! MCP (Model Context Protocol) server for docqa.
//!
//! Lets external agents ask documentation questions through the full agent
//! graph and browse the loaded collections.
//!
//! # Feature Gate
//!
//! This module requires the `mcp` feature flag:
//! ```toml
//! [dependencies]
//! docqa-rs = { version = "...", features = ["mcp"] }
//! ```
//!
//! # Architecture
//!
//! ```text
//! MCP Client
//!   ↓ ask(question, conversation)
//! DocQaMcpServer
//!   ↓
//! Orchestrator::run_turn()
//!   ├── classify → direct reply
//!   └── plan → research (parallel retrieval) → respond
//!   ↓
//! TurnOutput JSON → MCP Client
//! ```

pub mod params;
pub mod server;
pub mod transport;

pub use params::{AskParams, MessageParam};
pub use server::DocQaMcpServer;
pub use transport::{serve_sse, serve_stdio};
