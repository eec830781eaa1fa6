//! # docqa
//!
//! Retrieval-augmented question answering over documentation collections.
//!
//! A conversation turn is classified, then either answered directly
//! (clarification, small talk, decline) or researched: a short plan is
//! built, each step fans out parallel retrieval over the candidate
//! collections, and the deduplicated documents are handed to a response
//! model that writes a cited answer.
//!
//! ## Example
//!
//! ```no_run
//! use docqa::agent::message::user_message;
//! use docqa::agent::{AgentConfig, Orchestrator, TurnInput};
//! use docqa::retrieval::{RetrieverConfig, create_retriever_provider};
//!
//! # async fn run() -> docqa::Result<()> {
//! let config = AgentConfig::from_env()?;
//! let retrieval = RetrieverConfig::from_env();
//! let retrievers = create_retriever_provider(&retrieval)?;
//! let graph = Orchestrator::from_config(&config, retrievers, retrieval.search_options())?;
//!
//! let input = TurnInput::new(vec![user_message("How do I configure logging?")]);
//! let output = graph.run_turn(input).await?;
//! assert!(output.reply().is_some());
//! # Ok(())
//! # }
//! ```

pub mod agent;
pub mod cli;
pub mod core;
pub mod error;
pub mod retrieval;

#[cfg(feature = "mcp")]
pub mod mcp;

pub use agent::{AgentConfig, Orchestrator, TurnInput, TurnOutput};
pub use core::{Document, DocumentCorpus, DocumentUpdate, format_documents, reduce_documents};
pub use error::{Error, Result};
