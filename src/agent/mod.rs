//! Documentation question-answering agent.
//!
//! A turn runs through a small graph of LLM-backed steps. Retrieval is
//! reached through the [`crate::retrieval`] traits, and every LLM call goes
//! through a pluggable [`LlmProvider`] backed by OpenAI-compatible APIs.
//!
//! # Architecture
//!
//! ```text
//! Conversation → Orchestrator
//!   ├── RouterAgent (classifies, picks collections)
//!   │   └── clarify / chitchat / unrelated → direct reply
//!   ├── PlannerAgent (≤3 research steps)
//!   ├── for each step: Researcher
//!   │   ├── QueryGeneratorAgent (3 queries)
//!   │   ├── Fan-out → one retrieval task per query
//!   │   └── Fan-in → deduplicated corpus
//!   └── SynthesizerAgent → cited answer
//! ```

pub mod capability;
pub mod client;
pub mod config;
pub mod message;
pub mod orchestrator;
pub mod planner;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod queries;
pub mod researcher;
pub mod router;
pub mod state;
pub mod structured;
pub mod synthesizer;
pub mod traits;

#[cfg(test)]
pub(crate) mod testing;

pub use capability::{
    Capabilities, PlanBuilder, QueryClassifier, QueryGenerator, ResponseSynthesizer,
};
pub use client::{ModelId, create_provider};
pub use config::{AgentConfig, FanOutPolicy};
pub use message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
pub use orchestrator::{Node, Orchestrator, check_finished};
pub use planner::PlannerAgent;
pub use prompt::PromptSet;
pub use provider::LlmProvider;
pub use queries::QueryGeneratorAgent;
pub use researcher::{Researcher, ResearcherState};
pub use router::{Category, Route, RouterAgent, RouterResult, route};
pub use state::{AgentState, StepReport, TurnInput, TurnOutput};
pub use synthesizer::SynthesizerAgent;
pub use traits::{Agent, AgentResponse, execute_structured};
