//! Top-level agent graph.
//!
//! Drives one conversation turn through the node sequence:
//!
//! ```text
//! classify ─┬─ clarify ─────────┐
//!           ├─ chitchat-reply ──┤
//!           ├─ unrelated-reply ─┼─→ end
//!           └─ plan → research ⟲ → respond
//! ```
//!
//! The orchestrator owns the [`AgentState`] for the length of the turn and is
//! the only writer of the document corpus. Research steps run strictly in
//! plan order; parallelism lives inside the [`Researcher`].

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use super::capability::Capabilities;
use super::config::AgentConfig;
use super::planner::bound_plan;
use super::prompt::PromptSet;
use super::researcher::Researcher;
use super::router::{Category, Route, route};
use super::state::{AgentState, StepReport, TurnInput, TurnOutput};
use crate::core::{Document, DocumentUpdate, format_documents};
use crate::error::AgentError;
use crate::retrieval::{RetrieverProvider, SearchOptions};

/// Nodes of the agent graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    /// Classify the latest inquiry.
    Classify,
    /// Ask the user for more information.
    Clarify,
    /// Reply to small talk.
    ChitchatReply,
    /// Decline an unrelated inquiry.
    UnrelatedReply,
    /// Build the research plan.
    Plan,
    /// Research the next plan step.
    Research,
    /// Write the cited answer.
    Respond,
    /// Turn complete.
    End,
}

impl From<Route> for Node {
    fn from(route: Route) -> Self {
        match route {
            Route::Clarify => Self::Clarify,
            Route::Plan => Self::Plan,
            Route::ChitchatReply => Self::ChitchatReply,
            Route::UnrelatedReply => Self::UnrelatedReply,
        }
    }
}

/// Loop check after planning and after every research step.
#[must_use]
pub fn check_finished(steps: &VecDeque<String>) -> Node {
    if steps.is_empty() {
        Node::Respond
    } else {
        Node::Research
    }
}

/// Working data of one turn beyond the shared [`AgentState`].
struct Turn {
    state: AgentState,
    forced: Option<(Category, String)>,
    known_collections: Vec<String>,
    plan: Vec<String>,
    research: Vec<StepReport>,
    context_documents: Vec<Document>,
}

/// Runs conversation turns through the agent graph.
pub struct Orchestrator {
    capabilities: Capabilities,
    retrievers: Arc<dyn RetrieverProvider>,
    researcher: Researcher,
    max_context_documents: usize,
}

impl Orchestrator {
    /// Creates an orchestrator from explicit capabilities.
    pub fn new(
        capabilities: Capabilities,
        retrievers: Arc<dyn RetrieverProvider>,
        config: &AgentConfig,
        search: SearchOptions,
    ) -> Self {
        let researcher = Researcher::new(
            Arc::clone(&capabilities.query_generator),
            Arc::clone(&retrievers),
            search,
            config.max_concurrency,
            config.fan_out_policy,
        );
        Self {
            capabilities,
            retrievers,
            researcher,
            max_context_documents: config.max_context_documents,
        }
    }

    /// Creates an orchestrator with LLM-backed capabilities.
    ///
    /// Prompt templates load from [`AgentConfig::prompt_dir`], falling back
    /// to compiled-in defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] if a configured model names an unsupported
    /// provider.
    pub fn from_config(
        config: &AgentConfig,
        retrievers: Arc<dyn RetrieverProvider>,
        search: SearchOptions,
    ) -> Result<Self, AgentError> {
        let prompts = PromptSet::load(config.prompt_dir.as_deref());
        let capabilities = Capabilities::from_config(config, &prompts)?;
        Ok(Self::new(capabilities, retrievers, config, search))
    }

    /// Runs one conversation turn.
    ///
    /// Appends at most one assistant message. Clarification and decline
    /// replies are successful outcomes.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ContractViolation`] when a required reply is
    /// empty, and propagates any leaf capability or retrieval failure. No
    /// step is retried.
    pub async fn run_turn(&self, input: TurnInput) -> Result<TurnOutput, AgentError> {
        let start = Instant::now();
        let forced = input
            .classification_override()
            .map(|(category, justification)| (category, justification.to_string()));

        let mut turn = Turn {
            state: AgentState::new(input.messages),
            forced,
            known_collections: Vec::new(),
            plan: Vec::new(),
            research: Vec::new(),
            context_documents: Vec::new(),
        };

        let mut node = Node::Classify;
        while node != Node::End {
            debug!(?node, "entering node");
            node = match node {
                Node::Classify => self.classify(&mut turn).await?,
                Node::Clarify | Node::ChitchatReply | Node::UnrelatedReply => {
                    Self::direct_reply(&mut turn)?
                }
                Node::Plan => self.plan(&mut turn).await?,
                Node::Research => self.research(&mut turn).await?,
                Node::Respond => self.respond(&mut turn).await?,
                Node::End => Node::End,
            };
        }

        let category = turn
            .state
            .category
            .ok_or_else(|| AgentError::orchestration("turn ended without a classification"))?;
        let elapsed = start.elapsed();
        info!(
            category = %category,
            steps = turn.research.len(),
            documents = turn.context_documents.len(),
            elapsed_ms = elapsed.as_millis(),
            "turn complete"
        );

        Ok(TurnOutput {
            messages: turn.state.messages,
            category,
            justification: turn.state.justification,
            collections: turn.state.collections,
            plan: turn.plan,
            research: turn.research,
            documents: turn.context_documents,
            answer: turn.state.answer,
            elapsed,
        })
    }

    async fn classify(&self, turn: &mut Turn) -> Result<Node, AgentError> {
        turn.known_collections = self.retrievers.list_collections().await?;
        let state = &mut turn.state;

        if let Some((category, justification)) = turn.forced.take() {
            debug!(category = %category, "classification forced by caller");
            state.category = Some(category);
            state.justification = justification;
            state.collections = Vec::new();
            state.direct_response = None;
        } else {
            let mut result = self
                .capabilities
                .classifier
                .classify(&state.messages, &turn.known_collections)
                .await?;
            result.retain_known(&turn.known_collections);
            state.category = Some(result.category);
            state.justification = result.logic;
            state.collections = result.collections;
            state.direct_response = result.response;
        }

        let category = state
            .category
            .ok_or_else(|| AgentError::orchestration("classification produced no category"))?;
        info!(
            category = %category,
            collections = ?state.collections,
            "query classified"
        );
        Ok(route(category).into())
    }

    fn direct_reply(turn: &mut Turn) -> Result<Node, AgentError> {
        let state = &mut turn.state;
        let category = state.category.map_or("unclassified", Category::as_str);
        let reply = state
            .direct_response
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(ToString::to_string)
            .ok_or_else(|| {
                AgentError::contract(format!(
                    "classifier returned no response for category '{category}'"
                ))
            })?;
        state.push_assistant(reply);
        Ok(Node::End)
    }

    async fn plan(&self, turn: &mut Turn) -> Result<Node, AgentError> {
        let steps = bound_plan(self.capabilities.planner.plan(&turn.state.messages).await?);
        let state = &mut turn.state;

        state.documents.merge(DocumentUpdate::Clear);
        state.question = state.latest_question();
        if state.collections.is_empty() {
            debug!(
                collections = ?turn.known_collections,
                "no candidate collections, searching all"
            );
            state.collections.clone_from(&turn.known_collections);
        }
        state.steps = steps.iter().cloned().collect();
        info!(steps = steps.len(), question = %state.question, "research plan created");
        turn.plan = steps;

        Ok(check_finished(&state.steps))
    }

    async fn research(&self, turn: &mut Turn) -> Result<Node, AgentError> {
        let state = &mut turn.state;
        let Some(step) = state.steps.front().cloned() else {
            return Ok(Node::Respond);
        };

        let researched = self.researcher.run(&step, &state.collections).await?;
        let found = researched.documents.len();
        let added = state
            .documents
            .merge(DocumentUpdate::documents(researched.documents.into_vec()));
        state.steps.pop_front();

        info!(
            step_index = turn.research.len(),
            found,
            added,
            corpus = state.documents.len(),
            remaining = state.steps.len(),
            "research step merged"
        );
        turn.research.push(StepReport {
            step,
            queries: researched.queries,
            documents_found: found,
            documents_added: added,
            failed_queries: researched.failed_queries,
        });

        Ok(check_finished(&state.steps))
    }

    async fn respond(&self, turn: &mut Turn) -> Result<Node, AgentError> {
        let state = &mut turn.state;
        let documents: Vec<Document> = state
            .documents
            .iter()
            .take(self.max_context_documents)
            .cloned()
            .collect();
        let context = format_documents(&documents);

        let answer = self
            .capabilities
            .synthesizer
            .respond(&state.messages, &context, &state.collections)
            .await?;
        if answer.trim().is_empty() {
            return Err(AgentError::contract("synthesizer returned an empty answer"));
        }

        info!(documents = documents.len(), "answer synthesized");
        state.push_assistant(answer.clone());
        state.answer = Some(answer);
        turn.context_documents = documents;
        Ok(Node::End)
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("capabilities", &self.capabilities)
            .field("researcher", &self.researcher)
            .field("max_context_documents", &self.max_context_documents)
            .finish_non_exhaustive()
    }
}
