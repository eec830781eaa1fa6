//! Turn state, input and report types for the agent graph.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::message::{ChatMessage, Role, last_user_message};
use super::router::Category;
use crate::core::{Document, DocumentCorpus};

/// Mutable state of one agent graph execution.
///
/// Owned by the orchestrator for the length of a turn. The document corpus
/// only changes through [`DocumentCorpus::merge`].
#[derive(Debug, Clone, Default)]
pub struct AgentState {
    /// Conversation, append-only.
    pub messages: Vec<ChatMessage>,
    /// Category from the latest classification.
    pub category: Option<Category>,
    /// Classifier justification.
    pub justification: String,
    /// Candidate collections for research.
    pub collections: Vec<String>,
    /// Reply for non-research categories.
    pub direct_response: Option<String>,
    /// Latest user question, refreshed when a plan is created.
    pub question: String,
    /// Remaining research steps, consumed from the front.
    pub steps: VecDeque<String>,
    /// Documents accumulated by research.
    pub documents: DocumentCorpus,
    /// Final answer on the research path.
    pub answer: Option<String>,
}

impl AgentState {
    /// Creates state for a conversation.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Content of the most recent user message, or empty.
    #[must_use]
    pub fn latest_question(&self) -> String {
        last_user_message(&self.messages)
            .map(|m| m.content.clone())
            .unwrap_or_default()
    }

    /// Appends an assistant message.
    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage {
            role: Role::Assistant,
            content: content.into(),
        });
    }
}

/// Input for one conversation turn.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TurnInput {
    /// Conversation so far, ending with the user's latest message.
    pub messages: Vec<ChatMessage>,
    /// Forced category. Together with `justification` it skips the classifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    /// Forced justification.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub justification: Option<String>,
}

impl TurnInput {
    /// Creates input for a conversation.
    #[must_use]
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// Forces the classification, bypassing the classifier call.
    #[must_use]
    pub fn with_classification(mut self, category: Category, justification: impl Into<String>) -> Self {
        self.category = Some(category);
        self.justification = Some(justification.into());
        self
    }

    /// Returns the forced classification if both parts are set and non-empty.
    #[must_use]
    pub fn classification_override(&self) -> Option<(Category, &str)> {
        match (self.category, self.justification.as_deref()) {
            (Some(category), Some(justification)) if !justification.is_empty() => {
                Some((category, justification))
            }
            _ => None,
        }
    }
}

/// What happened in one research step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StepReport {
    /// Step description from the plan.
    pub step: String,
    /// Queries generated for the step.
    pub queries: Vec<String>,
    /// Documents the researcher returned, before merging into the corpus.
    pub documents_found: usize,
    /// Documents newly added to the corpus.
    pub documents_added: usize,
    /// Queries whose retrieval failed under the best-effort policy.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_queries: Vec<String>,
}

/// Result of one conversation turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutput {
    /// Updated conversation.
    pub messages: Vec<ChatMessage>,
    /// Category the turn was routed by.
    pub category: Category,
    /// Classifier justification.
    pub justification: String,
    /// Collections searched.
    pub collections: Vec<String>,
    /// Research plan as created, before steps were consumed.
    pub plan: Vec<String>,
    /// Per-step research reports, in plan order.
    pub research: Vec<StepReport>,
    /// Documents handed to the synthesizer, in citation order.
    pub documents: Vec<Document>,
    /// Final answer on the research path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Wall-clock time for the turn.
    #[serde(serialize_with = "serialize_duration")]
    pub elapsed: Duration,
}

impl TurnOutput {
    /// The assistant message appended by this turn, if any.
    #[must_use]
    pub fn reply(&self) -> Option<&str> {
        self.messages
            .last()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// Number of researcher invocations.
    #[must_use]
    pub fn research_steps(&self) -> usize {
        self.research.len()
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn serialize_duration<S>(d: &Duration, s: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64())
}
