//! Query classifier agent and routing.
//!
//! The classifier assigns each turn one [`Category`]; [`route`] maps the
//! category to the next node of the agent graph.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::capability::QueryClassifier;
use super::message::ChatMessage;
use super::prompt::{collection_list, render_template};
use super::provider::LlmProvider;
use super::structured::StructuredOutput;
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Maximum candidate collections kept from a classification.
pub const MAX_CANDIDATE_COLLECTIONS: usize = 2;

/// Classification of a user inquiry.
///
/// Serialized with the classifier's wire names; the descriptive names are
/// accepted as aliases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum Category {
    /// More information is needed before research can start.
    #[serde(rename = "more-info", alias = "needs-more-info")]
    NeedsMoreInfo,
    /// Answerable from the documentation.
    #[serde(rename = "related", alias = "on-topic")]
    OnTopic,
    /// Small talk.
    #[serde(rename = "chitchat", alias = "off-topic-chitchat")]
    OffTopicChitchat,
    /// Unrelated to the documentation.
    #[serde(rename = "unrelated")]
    Unrelated,
}

impl Category {
    /// All categories.
    pub const ALL: [Self; 4] = [
        Self::NeedsMoreInfo,
        Self::OnTopic,
        Self::OffTopicChitchat,
        Self::Unrelated,
    ];

    /// Wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NeedsMoreInfo => "more-info",
            Self::OnTopic => "related",
            Self::OffTopicChitchat => "chitchat",
            Self::Unrelated => "unrelated",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.trim().to_ascii_lowercase()))
            .map_err(|_| AgentError::config(format!("unknown category '{s}'")))
    }
}

/// Node the graph moves to after classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    /// Ask the user a follow-up question.
    Clarify,
    /// Build a research plan.
    Plan,
    /// Reply to small talk.
    ChitchatReply,
    /// Decline an unrelated inquiry.
    UnrelatedReply,
}

/// Maps a category to the next node.
#[must_use]
pub const fn route(category: Category) -> Route {
    match category {
        Category::NeedsMoreInfo => Route::Clarify,
        Category::OnTopic => Route::Plan,
        Category::OffTopicChitchat => Route::ChitchatReply,
        Category::Unrelated => Route::UnrelatedReply,
    }
}

/// Structured reply of the query classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RouterResult {
    /// Inquiry category.
    #[serde(rename = "type")]
    pub category: Category,
    /// Why the classifier chose this category.
    #[serde(default)]
    pub logic: String,
    /// Up to two collections likely to hold the answer.
    #[serde(default)]
    pub collections: Vec<String>,
    /// Message for the user when no research is needed.
    #[serde(default)]
    pub response: Option<String>,
}

impl StructuredOutput for RouterResult {
    const SCHEMA_NAME: &'static str = "router_result";
    const DESCRIPTION: Option<&'static str> =
        Some("Classification of the user's inquiry and, when no research is needed, the reply.");
}

impl RouterResult {
    /// Drops candidate collections not in `known` and caps the list.
    ///
    /// An empty `known` list disables the membership check.
    pub fn retain_known(&mut self, known: &[String]) {
        let before = self.collections.len();
        if !known.is_empty() {
            self.collections.retain(|c| known.contains(c));
        }
        let mut seen = Vec::with_capacity(self.collections.len());
        self.collections.retain(|c| {
            if seen.contains(c) {
                false
            } else {
                seen.push(c.clone());
                true
            }
        });
        self.collections.truncate(MAX_CANDIDATE_COLLECTIONS);

        if self.collections.len() < before {
            warn!(
                kept = self.collections.len(),
                proposed = before,
                "dropped candidate collections"
            );
        }
    }
}

/// LLM-backed query classifier.
pub struct RouterAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    template: String,
}

impl RouterAgent {
    /// Creates a classifier from a provider, model name and prompt template.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        max_tokens: u32,
        template: String,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            template,
        }
    }
}

#[async_trait]
impl Agent for RouterAgent {
    fn name(&self) -> &'static str {
        "router"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait]
impl QueryClassifier for RouterAgent {
    async fn classify(
        &self,
        messages: &[ChatMessage],
        collections: &[String],
    ) -> Result<RouterResult, AgentError> {
        let list = collection_list(collections);
        let system_prompt = render_template(&self.template, &[("collection_list", &list)]);
        let (result, _) =
            execute_structured::<RouterResult>(self, self.provider.as_ref(), &system_prompt, messages)
                .await?;
        Ok(result)
    }
}
