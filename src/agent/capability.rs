//! Leaf capabilities consumed by the agent graph.
//!
//! The orchestrator and researcher depend only on these traits. The
//! LLM-backed agents implement them; tests substitute fakes.

use std::sync::Arc;

use async_trait::async_trait;

use super::client::{ModelId, create_provider};
use super::config::AgentConfig;
use super::message::ChatMessage;
use super::planner::PlannerAgent;
use super::prompt::PromptSet;
use super::queries::QueryGeneratorAgent;
use super::router::{RouterAgent, RouterResult};
use super::synthesizer::SynthesizerAgent;
use crate::error::AgentError;

/// Classifies the latest inquiry in a conversation.
#[async_trait]
pub trait QueryClassifier: Send + Sync {
    /// Returns the category and, outside research, the direct reply.
    async fn classify(
        &self,
        messages: &[ChatMessage],
        collections: &[String],
    ) -> Result<RouterResult, AgentError>;
}

/// Builds a research plan from a conversation.
#[async_trait]
pub trait PlanBuilder: Send + Sync {
    /// Returns ordered research steps.
    async fn plan(&self, messages: &[ChatMessage]) -> Result<Vec<String>, AgentError>;
}

/// Expands a research step into search queries.
#[async_trait]
pub trait QueryGenerator: Send + Sync {
    /// Returns search queries for `step`.
    async fn generate(&self, step: &str, collections: &[String]) -> Result<Vec<String>, AgentError>;
}

/// Writes the final cited answer.
#[async_trait]
pub trait ResponseSynthesizer: Send + Sync {
    /// Returns the answer text for a conversation and formatted context.
    async fn respond(
        &self,
        messages: &[ChatMessage],
        context: &str,
        collections: &[String],
    ) -> Result<String, AgentError>;
}

/// The four leaf capabilities of one agent graph.
#[derive(Clone)]
pub struct Capabilities {
    /// Query classifier.
    pub classifier: Arc<dyn QueryClassifier>,
    /// Plan builder.
    pub planner: Arc<dyn PlanBuilder>,
    /// Query generator used by the researcher.
    pub query_generator: Arc<dyn QueryGenerator>,
    /// Response synthesizer.
    pub synthesizer: Arc<dyn ResponseSynthesizer>,
}

impl Capabilities {
    /// Builds LLM-backed capabilities from configuration and prompts.
    ///
    /// The classifier, planner and query generator use `query_model`; the
    /// synthesizer uses `response_model`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] for malformed model identifiers and
    /// [`AgentError::UnsupportedProvider`] for unknown providers.
    pub fn from_config(config: &AgentConfig, prompts: &PromptSet) -> Result<Self, AgentError> {
        let query_model = ModelId::parse(&config.query_model)?;
        let response_model = ModelId::parse(&config.response_model)?;

        let query_provider = create_provider(config, &query_model)?;
        let response_provider = if response_model.provider == query_model.provider {
            Arc::clone(&query_provider)
        } else {
            create_provider(config, &response_model)?
        };

        Ok(Self {
            classifier: Arc::new(RouterAgent::new(
                Arc::clone(&query_provider),
                query_model.model.clone(),
                config.query_max_tokens,
                prompts.router.clone(),
            )),
            planner: Arc::new(PlannerAgent::new(
                Arc::clone(&query_provider),
                query_model.model.clone(),
                config.query_max_tokens,
                prompts.research_plan.clone(),
            )),
            query_generator: Arc::new(QueryGeneratorAgent::new(
                query_provider,
                query_model.model,
                config.query_max_tokens,
                prompts.generate_queries.clone(),
            )),
            synthesizer: Arc::new(SynthesizerAgent::new(
                response_provider,
                response_model.model,
                config.response_max_tokens,
                prompts.response.clone(),
            )),
        })
    }
}

impl std::fmt::Debug for Capabilities {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Capabilities").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_with_defaults() {
        let config = AgentConfig::builder()
            .api_key("test")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert!(Capabilities::from_config(&config, &PromptSet::defaults()).is_ok());
    }

    #[test]
    fn test_from_config_rejects_unknown_provider() {
        let config = AgentConfig::builder()
            .api_key("test")
            .response_model("local/llama")
            .build()
            .unwrap_or_else(|_| unreachable!());
        let result = Capabilities::from_config(&config, &PromptSet::defaults());
        assert!(matches!(result, Err(AgentError::UnsupportedProvider { .. })));
    }
}
