//! Search query generator agent.
//!
//! Expands one research step into a few diversified search queries.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::capability::QueryGenerator;
use super::message::user_message;
use super::prompt::render_template;
use super::provider::LlmProvider;
use super::structured::StructuredOutput;
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Number of queries generated per research step.
pub const QUERIES_PER_STEP: usize = 3;

/// Structured reply of the query generator.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedQueries {
    /// Search queries for one research step.
    #[serde(default)]
    pub queries: Vec<String>,
}

impl StructuredOutput for GeneratedQueries {
    const SCHEMA_NAME: &'static str = "generated_queries";
    const DESCRIPTION: Option<&'static str> = Some("Exactly 3 diverse search queries.");
}

/// Drops blank and duplicate queries and caps the list at [`QUERIES_PER_STEP`].
#[must_use]
pub fn bound_queries(queries: Vec<String>) -> Vec<String> {
    let mut kept: Vec<String> = Vec::with_capacity(QUERIES_PER_STEP);
    for query in queries {
        let query = query.trim();
        if query.is_empty() || kept.iter().any(|k| k == query) {
            continue;
        }
        kept.push(query.to_string());
    }

    if kept.len() > QUERIES_PER_STEP {
        kept.truncate(QUERIES_PER_STEP);
    } else if kept.len() < QUERIES_PER_STEP {
        warn!(
            generated = kept.len(),
            expected = QUERIES_PER_STEP,
            "query generator returned fewer queries than requested"
        );
    }
    kept
}

/// LLM-backed query generator.
pub struct QueryGeneratorAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    template: String,
}

impl QueryGeneratorAgent {
    /// Creates a query generator from a provider, model name and prompt template.
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
impl Agent for QueryGeneratorAgent {
    fn name(&self) -> &'static str {
        "queries"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait]
impl QueryGenerator for QueryGeneratorAgent {
    async fn generate(&self, step: &str, collections: &[String]) -> Result<Vec<String>, AgentError> {
        let system_prompt =
            render_template(&self.template, &[("collections", &collections.join(", "))]);
        let (generated, _) = execute_structured::<GeneratedQueries>(
            self,
            self.provider.as_ref(),
            &system_prompt,
            &[user_message(step)],
        )
        .await?;
        Ok(generated.queries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::Role;
    use crate::agent::prompt::GENERATE_QUERIES_SYSTEM_PROMPT;
    use crate::agent::testing::ScriptedProvider;

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn test_bound_queries_caps_at_three() {
        let queries = strings(&["a", "b", "c", "d"]);
        assert_eq!(bound_queries(queries), strings(&["a", "b", "c"]));
    }

    #[test]
    fn test_bound_queries_drops_blank_and_duplicates() {
        let queries = strings(&["a", " ", "a ", "b"]);
        assert_eq!(bound_queries(queries), strings(&["a", "b"]));
    }

    #[tokio::test]
    async fn test_generate_uses_step_as_user_message() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"queries": ["install cli", "cli setup", "cli requirements"]}"#,
        ]));
        let agent = QueryGeneratorAgent::new(
            provider.clone(),
            "gpt-4o-mini",
            256,
            GENERATE_QUERIES_SYSTEM_PROMPT.to_string(),
        );

        let queries = agent
            .generate("find install guide", &strings(&["guides", "api"]))
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(queries.len(), 3);

        let requests = provider.requests();
        let messages = &requests[0].messages;
        assert_eq!(messages.len(), 2);
        assert!(messages[0].content.contains("guides, api"));
        assert_eq!(messages[1].role, Role::User);
        assert_eq!(messages[1].content, "find install guide");
    }
}
