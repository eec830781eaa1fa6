//! Research plan builder agent.
//!
//! Turns the conversation into a short ordered list of research steps.

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::capability::PlanBuilder;
use super::message::ChatMessage;
use super::provider::LlmProvider;
use super::structured::StructuredOutput;
use super::traits::{Agent, execute_structured};
use crate::error::AgentError;

/// Maximum steps in a research plan.
pub const MAX_PLAN_STEPS: usize = 3;

/// Structured reply of the plan builder.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ResearchPlan {
    /// Research steps, at most three.
    #[serde(default)]
    pub steps: Vec<String>,
}

impl StructuredOutput for ResearchPlan {
    const SCHEMA_NAME: &'static str = "research_plan";
    const DESCRIPTION: Option<&'static str> = Some("Steps in a research plan, at most 3 steps.");
}

/// Drops blank steps and truncates the plan to [`MAX_PLAN_STEPS`].
#[must_use]
pub fn bound_plan(steps: Vec<String>) -> Vec<String> {
    let mut steps: Vec<String> = steps
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect();

    if steps.len() > MAX_PLAN_STEPS {
        warn!(
            proposed = steps.len(),
            kept = MAX_PLAN_STEPS,
            "research plan truncated"
        );
        steps.truncate(MAX_PLAN_STEPS);
    }
    steps
}

/// LLM-backed plan builder.
pub struct PlannerAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    system_prompt: String,
}

impl PlannerAgent {
    /// Creates a planner from a provider, model name and system prompt.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        model: impl Into<String>,
        max_tokens: u32,
        system_prompt: String,
    ) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            system_prompt,
        }
    }
}

#[async_trait]
impl Agent for PlannerAgent {
    fn name(&self) -> &'static str {
        "planner"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait]
impl PlanBuilder for PlannerAgent {
    async fn plan(&self, messages: &[ChatMessage]) -> Result<Vec<String>, AgentError> {
        let (plan, _) = execute_structured::<ResearchPlan>(
            self,
            self.provider.as_ref(),
            &self.system_prompt,
            messages,
        )
        .await?;
        Ok(plan.steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::user_message;
    use crate::agent::prompt::RESEARCH_PLAN_SYSTEM_PROMPT;
    use crate::agent::testing::ScriptedProvider;

    #[test]
    fn test_bound_plan_truncates() {
        let steps = (1..=5).map(|i| format!("step {i}")).collect();
        assert_eq!(bound_plan(steps), vec!["step 1", "step 2", "step 3"]);
    }

    #[test]
    fn test_bound_plan_drops_blank_steps() {
        let steps = vec![" ".to_string(), "  check config ".to_string(), String::new()];
        assert_eq!(bound_plan(steps), vec!["check config"]);
        assert!(bound_plan(Vec::new()).is_empty());
    }

    #[tokio::test]
    async fn test_plan_sends_full_conversation() {
        let provider = Arc::new(ScriptedProvider::new([
            r#"{"steps": ["find install guide", "find config reference"]}"#,
        ]));
        let agent = PlannerAgent::new(
            provider.clone(),
            "gpt-4o-mini",
            512,
            RESEARCH_PLAN_SYSTEM_PROMPT.to_string(),
        );
        let conversation = vec![user_message("earlier"), user_message("how do I install?")];

        let steps = agent
            .plan(&conversation)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(steps.len(), 2);

        let requests = provider.requests();
        assert_eq!(requests[0].messages.len(), 3);
        assert!(requests[0].response_schema.is_some());
    }
}
