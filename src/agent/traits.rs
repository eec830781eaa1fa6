//! Agent trait definition.
//!
//! All LLM-backed agents (router, planner, query generator, synthesizer)
//! implement this trait, which gives a uniform way to send a system prompt
//! plus conversation to a provider.

use async_trait::async_trait;
use tracing::debug;

use super::message::{ChatMessage, ChatRequest, TokenUsage, system_message};
use super::provider::LlmProvider;
use super::structured::{StructuredOutput, parse_structured, response_schema};
use crate::error::AgentError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role with a model configuration. The
/// system prompt is rendered per call, since it depends on the turn
/// (collection list, retrieved context).
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and identification.
    fn name(&self) -> &'static str;

    /// Model name sent to the provider.
    fn model(&self) -> &str;

    /// Sampling temperature (0.0 = deterministic).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Builds the request for a system prompt plus conversation.
    fn request(&self, system_prompt: &str, conversation: &[ChatMessage]) -> ChatRequest {
        let mut messages = Vec::with_capacity(conversation.len() + 1);
        messages.push(system_message(system_prompt));
        messages.extend_from_slice(conversation);

        ChatRequest {
            model: self.model().to_string(),
            messages,
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            response_schema: None,
        }
    }

    /// Executes the agent and returns free text.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError`] on API failures.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        system_prompt: &str,
        conversation: &[ChatMessage],
    ) -> Result<AgentResponse, AgentError> {
        let request = self.request(system_prompt, conversation);
        let response = provider.chat(&request).await?;

        debug!(
            agent = self.name(),
            total_tokens = response.usage.total_tokens,
            "agent call complete"
        );

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}

/// Executes an agent and parses its reply as `T`.
///
/// The schema for `T` is attached to the request so the provider can
/// constrain the reply. The reply is still validated here.
///
/// # Errors
///
/// Returns [`AgentError::ApiRequest`] on provider failure and
/// [`AgentError::ResponseParse`] if the reply does not decode as `T`.
pub async fn execute_structured<T: StructuredOutput>(
    agent: &dyn Agent,
    provider: &dyn LlmProvider,
    system_prompt: &str,
    conversation: &[ChatMessage],
) -> Result<(T, AgentResponse), AgentError> {
    let mut request = agent.request(system_prompt, conversation);
    request.response_schema = Some(response_schema::<T>());

    let response = provider.chat(&request).await?;
    debug!(
        agent = agent.name(),
        schema = T::SCHEMA_NAME,
        total_tokens = response.usage.total_tokens,
        "structured agent call complete"
    );

    let value = parse_structured::<T>(&response.content)?;
    Ok((
        value,
        AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        },
    ))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;
    use crate::agent::message::{Role, user_message};
    use crate::agent::testing::ScriptedProvider;

    struct EchoAgent;

    #[async_trait]
    impl Agent for EchoAgent {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn model(&self) -> &str {
            "test-model"
        }
    }

    #[derive(Debug, Deserialize, schemars::JsonSchema)]
    struct Steps {
        steps: Vec<String>,
    }

    impl StructuredOutput for Steps {
        const SCHEMA_NAME: &'static str = "steps";
    }

    #[tokio::test]
    async fn test_execute_prepends_system_prompt() {
        let provider = ScriptedProvider::new(["hi there"]);
        let conversation = vec![user_message("hello")];

        let response = EchoAgent
            .execute(&provider, "be brief", &conversation)
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(response.content, "hi there");

        let requests = provider.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.model, "test-model");
        assert_eq!(request.temperature, Some(0.0));
        assert!(request.response_schema.is_none());
        assert_eq!(request.messages[0].role, Role::System);
        assert_eq!(request.messages[0].content, "be brief");
        assert_eq!(request.messages[1], conversation[0]);
    }

    #[tokio::test]
    async fn test_execute_structured_attaches_schema() {
        let provider = ScriptedProvider::new([r#"{"steps": ["look up install"]}"#]);

        let (steps, _) = execute_structured::<Steps>(&EchoAgent, &provider, "plan", &[])
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(steps.steps, vec!["look up install"]);

        let requests = provider.requests();
        let schema = requests[0].response_schema.as_ref().map(|s| s.name.as_str());
        assert_eq!(schema, Some("steps"));
    }

    #[tokio::test]
    async fn test_execute_structured_parse_failure() {
        let provider = ScriptedProvider::new(["I think the steps are..."]);
        let result = execute_structured::<Steps>(&EchoAgent, &provider, "plan", &[]).await;
        assert!(matches!(result, Err(AgentError::ResponseParse { .. })));
    }

    #[tokio::test]
    async fn test_execute_propagates_provider_error() {
        let provider = ScriptedProvider::failing("rate limited");
        let result = EchoAgent.execute(&provider, "x", &[]).await;
        assert!(matches!(result, Err(AgentError::ApiRequest { .. })));
    }
}
