//! Synthesizer agent for the final answer.
//!
//! Receives the formatted document block and the conversation and writes
//! one answer that cites documents by their position in the block.

use std::sync::Arc;

use async_trait::async_trait;

use super::capability::ResponseSynthesizer;
use super::message::ChatMessage;
use super::prompt::render_template;
use super::provider::LlmProvider;
use super::traits::Agent;
use crate::error::AgentError;

/// Agent that synthesizes retrieved documents into a final response.
pub struct SynthesizerAgent {
    provider: Arc<dyn LlmProvider>,
    model: String,
    max_tokens: u32,
    template: String,
}

impl SynthesizerAgent {
    /// Creates a synthesizer from a provider, model name and prompt template.
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
impl Agent for SynthesizerAgent {
    fn name(&self) -> &'static str {
        "synthesizer"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn max_tokens(&self) -> u32 {
        self.max_tokens
    }
}

#[async_trait]
impl ResponseSynthesizer for SynthesizerAgent {
    async fn respond(
        &self,
        messages: &[ChatMessage],
        context: &str,
        collections: &[String],
    ) -> Result<String, AgentError> {
        let system_prompt = render_template(
            &self.template,
            &[("collections", &collections.join(", ")), ("context", context)],
        );
        let response = self
            .execute(self.provider.as_ref(), &system_prompt, messages)
            .await?;
        Ok(response.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::user_message;
    use crate::agent::prompt::RESPONSE_SYSTEM_PROMPT;
    use crate::agent::testing::ScriptedProvider;

    #[tokio::test]
    async fn test_respond_embeds_context() {
        let provider = Arc::new(ScriptedProvider::new(["Run `tool install` [1]."]));
        let agent = SynthesizerAgent::new(
            provider.clone(),
            "gpt-4o-mini",
            1024,
            RESPONSE_SYSTEM_PROMPT.to_string(),
        );
        let context = "<documents>\n<document index=\"1\">\ninstall it\n</document>\n</documents>";

        let answer = agent
            .respond(&[user_message("how?")], context, &["guides".to_string()])
            .await
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(answer, "Run `tool install` [1].");

        let requests = provider.requests();
        let system = &requests[0].messages[0].content;
        assert!(system.contains("install it"));
        assert!(system.contains("collections: guides"));
        assert!(requests[0].response_schema.is_none());
        assert_eq!(requests[0].max_tokens, Some(1024));
    }
}
