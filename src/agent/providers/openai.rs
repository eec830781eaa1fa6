//! `OpenAI` provider implementation using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (`OpenAI`, Azure, local proxies)
//! via the base URL override in [`AgentConfig`].

use std::time::Duration;

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::error::OpenAIError;
use async_openai::types::{
    ChatCompletionRequestAssistantMessage, ChatCompletionRequestAssistantMessageContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent, ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent, CreateChatCompletionRequest,
    CreateChatCompletionResponse, ResponseFormat, ResponseFormatJsonSchema,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::agent::config::AgentConfig;
use crate::agent::message::{ChatMessage, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::agent::provider::LlmProvider;
use crate::error::AgentError;

/// First transport retry delay.
const RETRY_BASE_BACKOFF_MS: u64 = 500;
/// Multiplier applied per retry.
const RETRY_BACKOFF_MULTIPLIER: u64 = 3;
/// Upper bound on a single retry delay.
const RETRY_MAX_BACKOFF_MS: u64 = 30_000;

/// Delay before retry `attempt` (0-based): `base * multiplier^attempt`, capped.
fn retry_backoff(attempt: u32) -> Duration {
    let ms = RETRY_BACKOFF_MULTIPLIER
        .checked_pow(attempt)
        .and_then(|m| m.checked_mul(RETRY_BASE_BACKOFF_MS))
        .map_or(RETRY_MAX_BACKOFF_MS, |ms| ms.min(RETRY_MAX_BACKOFF_MS));
    Duration::from_millis(ms)
}

/// `OpenAI`-compatible LLM provider.
///
/// Wraps the `async-openai` client for chat completions. Structured
/// requests use the `json_schema` response format.
pub struct OpenAiProvider {
    client: Client<OpenAIConfig>,
    timeout: Duration,
    max_retries: u32,
}

impl OpenAiProvider {
    /// Creates a new provider from agent configuration.
    #[must_use]
    pub fn new(config: &AgentConfig) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(&config.api_key);

        if let Some(ref base_url) = config.base_url {
            openai_config = openai_config.with_api_base(base_url);
        }

        Self {
            client: Client::with_config(openai_config),
            timeout: config.timeout,
            max_retries: config.max_retries,
        }
    }

    /// Sends one request under the configured timeout.
    ///
    /// A timeout or API-level rejection (bad request, auth, schema) fails
    /// immediately. Connection-level transport errors are retried up to
    /// `max_retries` times with exponential backoff; the default is none.
    async fn send(
        &self,
        request: CreateChatCompletionRequest,
    ) -> Result<CreateChatCompletionResponse, AgentError> {
        let mut attempt = 0;
        loop {
            let outcome =
                tokio::time::timeout(self.timeout, self.client.chat().create(request.clone()))
                    .await;
            let message = match outcome {
                Ok(Ok(response)) => return Ok(response),
                Ok(Err(OpenAIError::Reqwest(e))) => e.to_string(),
                Ok(Err(OpenAIError::ApiError(e))) => {
                    return Err(AgentError::ApiRequest {
                        message: e.message,
                        status: None,
                    });
                }
                Ok(Err(e)) => {
                    return Err(AgentError::ApiRequest {
                        message: e.to_string(),
                        status: None,
                    });
                }
                Err(_) => {
                    return Err(AgentError::ApiRequest {
                        message: format!("request timed out after {:?}", self.timeout),
                        status: None,
                    });
                }
            };

            if attempt >= self.max_retries {
                return Err(AgentError::ApiRequest {
                    message,
                    status: None,
                });
            }
            let delay = retry_backoff(attempt);
            attempt += 1;
            warn!(
                attempt,
                max_retries = self.max_retries,
                delay_ms = delay.as_millis(),
                error = %message,
                "retrying chat request after transport error"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Converts our message type to the `OpenAI` SDK type.
    fn convert_message(msg: &ChatMessage) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => {
                ChatCompletionRequestMessage::System(ChatCompletionRequestSystemMessage {
                    content: ChatCompletionRequestSystemMessageContent::Text(msg.content.clone()),
                    name: None,
                })
            }
            Role::User => ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
                content: ChatCompletionRequestUserMessageContent::Text(msg.content.clone()),
                name: None,
            }),
            Role::Assistant => {
                #[allow(deprecated)]
                ChatCompletionRequestMessage::Assistant(ChatCompletionRequestAssistantMessage {
                    content: Some(ChatCompletionRequestAssistantMessageContent::Text(
                        msg.content.clone(),
                    )),
                    name: None,
                    tool_calls: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                })
            }
        }
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let messages: Vec<_> = request.messages.iter().map(Self::convert_message).collect();

        let response_format = request
            .response_schema
            .as_ref()
            .map(|schema| ResponseFormat::JsonSchema {
                json_schema: ResponseFormatJsonSchema {
                    description: schema.description.clone(),
                    name: schema.name.clone(),
                    schema: Some(schema.schema.clone()),
                    strict: None,
                },
            });

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            max_completion_tokens: request.max_tokens,
            response_format,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<async-openai::Client>")
            .field("timeout", &self.timeout)
            .field("max_retries", &self.max_retries)
            .finish()
    }
}

#[async_trait]
impl LlmProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, AgentError> {
        let openai_request = Self::build_request(request);

        let response = self.send(openai_request).await?;

        let choice = response.choices.first();

        let content = choice
            .and_then(|c| c.message.content.as_ref())
            .cloned()
            .unwrap_or_default();

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response
            .usage
            .map_or_else(TokenUsage::default, |u| TokenUsage {
                prompt_tokens: u.prompt_tokens,
                completion_tokens: u.completion_tokens,
                total_tokens: u.total_tokens,
            });

        debug!(
            model = request.model,
            structured = request.response_schema.is_some(),
            total_tokens = usage.total_tokens,
            "chat completion finished"
        );

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }
}
