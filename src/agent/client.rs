//! Provider registry and factory.
//!
//! Model identifiers take the form `provider/model-name`. The provider part
//! selects a concrete [`LlmProvider`]; the remainder is sent as the model.

use std::fmt;
use std::sync::Arc;

use crate::agent::config::AgentConfig;
use crate::agent::provider::LlmProvider;
use crate::agent::providers::OpenAiProvider;
use crate::error::AgentError;

/// Provider used when a model identifier has no `provider/` prefix.
pub const DEFAULT_PROVIDER: &str = "openai";

/// A parsed `provider/model-name` identifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelId {
    /// Provider name (e.g. `"openai"`).
    pub provider: String,
    /// Model name as the provider knows it.
    pub model: String,
}

impl ModelId {
    /// Parses an identifier, defaulting the provider when no prefix is given.
    ///
    /// Only the first `/` separates provider from model, so
    /// `openai/org/model` yields model `org/model`.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] when either part is empty.
    pub fn parse(id: &str) -> Result<Self, AgentError> {
        let (provider, model) = id
            .split_once('/')
            .unwrap_or((DEFAULT_PROVIDER, id));
        let provider = provider.trim();
        let model = model.trim();

        if provider.is_empty() || model.is_empty() {
            return Err(AgentError::config(format!("invalid model identifier '{id}'")));
        }

        Ok(Self {
            provider: provider.to_ascii_lowercase(),
            model: model.to_string(),
        })
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.provider, self.model)
    }
}

/// Creates an [`LlmProvider`] for the provider named in a model identifier.
///
/// # Supported Providers
///
/// - `"openai"`: OpenAI-compatible APIs via `async-openai`
///
/// # Errors
///
/// Returns [`AgentError::UnsupportedProvider`] for unknown provider names.
pub fn create_provider(
    config: &AgentConfig,
    model: &ModelId,
) -> Result<Arc<dyn LlmProvider>, AgentError> {
    match model.provider.as_str() {
        "openai" => Ok(Arc::new(OpenAiProvider::new(config))),
        other => Err(AgentError::UnsupportedProvider {
            name: other.to_string(),
        }),
    }
}
