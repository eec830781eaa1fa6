//! Agent configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::AgentError;

/// Default model for classification, planning and query generation.
pub const DEFAULT_QUERY_MODEL: &str = "openai/gpt-4o-mini";
/// Default model for the final answer.
pub const DEFAULT_RESPONSE_MODEL: &str = "openai/gpt-4o-mini";
/// Default maximum concurrent retrieval tasks per research step.
const DEFAULT_MAX_CONCURRENCY: usize = 8;
/// Default number of corpus documents handed to the synthesizer.
const DEFAULT_MAX_CONTEXT_DOCUMENTS: usize = 20;
/// Default max tokens for structured (query-model) calls.
const DEFAULT_QUERY_MAX_TOKENS: u32 = 1024;
/// Default max tokens for the final answer.
const DEFAULT_RESPONSE_MAX_TOKENS: u32 = 4096;
/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 120;
/// Default transport retries per request.
const DEFAULT_MAX_RETRIES: u32 = 0;

/// What the researcher does when some parallel retrieval tasks fail.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FanOutPolicy {
    /// Any failed task fails the whole research step.
    #[default]
    FailFast,
    /// Failed tasks are logged and excluded; surviving documents are merged.
    BestEffort,
}

impl FanOutPolicy {
    /// Returns the kebab-case name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FailFast => "fail-fast",
            Self::BestEffort => "best-effort",
        }
    }
}

impl fmt::Display for FanOutPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FanOutPolicy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(Self::FailFast),
            "best-effort" => Ok(Self::BestEffort),
            other => Err(AgentError::config(format!(
                "unknown fan-out policy '{other}' (expected fail-fast or best-effort)"
            ))),
        }
    }
}

/// Configuration for the agent system.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// API key for the provider.
    pub api_key: String,
    /// Optional base URL override (for proxies or compatible APIs).
    pub base_url: Option<String>,
    /// `provider/model` used by the classifier, planner and query generator.
    pub query_model: String,
    /// `provider/model` used by the response synthesizer.
    pub response_model: String,
    /// Maximum concurrent retrieval tasks in one research step.
    pub max_concurrency: usize,
    /// Partial-failure policy for the research fan-out.
    pub fan_out_policy: FanOutPolicy,
    /// Maximum corpus documents formatted into the response context.
    pub max_context_documents: usize,
    /// Maximum tokens for query-model responses.
    pub query_max_tokens: u32,
    /// Maximum tokens for the final answer.
    pub response_max_tokens: u32,
    /// Request timeout.
    pub timeout: Duration,
    /// Transport retries per request (connection errors only, with
    /// exponential backoff). Timeouts are never retried.
    pub max_retries: u32,
    /// Directory containing prompt template files.
    ///
    /// Missing files fall back to compiled-in defaults.
    pub prompt_dir: Option<PathBuf>,
}

impl AgentConfig {
    /// Creates a new builder for `AgentConfig`.
    #[must_use]
    pub fn builder() -> AgentConfigBuilder {
        AgentConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key is found, or
    /// [`AgentError::Config`] for an unparseable fan-out policy.
    pub fn from_env() -> Result<Self, AgentError> {
        Self::builder().from_env()?.build()
    }
}

/// Builder for [`AgentConfig`].
#[derive(Debug, Clone, Default)]
pub struct AgentConfigBuilder {
    api_key: Option<String>,
    base_url: Option<String>,
    query_model: Option<String>,
    response_model: Option<String>,
    max_concurrency: Option<usize>,
    fan_out_policy: Option<FanOutPolicy>,
    max_context_documents: Option<usize>,
    query_max_tokens: Option<u32>,
    response_max_tokens: Option<u32>,
    timeout: Option<Duration>,
    max_retries: Option<u32>,
    prompt_dir: Option<PathBuf>,
}

impl AgentConfigBuilder {
    /// Populates unset fields from environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::Config`] if `DOCQA_FAN_OUT_POLICY` is set to an
    /// unknown policy.
    pub fn from_env(mut self) -> Result<Self, AgentError> {
        if self.api_key.is_none() {
            self.api_key = std::env::var("OPENAI_API_KEY")
                .or_else(|_| std::env::var("DOCQA_API_KEY"))
                .ok();
        }
        if self.base_url.is_none() {
            self.base_url = std::env::var("OPENAI_BASE_URL")
                .or_else(|_| std::env::var("DOCQA_BASE_URL"))
                .ok();
        }
        if self.query_model.is_none() {
            self.query_model = std::env::var("DOCQA_QUERY_MODEL").ok();
        }
        if self.response_model.is_none() {
            self.response_model = std::env::var("DOCQA_RESPONSE_MODEL").ok();
        }
        if self.max_concurrency.is_none() {
            self.max_concurrency = std::env::var("DOCQA_MAX_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.fan_out_policy.is_none()
            && let Ok(value) = std::env::var("DOCQA_FAN_OUT_POLICY")
        {
            self.fan_out_policy = Some(value.parse()?);
        }
        if self.prompt_dir.is_none() {
            self.prompt_dir = std::env::var("DOCQA_PROMPT_DIR").ok().map(PathBuf::from);
        }
        Ok(self)
    }

    /// Sets the API key.
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the base URL override.
    #[must_use]
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Sets the query model (`provider/model`).
    #[must_use]
    pub fn query_model(mut self, model: impl Into<String>) -> Self {
        self.query_model = Some(model.into());
        self
    }

    /// Sets the response model (`provider/model`).
    #[must_use]
    pub fn response_model(mut self, model: impl Into<String>) -> Self {
        self.response_model = Some(model.into());
        self
    }

    /// Sets the maximum retrieval concurrency.
    #[must_use]
    pub const fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = Some(n);
        self
    }

    /// Sets the fan-out partial-failure policy.
    #[must_use]
    pub const fn fan_out_policy(mut self, policy: FanOutPolicy) -> Self {
        self.fan_out_policy = Some(policy);
        self
    }

    /// Sets the maximum documents passed to the synthesizer.
    #[must_use]
    pub const fn max_context_documents(mut self, n: usize) -> Self {
        self.max_context_documents = Some(n);
        self
    }

    /// Sets the query-model max tokens.
    #[must_use]
    pub const fn query_max_tokens(mut self, n: u32) -> Self {
        self.query_max_tokens = Some(n);
        self
    }

    /// Sets the response-model max tokens.
    #[must_use]
    pub const fn response_max_tokens(mut self, n: u32) -> Self {
        self.response_max_tokens = Some(n);
        self
    }

    /// Sets the request timeout.
    #[must_use]
    pub const fn timeout(mut self, duration: Duration) -> Self {
        self.timeout = Some(duration);
        self
    }

    /// Sets the max retries.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the prompt template directory.
    #[must_use]
    pub fn prompt_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.prompt_dir = Some(dir.into());
        self
    }

    /// Builds the [`AgentConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`AgentError::ApiKeyMissing`] if no API key was set, or
    /// [`AgentError::Config`] if `max_concurrency` is zero.
    pub fn build(self) -> Result<AgentConfig, AgentError> {
        let api_key = self.api_key.ok_or(AgentError::ApiKeyMissing)?;

        let max_concurrency = self.max_concurrency.unwrap_or(DEFAULT_MAX_CONCURRENCY);
        if max_concurrency == 0 {
            return Err(AgentError::config("max_concurrency must be at least 1"));
        }

        Ok(AgentConfig {
            api_key,
            base_url: self.base_url,
            query_model: self
                .query_model
                .unwrap_or_else(|| DEFAULT_QUERY_MODEL.to_string()),
            response_model: self
                .response_model
                .unwrap_or_else(|| DEFAULT_RESPONSE_MODEL.to_string()),
            max_concurrency,
            fan_out_policy: self.fan_out_policy.unwrap_or_default(),
            max_context_documents: self
                .max_context_documents
                .unwrap_or(DEFAULT_MAX_CONTEXT_DOCUMENTS),
            query_max_tokens: self.query_max_tokens.unwrap_or(DEFAULT_QUERY_MAX_TOKENS),
            response_max_tokens: self
                .response_max_tokens
                .unwrap_or(DEFAULT_RESPONSE_MAX_TOKENS),
            timeout: self
                .timeout
                .unwrap_or(Duration::from_secs(DEFAULT_TIMEOUT_SECS)),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            prompt_dir: self.prompt_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = AgentConfig::builder()
            .api_key("test-key")
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.api_key, "test-key");
        assert_eq!(config.query_model, DEFAULT_QUERY_MODEL);
        assert_eq!(config.response_model, DEFAULT_RESPONSE_MODEL);
        assert_eq!(config.max_concurrency, DEFAULT_MAX_CONCURRENCY);
        assert_eq!(config.max_context_documents, 20);
        assert_eq!(config.fan_out_policy, FanOutPolicy::FailFast);
    }

    #[test]
    fn test_builder_missing_api_key() {
        let result = AgentConfig::builder().build();
        assert!(matches!(result, Err(AgentError::ApiKeyMissing)));
    }

    #[test]
    fn test_builder_rejects_zero_concurrency() {
        let result = AgentConfig::builder()
            .api_key("key")
            .max_concurrency(0)
            .build();
        assert!(matches!(result, Err(AgentError::Config { .. })));
    }

    #[test]
    fn test_builder_custom_values() {
        let config = AgentConfig::builder()
            .api_key("key")
            .query_model("openai/gpt-4.1-nano")
            .max_concurrency(2)
            .fan_out_policy(FanOutPolicy::BestEffort)
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(config.query_model, "openai/gpt-4.1-nano");
        assert_eq!(config.max_concurrency, 2);
        assert_eq!(config.fan_out_policy, FanOutPolicy::BestEffort);
        assert_eq!(config.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_fan_out_policy_parse() {
        assert_eq!("fail-fast".parse::<FanOutPolicy>().ok(), Some(FanOutPolicy::FailFast));
        assert_eq!(
            "Best_Effort".parse::<FanOutPolicy>().ok(),
            Some(FanOutPolicy::BestEffort)
        );
        assert!("sometimes".parse::<FanOutPolicy>().is_err());
        assert_eq!(FanOutPolicy::BestEffort.to_string(), "best-effort");
    }
}
