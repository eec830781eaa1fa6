//! Schema-validated structured output.
//!
//! A reply type derives [`JsonSchema`] and [`Deserialize`](serde::Deserialize);
//! its schema is sent with the request and the reply is parsed back into the
//! type. Parsing either yields the value or a typed
//! [`AgentError::ResponseParse`].

use schemars::JsonSchema;
use serde::de::DeserializeOwned;

use super::message::ResponseSchema;
use crate::error::AgentError;

/// A type an LLM can be asked to produce as JSON.
pub trait StructuredOutput: DeserializeOwned + JsonSchema {
    /// Schema name reported to the provider (`[A-Za-z0-9_-]`).
    const SCHEMA_NAME: &'static str;

    /// Optional schema description reported to the provider.
    const DESCRIPTION: Option<&'static str> = None;
}

/// Builds the [`ResponseSchema`] for `T`.
#[must_use]
pub fn response_schema<T: StructuredOutput>() -> ResponseSchema {
    ResponseSchema {
        name: T::SCHEMA_NAME.to_string(),
        description: T::DESCRIPTION.map(ToString::to_string),
        schema: schemars::schema_for!(T).to_value(),
    }
}

/// Parses a model reply into `T`.
///
/// Tolerates a surrounding markdown code fence.
///
/// # Errors
///
/// Returns [`AgentError::ResponseParse`] if the reply is not JSON matching `T`.
pub fn parse_structured<T: StructuredOutput>(content: &str) -> Result<T, AgentError> {
    serde_json::from_str::<T>(strip_code_fence(content)).map_err(|e| AgentError::ResponseParse {
        message: format!("reply does not match schema '{}': {e}", T::SCHEMA_NAME),
        content: content.to_string(),
    })
}

fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Deserialize, JsonSchema, PartialEq)]
    struct Sample {
        items: Vec<String>,
    }

    impl StructuredOutput for Sample {
        const SCHEMA_NAME: &'static str = "sample";
    }

    #[test]
    fn test_response_schema_describes_fields() {
        let schema = response_schema::<Sample>();
        assert_eq!(schema.name, "sample");
        assert!(schema.description.is_none());
        assert_eq!(schema.schema["type"], "object");
        assert!(schema.schema["properties"]["items"].is_object());
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Sample =
            parse_structured(r#"{"items": ["a", "b"]}"#).unwrap_or_else(|_| unreachable!());
        assert_eq!(parsed.items, vec!["a", "b"]);
    }

    #[test]
    fn test_parse_code_block() {
        let parsed: Sample = parse_structured("```json\n{\"items\": []}\n```")
            .unwrap_or_else(|_| unreachable!());
        assert!(parsed.items.is_empty());
    }

    #[test]
    fn test_parse_failure_is_typed() {
        let result = parse_structured::<Sample>("not json");
        match result {
            Err(AgentError::ResponseParse { message, content }) => {
                assert!(message.contains("sample"));
                assert_eq!(content, "not json");
            }
            _ => unreachable!(),
        }
    }
}
