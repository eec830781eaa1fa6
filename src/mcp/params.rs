//! MCP tool parameter types.
//!
//! Defines the input schemas for MCP tools using `schemars` for automatic
//! JSON Schema generation required by the MCP protocol.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::agent::message::{ChatMessage, assistant_message, system_message, user_message};
use crate::agent::state::TurnInput;

/// One prior message of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MessageParam {
    /// `"user"`, `"assistant"` or `"system"`.
    pub role: String,
    /// Message text.
    pub content: String,
}

impl MessageParam {
    fn to_message(&self) -> ChatMessage {
        match self.role.to_ascii_lowercase().as_str() {
            "assistant" | "ai" => assistant_message(&self.content),
            "system" => system_message(&self.content),
            _ => user_message(&self.content),
        }
    }
}

/// Parameters for the `ask` MCP tool.
///
/// Runs one conversation turn: classify, then reply directly or research
/// and answer with citations.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AskParams {
    /// The user's latest question.
    pub question: String,

    /// Conversation so far, oldest first. Omit for a fresh conversation.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conversation: Vec<MessageParam>,
}

impl AskParams {
    /// Builds the turn input: prior conversation followed by the question.
    #[must_use]
    pub fn to_input(&self) -> TurnInput {
        let mut messages: Vec<ChatMessage> =
            self.conversation.iter().map(MessageParam::to_message).collect();
        messages.push(user_message(&self.question));
        TurnInput::new(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::message::Role;

    #[test]
    fn test_to_input_appends_question() {
        let params: AskParams = serde_json::from_str(
            r#"{"question": "linux", "conversation": [
                {"role": "user", "content": "how do I install?"},
                {"role": "assistant", "content": "which OS?"}
            ]}"#,
        )
        .unwrap_or_else(|_| unreachable!());

        let input = params.to_input();
        let roles: Vec<Role> = input.messages.iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User]);
        assert_eq!(input.messages[2].content, "linux");
        assert!(input.classification_override().is_none());
    }

    #[test]
    fn test_conversation_is_optional() {
        let params: AskParams =
            serde_json::from_str(r#"{"question": "hi"}"#).unwrap_or_else(|_| unreachable!());
        assert_eq!(params.to_input().messages.len(), 1);
    }
}
