//! Message types in the chat-completions wire shape.

use serde::{Deserialize, Serialize};

use super::tool::{ToolCall, ToolCallPayload};

/// Conversation role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// A message in a conversation. Serializes directly to the wire format;
/// immutable once appended to a track.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallPayload>>,
}

impl ChatMessage {
    /// Create a system message.
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(text.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(text.into()),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    /// Create an assistant message carrying tool calls. Content is omitted
    /// when the model produced none alongside the calls.
    pub fn assistant_with_tool_calls(content: Option<String>, calls: &[ToolCall]) -> Self {
        Self {
            role: Role::Assistant,
            content,
            tool_call_id: None,
            tool_calls: Some(calls.iter().map(ToolCallPayload::from).collect()),
        }
    }

    /// Create a tool result message for one call id.
    pub fn tool_result(call_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: Some(text.into()),
            tool_call_id: Some(call_id.into()),
            tool_calls: None,
        }
    }
}
