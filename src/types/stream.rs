//! Streaming types.

use serde::{Deserialize, Serialize};

use super::tool::ToolCallFragment;

/// Terminal marker from the model for one streamed response.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
}

impl FinishReason {
    /// Parse the wire string; unknown values are treated as absent.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(Self::Stop),
            "length" => Some(Self::Length),
            "tool_calls" => Some(Self::ToolCalls),
            "content_filter" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

/// What a single stream line contributed, if anything.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// Incremental text content.
    TextDelta(String),
    /// A partial tool call keyed by index.
    ToolCallFragment(ToolCallFragment),
    /// Terminal reason observed.
    Finish(FinishReason),
}
