//! Convenience re-exports for common use.

pub use crate::config::EngineConfig;
pub use crate::conversation::{ChatMode, ConversationState};
pub use crate::error::{Result, VolleyError};
pub use crate::tools::{FnTool, ResultClassifier, RoundStatus, Tool, ToolDispatcher};
pub use crate::transport::Transport;
pub use crate::turn::{
    EventSink, TurnController, TurnEvent, TurnEventPayload, TurnHandle, TurnOutcome, TurnStatus,
};
pub use crate::types::{
    ChatMessage, FinishReason, Role, StreamEvent, ToolCall, ToolResult, ToolSchema,
};
