//! Core type definitions.

pub mod message;
pub mod stream;
pub mod tool;

pub use message::{ChatMessage, Role};
pub use stream::{FinishReason, StreamEvent};
pub use tool::{FunctionPayload, ToolCall, ToolCallFragment, ToolCallPayload, ToolResult, ToolSchema};
