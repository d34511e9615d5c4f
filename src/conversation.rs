//! Conversation state: durable multi-turn history plus the ephemeral
//! working buffer used by tool-augmented exchanges.

use crate::types::message::ChatMessage;
use crate::types::tool::ToolCall;

/// How a single exchange is conducted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatMode {
    /// Plain chat with no tool loop.
    Plain,
    /// Tool-augmented exchange over the working buffer.
    ToolAugmented,
}

/// Owns both message tracks for one engine instance. Only the exchange that
/// is currently in flight mutates it; the two tracks are never merged
/// automatically. The durable track records user turns only; assistant and
/// tool messages live in the working buffer for the round that needs them.
#[derive(Debug, Clone, Default)]
pub struct ConversationState {
    history: Vec<ChatMessage>,
    working: Vec<ChatMessage>,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the outbound message list for a new exchange.
    ///
    /// Plain + persist: the durable history receives the user message and
    /// the whole history is sent. Plain single-shot: only the user message
    /// is sent, nothing is mutated. Tool-augmented: the working buffer is
    /// used instead; a non-persisting exchange resets it first. Persisting
    /// tool exchanges also record the user message in the durable history,
    /// keeping the multi-turn record intact across mode switches.
    pub fn prepare(
        &mut self,
        user_text: &str,
        mode: ChatMode,
        save_to_history: bool,
    ) -> Vec<ChatMessage> {
        let user = ChatMessage::user(user_text);
        match mode {
            ChatMode::ToolAugmented => {
                if save_to_history {
                    self.history.push(user.clone());
                } else {
                    self.working.clear();
                }
                self.working.push(user);
                self.working.clone()
            }
            ChatMode::Plain if save_to_history => {
                self.history.push(user);
                self.history.clone()
            }
            ChatMode::Plain => vec![user],
        }
    }

    /// Record the model's tool-call request in the working buffer.
    pub fn append_assistant_with_tool_calls(&mut self, content: Option<String>, calls: &[ToolCall]) {
        self.working
            .push(ChatMessage::assistant_with_tool_calls(content, calls));
    }

    /// Record one (possibly truncated) tool result in the working buffer.
    pub fn append_tool_result(&mut self, call_id: &str, text: &str) {
        self.working.push(ChatMessage::tool_result(call_id, text));
    }

    /// Snapshot of the working buffer, used as the outbound list when a
    /// tool round re-sends.
    pub fn working_messages(&self) -> Vec<ChatMessage> {
        self.working.clone()
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    pub fn working(&self) -> &[ChatMessage] {
        &self.working
    }

    /// Number of user turns recorded in the durable history.
    pub fn user_turn_count(&self) -> usize {
        self.history
            .iter()
            .filter(|m| m.role == crate::types::Role::User)
            .count()
    }

    /// Explicitly reset both tracks. Never called by the engine itself.
    pub fn clear(&mut self) {
        self.history.clear();
        self.working.clear();
    }
}
