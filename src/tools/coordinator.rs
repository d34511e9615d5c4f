//! Round bookkeeping for one batch of tool calls.

use std::collections::HashMap;

use crate::types::tool::{ToolCall, ToolResult};

/// Maximum characters of a tool result forwarded to the model.
pub const RESULT_CHAR_CAP: usize = 2000;

/// Marker appended when a result is cut at the cap.
pub const TRUNCATION_MARKER: &str = "\n...(output truncated)";

/// Whether a round has collected all of its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundStatus {
    Pending,
    Complete,
}

/// Classifies a tool result as success or failure for observer reporting.
/// Classification never blocks a round from completing; failed calls still
/// produce a result the model must see.
pub trait ResultClassifier: Send + Sync {
    fn is_success(&self, tool_name: &str, result: &str) -> bool;
}

/// Default heuristic: failure markers anywhere in the result text flip the
/// flag. Known to misfire on success messages that mention failure; kept as
/// the default until tools report an explicit status.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkerClassifier;

impl ResultClassifier for MarkerClassifier {
    fn is_success(&self, _tool_name: &str, result: &str) -> bool {
        let lower = result.to_lowercase();
        !lower.contains("error") && !lower.contains("failed")
    }
}

/// Cap a result at [`RESULT_CHAR_CAP`] characters, marking the cut. Results
/// at or under the cap pass through unchanged.
pub fn truncate_result(text: &str) -> String {
    if text.chars().count() <= RESULT_CHAR_CAP {
        return text.to_string();
    }
    let mut truncated: String = text.chars().take(RESULT_CHAR_CAP).collect();
    truncated.push_str(TRUNCATION_MARKER);
    truncated
}

/// Tracks one round of tool calls: the pending set and the id-keyed results
/// that are its sole completion signal.
#[derive(Debug, Default)]
pub struct ToolExecutionCoordinator {
    pending: Vec<ToolCall>,
    results: HashMap<String, ToolResult>,
    completed: bool,
}

impl ToolExecutionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a round. The pending set is replaced, not merged; residue from
    /// any previous round is discarded.
    pub fn begin_round(&mut self, calls: Vec<ToolCall>) {
        self.pending = calls;
        self.results.clear();
        self.completed = false;
    }

    /// Record a result and report round status.
    ///
    /// `Complete` is reached exactly once, on the submission that supplies
    /// the last missing id. Resubmitting into a resolved round updates the
    /// stored text but cannot un-complete or re-complete it.
    pub fn submit_result(&mut self, call_id: &str, text: String) -> RoundStatus {
        self.results.insert(
            call_id.to_string(),
            ToolResult {
                call_id: call_id.to_string(),
                text,
            },
        );

        if !self.completed {
            let all_resolved = self
                .pending
                .iter()
                .all(|call| self.results.contains_key(&call.id));
            if all_resolved && !self.pending.is_empty() {
                self.completed = true;
            }
        }

        if self.completed {
            RoundStatus::Complete
        } else {
            RoundStatus::Pending
        }
    }

    pub fn is_complete(&self) -> bool {
        self.completed
    }

    pub fn pending(&self) -> &[ToolCall] {
        &self.pending
    }

    /// Stored result for a call id, if submitted.
    pub fn result(&self, call_id: &str) -> Option<&ToolResult> {
        self.results.get(call_id)
    }
}
