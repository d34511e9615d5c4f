//! Caller-facing events emitted while an exchange runs.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one exchange.
pub type ExchangeId = Uuid;

/// Callback used to deliver turn events.
pub type EventSink = Arc<dyn Fn(TurnEvent) + Send + Sync>;

/// Maps a tool's raw result text to a display form for observers. The raw
/// text is what the model sees; the display form is UI-only.
pub type ResultFormatter = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// Payloads emitted over the event sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEventPayload {
    /// Incremental text for live display.
    TextDelta { text: String },
    /// A tool call is about to be dispatched.
    ToolCallStarted {
        call_id: String,
        name: String,
        input: serde_json::Value,
    },
    /// A tool call returned.
    ToolCallCompleted {
        call_id: String,
        name: String,
        success: bool,
        raw_result: String,
        display_result: String,
    },
    /// The exchange failed (transport, timeout, or round error).
    Failed { error: String },
    /// The exchange produced its final text.
    Finalized { text: String },
}

/// Envelope for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnEvent {
    pub exchange_id: ExchangeId,
    pub seq: u64,
    pub timestamp: DateTime<Utc>,
    pub payload: TurnEventPayload,
}

pub(crate) struct EventEmitter {
    exchange_id: ExchangeId,
    seq: std::sync::atomic::AtomicU64,
    sink: Option<EventSink>,
}

impl EventEmitter {
    pub(crate) fn new(exchange_id: ExchangeId, sink: Option<EventSink>) -> Self {
        Self {
            exchange_id,
            seq: std::sync::atomic::AtomicU64::new(1),
            sink,
        }
    }

    pub(crate) fn emit(&self, payload: TurnEventPayload) {
        let Some(sink) = &self.sink else { return };
        let seq = self.seq.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        (sink)(TurnEvent {
            exchange_id: self.exchange_id,
            seq,
            timestamp: Utc::now(),
            payload,
        });
    }
}

/// Reference [`ResultFormatter`]: summarize shell-style output that carries
/// an `exit code: N` line; anything else passes through unchanged.
pub fn command_output_summary(tool_name: &str, raw: &str) -> String {
    if tool_name != "execute_command" {
        return raw.to_string();
    }
    let Some(code_line) = raw.lines().find(|l| l.contains("exit code:")) else {
        return raw.to_string();
    };
    let exit_code: i32 = code_line
        .rsplit(':')
        .next()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(-1);
    if exit_code == 0 {
        "[ok] command succeeded".to_string()
    } else {
        format!("[failed] command exited with code {exit_code}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_summary_reads_exit_code() {
        let raw = "stdout:\nhello\nexit code: 0";
        assert_eq!(
            command_output_summary("execute_command", raw),
            "[ok] command succeeded"
        );
        let raw = "stderr:\nboom\nexit code: 2";
        assert_eq!(
            command_output_summary("execute_command", raw),
            "[failed] command exited with code 2"
        );
    }

    #[test]
    fn other_tools_pass_through() {
        assert_eq!(command_output_summary("create_file", "done"), "done");
        assert_eq!(command_output_summary("execute_command", "no code"), "no code");
    }
}
