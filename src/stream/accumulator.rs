//! Incremental assembly of one streamed chat-completion response.

use serde::Deserialize;
use tracing::debug;

use crate::types::stream::{FinishReason, StreamEvent};
use crate::types::tool::ToolCallFragment;

/// Parse an SSE "data:" line, returning None for the "[DONE]" sentinel.
pub fn parse_sse_data(line: &str) -> Option<&str> {
    let data = line.strip_prefix("data: ")?;
    if data == "[DONE]" {
        return None;
    }
    Some(data)
}

/// Consumes raw stream lines and accumulates text, tool-call fragments, and
/// the terminal reason. One accumulator lives per request send; the
/// controller drops it when the round finalizes or aborts.
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    fragments: Vec<ToolCallFragment>,
    finish_reason: Option<FinishReason>,
}

impl StreamAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one raw line of the response.
    ///
    /// Returns the most significant payload the line carried (text over
    /// fragment over finish signal), or `None` for non-data lines, the
    /// stream terminator, and malformed payloads. All payloads are
    /// accumulated regardless of what is returned; a corrupt chunk is
    /// dropped without aborting the stream.
    pub fn process_line(&mut self, line: &str) -> Option<StreamEvent> {
        let data = parse_sse_data(line.trim())?;

        let chunk: StreamChunk = match serde_json::from_str(data) {
            Ok(chunk) => chunk,
            Err(err) => {
                debug!(error = %err, "dropping malformed stream chunk");
                return None;
            }
        };
        let choice = chunk.choices.into_iter().next()?;

        // Last write wins; in practice the reason is sent once. Only a line
        // that carries a reason may surface a Finish event.
        let mut finish_event = None;
        if let Some(reason) = choice.finish_reason.as_deref().and_then(FinishReason::parse) {
            self.finish_reason = Some(reason);
            finish_event = Some(StreamEvent::Finish(reason));
        }

        let mut first_fragment = None;
        if let Some(deltas) = choice.delta.tool_calls {
            for delta in deltas {
                let fragment = ToolCallFragment {
                    index: delta.index,
                    id: delta.id,
                    name: delta.function.as_ref().and_then(|f| f.name.clone()),
                    arguments_chunk: delta.function.and_then(|f| f.arguments),
                };
                if first_fragment.is_none() {
                    first_fragment = Some(fragment.clone());
                }
                self.fragments.push(fragment);
            }
        }

        if let Some(content) = choice.delta.content {
            self.text.push_str(&content);
            return Some(StreamEvent::TextDelta(content));
        }
        if let Some(fragment) = first_fragment {
            return Some(StreamEvent::ToolCallFragment(fragment));
        }
        finish_event
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.finish_reason
    }

    pub fn has_fragments(&self) -> bool {
        !self.fragments.is_empty()
    }

    /// Tear down into (text, fragments, finish reason) for the deciding step.
    pub fn into_parts(self) -> (String, Vec<ToolCallFragment>, Option<FinishReason>) {
        (self.text, self.fragments, self.finish_reason)
    }
}

// Wire shape of one streamed chunk (internal).

#[derive(Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize, Default)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCallDelta>>,
}

#[derive(Deserialize)]
struct ToolCallDelta {
    index: u32,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    function: Option<FunctionDelta>,
}

#[derive(Deserialize)]
struct FunctionDelta {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_lines_without_data_prefix() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.process_line(": keep-alive"), None);
        assert_eq!(acc.process_line("event: ping"), None);
        assert_eq!(acc.process_line(""), None);
        assert_eq!(acc.text(), "");
    }

    #[test]
    fn done_sentinel_has_no_effect() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.process_line("data: [DONE]"), None);
        assert_eq!(acc.finish_reason(), None);
    }

    #[test]
    fn malformed_payload_is_dropped_not_fatal() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.process_line("data: {not json"), None);

        let line = r#"data: {"choices":[{"delta":{"content":"ok"},"finish_reason":null}]}"#;
        assert_eq!(
            acc.process_line(line),
            Some(StreamEvent::TextDelta("ok".to_string()))
        );
        assert_eq!(acc.text(), "ok");
    }

    #[test]
    fn text_deltas_concatenate_verbatim() {
        let mut acc = StreamAccumulator::new();
        acc.process_line(r#"data: {"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#);
        acc.process_line(r#"data: {"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#);
        acc.process_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert_eq!(acc.text(), "Hello");
        assert_eq!(acc.finish_reason(), Some(FinishReason::Stop));
    }

    #[test]
    fn empty_chunk_after_finish_surfaces_nothing() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(
            acc.process_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#),
            Some(StreamEvent::Finish(FinishReason::Stop))
        );
        // A later reasonless keep-alive chunk must not re-announce the finish.
        assert_eq!(
            acc.process_line(r#"data: {"choices":[{"delta":{},"finish_reason":null}]}"#),
            None
        );
        assert_eq!(acc.finish_reason(), Some(FinishReason::Stop));
    }

    #[test]
    fn finish_reason_last_write_wins() {
        let mut acc = StreamAccumulator::new();
        acc.process_line(r#"data: {"choices":[{"delta":{},"finish_reason":"length"}]}"#);
        acc.process_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#);
        assert_eq!(acc.finish_reason(), Some(FinishReason::Stop));
    }

    #[test]
    fn tool_call_deltas_become_fragments() {
        let mut acc = StreamAccumulator::new();
        let opening = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"create_file","arguments":""}}]},"finish_reason":null}]}"#;
        let continuation = r#"data: {"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"{\"path\":\"a\"}"}}]},"finish_reason":null}]}"#;

        let event = acc.process_line(opening).unwrap();
        match event {
            StreamEvent::ToolCallFragment(fragment) => {
                assert_eq!(fragment.index, 0);
                assert_eq!(fragment.id.as_deref(), Some("call_1"));
                assert_eq!(fragment.name.as_deref(), Some("create_file"));
            }
            other => panic!("unexpected event: {other:?}"),
        }

        acc.process_line(continuation);
        acc.process_line(r#"data: {"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#);

        let (text, fragments, finish) = acc.into_parts();
        assert_eq!(text, "");
        assert_eq!(fragments.len(), 2);
        assert_eq!(finish, Some(FinishReason::ToolCalls));
    }

    #[test]
    fn empty_choices_are_ignored() {
        let mut acc = StreamAccumulator::new();
        assert_eq!(acc.process_line(r#"data: {"choices":[]}"#), None);
    }
}
