//! Shared test helpers: a scripted transport and SSE line builders.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use volley::error::VolleyError;
use volley::transport::{LineStream, Transport};

/// One scripted exchange worth of transport behavior.
pub enum ScriptedResponse {
    /// Yield these lines, then end the stream.
    Lines(Vec<String>),
    /// Yield these lines, then fail with a stream error.
    LinesThenError(Vec<String>, String),
    /// Keep the stream open forever (for timeout and abort tests).
    Stall,
    /// Fail the send itself.
    SendError(String),
}

/// Transport fake that replays queued responses and captures every request
/// body it was asked to send.
pub struct ScriptedTransport {
    responses: Mutex<VecDeque<ScriptedResponse>>,
    requests: Mutex<Vec<serde_json::Value>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn queue(&self, response: ScriptedResponse) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn requests(&self) -> Vec<serde_json::Value> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn post_stream(&self, body: serde_json::Value) -> Result<LineStream, VolleyError> {
        self.requests.lock().unwrap().push(body);

        let response = self
            .responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(ScriptedResponse::Lines(Vec::new()));

        match response {
            ScriptedResponse::Lines(lines) => Ok(Box::pin(futures::stream::iter(
                lines.into_iter().map(Ok),
            ))),
            ScriptedResponse::LinesThenError(lines, error) => {
                let items: Vec<Result<String, VolleyError>> = lines
                    .into_iter()
                    .map(Ok)
                    .chain(std::iter::once(Err(VolleyError::Stream(error))))
                    .collect();
                Ok(Box::pin(futures::stream::iter(items)))
            }
            ScriptedResponse::Stall => Ok(Box::pin(futures::stream::pending())),
            ScriptedResponse::SendError(error) => Err(VolleyError::Stream(error)),
        }
    }
}

/// SSE line carrying a text delta.
pub fn sse_text(content: &str) -> String {
    format!(
        r#"data: {{"choices":[{{"delta":{{"content":{}}},"finish_reason":null}}]}}"#,
        serde_json::Value::String(content.to_string())
    )
}

/// SSE line carrying a finish reason.
pub fn sse_finish(reason: &str) -> String {
    format!(r#"data: {{"choices":[{{"delta":{{}},"finish_reason":"{reason}"}}]}}"#)
}

/// SSE line opening a tool call at an index.
pub fn sse_tool_open(index: u32, id: &str, name: &str) -> String {
    format!(
        r#"data: {{"choices":[{{"delta":{{"tool_calls":[{{"index":{index},"id":"{id}","type":"function","function":{{"name":"{name}","arguments":""}}}}]}},"finish_reason":null}}]}}"#
    )
}

/// SSE line continuing a tool call's argument string.
pub fn sse_tool_args(index: u32, chunk: &str) -> String {
    format!(
        r#"data: {{"choices":[{{"delta":{{"tool_calls":[{{"index":{index},"function":{{"arguments":{}}}}}]}},"finish_reason":null}}]}}"#,
        serde_json::Value::String(chunk.to_string())
    )
}

/// The stream terminator.
pub fn sse_done() -> String {
    "data: [DONE]".to_string()
}
