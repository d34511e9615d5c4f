//! The turn controller: drives one exchange from request to final answer,
//! looping through tool rounds as the model requests them.

use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tokio::time;
use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::conversation::{ChatMode, ConversationState};
use crate::error::VolleyError;
use crate::stream::accumulator::StreamAccumulator;
use crate::stream::assembler::merge_fragments;
use crate::tools::coordinator::{
    truncate_result, MarkerClassifier, ResultClassifier, ToolExecutionCoordinator,
};
use crate::tools::dispatcher::ToolDispatcher;
use crate::transport::{HttpTransport, Transport};
use crate::types::message::ChatMessage;
use crate::types::stream::{FinishReason, StreamEvent};
use crate::types::tool::ToolSchema;

use super::events::{EventEmitter, EventSink, ExchangeId, ResultFormatter, TurnEventPayload};

/// Phase of the exchange state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
    Streaming,
    Deciding,
    ToolRound,
    Finalized,
}

/// Terminal status of an exchange.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Failed,
    Canceled,
}

/// Result of one exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Final accumulated text (present when completed).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub finished_at: DateTime<Utc>,
}

impl TurnOutcome {
    pub fn completed(text: String) -> Self {
        Self {
            status: TurnStatus::Completed,
            text: Some(text),
            error: None,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: TurnStatus::Failed,
            text: None,
            error: Some(error.into()),
            finished_at: Utc::now(),
        }
    }

    pub fn canceled() -> Self {
        Self {
            status: TurnStatus::Canceled,
            text: None,
            error: None,
            finished_at: Utc::now(),
        }
    }
}

/// Handle for an in-flight exchange. Waiting consumes the handle; aborting
/// goes through [`TurnController::abort`], which owns the abort channel.
#[derive(Debug)]
pub struct TurnHandle {
    exchange_id: ExchangeId,
    result_rx: oneshot::Receiver<TurnOutcome>,
}

impl TurnHandle {
    pub fn exchange_id(&self) -> ExchangeId {
        self.exchange_id
    }

    /// Wait for the exchange to finish. An exchange whose task was torn
    /// down without reporting resolves as canceled.
    pub async fn wait(self) -> TurnOutcome {
        self.result_rx
            .await
            .unwrap_or_else(|_| TurnOutcome::canceled())
    }
}

/// Client-side orchestration engine for one conversation.
///
/// Owns the conversation state and the single-in-flight invariant: starting
/// a new exchange aborts any live one before the new request goes out.
pub struct TurnController {
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Option<Arc<ToolDispatcher>>,
    schemas: Vec<ToolSchema>,
    classifier: Arc<dyn ResultClassifier>,
    formatter: ResultFormatter,
    event_sink: Option<EventSink>,
    conversation: Arc<Mutex<ConversationState>>,
    active_abort: Option<oneshot::Sender<()>>,
}

impl TurnController {
    /// Create a controller talking HTTP to the configured endpoint.
    pub fn new(config: EngineConfig) -> Self {
        let transport = Arc::new(HttpTransport::new(&config));
        Self::with_transport(config, transport)
    }

    /// Create a controller over a custom transport.
    pub fn with_transport(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport,
            dispatcher: None,
            schemas: Vec::new(),
            classifier: Arc::new(MarkerClassifier),
            formatter: Arc::new(|_tool, raw| raw.to_string()),
            event_sink: None,
            conversation: Arc::new(Mutex::new(ConversationState::new())),
            active_abort: None,
        }
    }

    /// Install the dispatcher and auto-register its tool schemas, replacing
    /// any schemas registered earlier. Keeps the advertised `tools` array
    /// and the dispatch registry from drifting apart.
    pub fn set_dispatcher(&mut self, dispatcher: Arc<ToolDispatcher>) {
        self.schemas = dispatcher.schemas();
        debug!(tools = self.schemas.len(), "dispatcher installed");
        self.dispatcher = Some(dispatcher);
    }

    /// Register a tool schema without a dispatcher entry. Calls to it will
    /// fail at round time if no dispatcher is installed.
    pub fn register_schema(&mut self, schema: ToolSchema) {
        self.schemas.push(schema);
    }

    pub fn set_event_sink(&mut self, sink: EventSink) {
        self.event_sink = Some(sink);
    }

    pub fn set_classifier(&mut self, classifier: Arc<dyn ResultClassifier>) {
        self.classifier = classifier;
    }

    pub fn set_result_formatter(&mut self, formatter: ResultFormatter) {
        self.formatter = formatter;
    }

    /// Append caller persona text after the built-in system prompt.
    pub fn append_system_prompt(&mut self, extra: &str) {
        self.config.append_system_prompt(extra);
    }

    /// Start an exchange that persists into the durable history.
    pub fn send_message(&mut self, text: &str) -> TurnHandle {
        self.start_exchange(text, true)
    }

    /// Start a single-shot exchange with no durable persistence.
    pub fn ask_once(&mut self, text: &str) -> TurnHandle {
        self.start_exchange(text, false)
    }

    /// Abort the in-flight exchange, if any. The transport is torn down
    /// and the pending turn state discarded, not finalized.
    pub fn abort(&mut self) {
        if let Some(tx) = self.active_abort.take() {
            let _ = tx.send(());
        }
    }

    /// Whether an exchange is currently in flight.
    pub fn is_in_flight(&self) -> bool {
        self.active_abort
            .as_ref()
            .map(|tx| !tx.is_closed())
            .unwrap_or(false)
    }

    /// Explicitly reset both message tracks.
    pub fn clear_history(&self) {
        self.conversation.lock().unwrap().clear();
    }

    pub fn history(&self) -> Vec<ChatMessage> {
        self.conversation.lock().unwrap().history().to_vec()
    }

    pub fn user_turn_count(&self) -> usize {
        self.conversation.lock().unwrap().user_turn_count()
    }

    fn start_exchange(&mut self, text: &str, save_to_history: bool) -> TurnHandle {
        // Single-in-flight: a new exchange supersedes any live one.
        self.abort();

        let mode = if self.schemas.is_empty() {
            ChatMode::Plain
        } else {
            ChatMode::ToolAugmented
        };
        let outbound = self
            .conversation
            .lock()
            .unwrap()
            .prepare(text, mode, save_to_history);

        let exchange_id = Uuid::new_v4();
        let (abort_tx, abort_rx) = oneshot::channel();
        let (result_tx, result_rx) = oneshot::channel();
        self.active_abort = Some(abort_tx);

        debug!(exchange = %exchange_id, ?mode, save_to_history, "exchange start");

        let ctx = ExchangeCtx {
            exchange_id,
            config: self.config.clone(),
            transport: Arc::clone(&self.transport),
            dispatcher: self.dispatcher.clone(),
            schemas: self.schemas.clone(),
            classifier: Arc::clone(&self.classifier),
            formatter: Arc::clone(&self.formatter),
            sink: self.event_sink.clone(),
            conversation: Arc::clone(&self.conversation),
            outbound,
        };
        tokio::spawn(run_exchange(ctx, abort_rx, result_tx));

        TurnHandle {
            exchange_id,
            result_rx,
        }
    }
}

struct ExchangeCtx {
    exchange_id: ExchangeId,
    config: EngineConfig,
    transport: Arc<dyn Transport>,
    dispatcher: Option<Arc<ToolDispatcher>>,
    schemas: Vec<ToolSchema>,
    classifier: Arc<dyn ResultClassifier>,
    formatter: ResultFormatter,
    sink: Option<EventSink>,
    conversation: Arc<Mutex<ConversationState>>,
    outbound: Vec<ChatMessage>,
}

fn enter(phase: &mut TurnPhase, next: TurnPhase, exchange_id: ExchangeId) {
    debug!(exchange = %exchange_id, from = ?phase, to = ?next, "phase transition");
    *phase = next;
}

/// Body of one exchange, run on its own task.
///
/// The outer loop is the re-entry point after a completed tool round: the
/// working buffer becomes the next outbound list and control returns to the
/// top. A new send therefore never starts from inside the stream-finish
/// handling; that code has fully unwound before the loop continues.
async fn run_exchange(
    ctx: ExchangeCtx,
    mut abort_rx: oneshot::Receiver<()>,
    result_tx: oneshot::Sender<TurnOutcome>,
) {
    let emitter = EventEmitter::new(ctx.exchange_id, ctx.sink.clone());
    let timeout_ms = ctx.config.request_timeout.as_millis() as u64;
    let mut outbound = ctx.outbound.clone();
    let mut phase = TurnPhase::Idle;

    loop {
        enter(&mut phase, TurnPhase::Sending, ctx.exchange_id);
        let body = build_request_body(&ctx.config, &outbound, &ctx.schemas);

        // Abort wins over the dispatch itself; a superseded exchange must
        // not put another request on the wire.
        let mut stream = tokio::select! {
            biased;
            _ = &mut abort_rx => {
                debug!(exchange = %ctx.exchange_id, "exchange aborted before send");
                let _ = result_tx.send(TurnOutcome::canceled());
                return;
            }
            result = ctx.transport.post_stream(body) => match result {
                Ok(stream) => stream,
                Err(err) => {
                    emitter.emit(TurnEventPayload::Failed {
                        error: err.to_string(),
                    });
                    let _ = result_tx.send(TurnOutcome::failed(err.to_string()));
                    return;
                }
            }
        };

        // Timeout timer runs from dispatch until end-of-stream; the per-turn
        // accumulator starts fresh on every send.
        enter(&mut phase, TurnPhase::Streaming, ctx.exchange_id);
        let mut acc = StreamAccumulator::new();
        let mut stream_error: Option<VolleyError> = None;
        let timeout = time::sleep(ctx.config.request_timeout);
        tokio::pin!(timeout);

        loop {
            tokio::select! {
                _ = &mut abort_rx => {
                    debug!(exchange = %ctx.exchange_id, "exchange aborted");
                    let _ = result_tx.send(TurnOutcome::canceled());
                    return;
                }
                () = &mut timeout => {
                    let err = VolleyError::Timeout(timeout_ms);
                    emitter.emit(TurnEventPayload::Failed {
                        error: err.to_string(),
                    });
                    let _ = result_tx.send(TurnOutcome::failed(err.to_string()));
                    return;
                }
                line = stream.next() => {
                    match line {
                        None => break,
                        Some(Ok(line)) => {
                            if let Some(StreamEvent::TextDelta(text)) = acc.process_line(&line) {
                                emitter.emit(TurnEventPayload::TextDelta { text });
                            }
                        }
                        Some(Err(err)) => {
                            stream_error = Some(err);
                            break;
                        }
                    }
                }
            }
        }

        enter(&mut phase, TurnPhase::Deciding, ctx.exchange_id);
        if let Some(err) = stream_error {
            emitter.emit(TurnEventPayload::Failed {
                error: err.to_string(),
            });
            let _ = result_tx.send(TurnOutcome::failed(err.to_string()));
            return;
        }

        let (text, fragments, finish) = acc.into_parts();
        let wants_tool_round =
            finish == Some(FinishReason::ToolCalls) && !fragments.is_empty();

        if !wants_tool_round {
            enter(&mut phase, TurnPhase::Finalized, ctx.exchange_id);
            emitter.emit(TurnEventPayload::Finalized { text: text.clone() });
            let _ = result_tx.send(TurnOutcome::completed(text));
            return;
        }

        enter(&mut phase, TurnPhase::ToolRound, ctx.exchange_id);
        let Some(dispatcher) = ctx.dispatcher.as_ref() else {
            let err = VolleyError::Configuration("no tool dispatcher configured".to_string());
            emitter.emit(TurnEventPayload::Failed {
                error: err.to_string(),
            });
            let _ = result_tx.send(TurnOutcome::failed(err.to_string()));
            return;
        };

        let calls = merge_fragments(&fragments);
        {
            let mut conv = ctx.conversation.lock().unwrap();
            let content = if text.is_empty() { None } else { Some(text.clone()) };
            conv.append_assistant_with_tool_calls(content, &calls);
        }

        let mut coordinator = ToolExecutionCoordinator::new();
        coordinator.begin_round(calls.clone());

        // Strictly sequential: later calls may assume earlier ones ran, and
        // result order in the working buffer must match declaration order.
        for call in &calls {
            emitter.emit(TurnEventPayload::ToolCallStarted {
                call_id: call.id.clone(),
                name: call.name.clone(),
                input: call.arguments.clone(),
            });

            // An abort lands between or during dispatches too; results of a
            // torn-down round never reach the conversation.
            let raw = tokio::select! {
                biased;
                _ = &mut abort_rx => {
                    debug!(exchange = %ctx.exchange_id, "exchange aborted mid round");
                    let _ = result_tx.send(TurnOutcome::canceled());
                    return;
                }
                raw = dispatcher.dispatch(call) => raw,
            };
            let success = ctx.classifier.is_success(&call.name, &raw);
            let display = (ctx.formatter)(&call.name, &raw);
            emitter.emit(TurnEventPayload::ToolCallCompleted {
                call_id: call.id.clone(),
                name: call.name.clone(),
                success,
                raw_result: raw.clone(),
                display_result: display,
            });

            // The model only ever sees the truncated form.
            let stored = truncate_result(&raw);
            ctx.conversation
                .lock()
                .unwrap()
                .append_tool_result(&call.id, &stored);
            coordinator.submit_result(&call.id, stored);
        }

        if !coordinator.is_complete() {
            let err = VolleyError::InvalidState(
                "tool round ended without all results".to_string(),
            );
            emitter.emit(TurnEventPayload::Failed {
                error: err.to_string(),
            });
            let _ = result_tx.send(TurnOutcome::failed(err.to_string()));
            return;
        }

        outbound = ctx.conversation.lock().unwrap().working_messages();
    }
}

fn build_request_body(
    config: &EngineConfig,
    messages: &[ChatMessage],
    tools: &[ToolSchema],
) -> serde_json::Value {
    // System message is always first, built from the configured persona.
    let mut wire_messages = Vec::with_capacity(messages.len() + 1);
    wire_messages.push(ChatMessage::system(config.system_prompt.clone()));
    wire_messages.extend_from_slice(messages);

    let mut body = serde_json::json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "stream": true,
        "messages": wire_messages,
    });

    if !tools.is_empty() {
        let defs: Vec<serde_json::Value> = tools.iter().map(|t| t.to_wire()).collect();
        body.as_object_mut().unwrap().insert("tools".into(), defs.into());
    }

    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_leads_with_system_message() {
        let config = EngineConfig::default();
        let body = build_request_body(&config, &[ChatMessage::user("hi")], &[]);

        assert_eq!(body["stream"], serde_json::json!(true));
        assert_eq!(body["model"], serde_json::json!("deepseek-chat"));
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0]["role"], "system");
        assert_eq!(messages[1]["content"], "hi");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn tools_field_present_only_when_registered() {
        let config = EngineConfig::default();
        let schema = ToolSchema::new(
            "create_file",
            "Create a file",
            serde_json::json!({"type": "object"}),
        );
        let body = build_request_body(&config, &[ChatMessage::user("hi")], &[schema]);

        let tools = body["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0]["type"], "function");
        assert_eq!(tools[0]["function"]["name"], "create_file");
    }
}
