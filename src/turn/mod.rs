//! Top-level turn state machine and its caller-facing events.

pub mod controller;
pub mod events;

pub use controller::{TurnController, TurnHandle, TurnOutcome, TurnPhase, TurnStatus};
pub use events::{
    command_output_summary, EventSink, ExchangeId, ResultFormatter, TurnEvent, TurnEventPayload,
};
