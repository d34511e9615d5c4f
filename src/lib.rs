//! Volley — client-side turn engine for tool-augmented streaming chat.
//!
//! Drives one logical "turn" against an OpenAI-compatible chat-completions
//! endpoint: send messages, consume the SSE stream incrementally, execute
//! any tool calls the model requests, feed the results back, and repeat
//! until the model produces a final textual answer.
//!
//! # Quick Start
//!
//! ```no_run
//! use volley::prelude::*;
//!
//! # async fn example() {
//! let config = EngineConfig::from_env();
//! let mut controller = TurnController::new(config);
//! let outcome = controller.send_message("Hello!").wait().await;
//! println!("{:?}", outcome.text);
//! # }
//! ```

pub mod config;
pub mod conversation;
pub mod error;
pub mod prelude;
pub mod stream;
pub mod tools;
pub mod transport;
pub mod turn;
pub mod types;
