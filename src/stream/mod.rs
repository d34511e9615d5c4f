//! Streamed-response assembly: SSE line accumulation and tool-call merging.

pub mod accumulator;
pub mod assembler;

pub use accumulator::{parse_sse_data, StreamAccumulator};
pub use assembler::merge_fragments;
