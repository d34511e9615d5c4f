//! Tool seam: trait, dispatch registry, and round coordination.

pub mod coordinator;
pub mod dispatcher;
pub mod tool;

pub use coordinator::{
    truncate_result, MarkerClassifier, ResultClassifier, RoundStatus, ToolExecutionCoordinator,
    RESULT_CHAR_CAP, TRUNCATION_MARKER,
};
pub use dispatcher::ToolDispatcher;
pub use tool::{FnTool, Tool};
