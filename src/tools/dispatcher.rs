//! Tool dispatch registry.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::VolleyError;
use crate::types::tool::{ToolCall, ToolSchema};

use super::tool::Tool;

/// Name-keyed registry that routes assembled tool calls to their
/// implementations. The engine consumes this through a single `dispatch`
/// seam and never sees the implementations themselves.
#[derive(Default)]
pub struct ToolDispatcher {
    registry: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool. A later registration under the same name replaces
    /// the earlier one.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        debug!(tool = tool.name(), "registering tool");
        self.registry.insert(tool.name().to_string(), tool);
    }

    /// Schemas of all registered tools, in name order.
    pub fn schemas(&self) -> Vec<ToolSchema> {
        self.registry.values().map(|t| t.schema()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.registry.is_empty()
    }

    pub fn len(&self) -> usize {
        self.registry.len()
    }

    /// Execute one call and return its result text.
    ///
    /// Failures are contained to the call: an unknown tool name or a tool
    /// error produces error text rather than aborting the round, so the
    /// model always sees a result for every id it asked for.
    pub async fn dispatch(&self, call: &ToolCall) -> String {
        let Some(tool) = self.registry.get(&call.name) else {
            warn!(tool = %call.name, "dispatch of unknown tool");
            return format!("error: unknown tool {}", call.name);
        };

        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");
        match tool.execute(&call.arguments).await {
            Ok(text) => text,
            Err(err) => {
                let err = VolleyError::tool_execution(&call.name, err.to_string());
                warn!(error = %err, "tool call failed");
                format!("error: {err}")
            }
        }
    }
}

impl std::fmt::Debug for ToolDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolDispatcher")
            .field("tools", &self.registry.keys().collect::<Vec<_>>())
            .finish()
    }
}
