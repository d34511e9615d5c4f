//! Tool-related types: schemas, calls, fragments, results.

use serde::{Deserialize, Serialize};

/// A complete tool call, assembled from stream fragments.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Parsed argument object. An unparseable argument string degrades to
    /// an empty object so the call fails on its own terms downstream.
    pub arguments: serde_json::Value,
}

/// Wire record for a tool call: `{id, type: "function", function: {...}}`.
/// The `arguments` field is a JSON-encoded string, not the data itself.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallPayload {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionPayload,
}

/// The `function` object inside a wire tool-call record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionPayload {
    pub name: String,
    pub arguments: String,
}

impl From<&ToolCall> for ToolCallPayload {
    fn from(call: &ToolCall) -> Self {
        Self {
            id: call.id.clone(),
            kind: "function".to_string(),
            function: FunctionPayload {
                name: call.name.clone(),
                arguments: call.arguments.to_string(),
            },
        }
    }
}

/// A partial, index-keyed piece of a tool call delivered over the stream.
/// Transient; exists only between stream start and assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCallFragment {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub arguments_chunk: Option<String>,
}

/// The result of executing one tool call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub text: String,
}

/// Schema of a registered tool, advertised to the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    /// JSON Schema of the input object.
    pub parameters: serde_json::Value,
}

impl ToolSchema {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: serde_json::Value,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }

    /// Serialize as the request's `tools[]` element.
    pub fn to_wire(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}
