//! Merge fragmented tool-call pieces into complete, executable records.

use std::collections::BTreeMap;

use crate::types::tool::{ToolCall, ToolCallFragment};

#[derive(Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Merge stream fragments into complete tool calls.
///
/// Fragments are grouped by index. Within a group, id and name are taken
/// from the first non-empty occurrence; argument chunks are concatenated in
/// arrival order, reconstructing the JSON-encoded argument string the model
/// split across deltas. Output is ordered by ascending index, which matches
/// the order in which the model declared the calls.
///
/// An argument string that fails to parse yields an empty object; the call
/// is still emitted so the round can fail it in isolation.
pub fn merge_fragments(fragments: &[ToolCallFragment]) -> Vec<ToolCall> {
    let mut groups: BTreeMap<u32, PartialCall> = BTreeMap::new();

    for fragment in fragments {
        let slot = groups.entry(fragment.index).or_default();
        if slot.id.is_empty() {
            if let Some(id) = fragment.id.as_deref().filter(|s| !s.is_empty()) {
                slot.id = id.to_string();
            }
        }
        if slot.name.is_empty() {
            if let Some(name) = fragment.name.as_deref().filter(|s| !s.is_empty()) {
                slot.name = name.to_string();
            }
        }
        if let Some(chunk) = &fragment.arguments_chunk {
            slot.arguments.push_str(chunk);
        }
    }

    groups
        .into_values()
        .map(|partial| ToolCall {
            id: partial.id,
            name: partial.name,
            arguments: serde_json::from_str(&partial.arguments)
                .unwrap_or_else(|_| serde_json::json!({})),
        })
        .collect()
}
