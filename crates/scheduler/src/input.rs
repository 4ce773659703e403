//! Resolves a node's runtime input from its static `NodeKind` payload
//! overlaid with its `input_bindings` (§4.4): each binding supplies one
//! field of the JSON object the node's executor receives, replacing an
//! implicit predecessor-output merge with the explicit mapping icecore's
//! data model declares per node.

use icecore_execution::IceError;
use icecore_execution::context::RunContext;
use icecore_workflow::{InputBinding, NodeSpec};

/// Builds the `serde_json::Value` an executor receives for one attempt:
/// the node's own static kind fields (`tool_name`, `prompt`, ...), each
/// overwritten by its resolved `input_bindings` entry, if any.
pub fn resolve_node_input(node: &NodeSpec, ctx: &RunContext) -> Result<serde_json::Value, IceError> {
    let mut input = serde_json::to_value(&node.kind)?;
    let object = input
        .as_object_mut()
        .ok_or_else(|| IceError::internal("node kind did not serialize to a JSON object"))?;

    for (field, binding) in &node.input_bindings {
        let value = resolve_binding(binding, ctx)?;
        object.insert(field.clone(), value);
    }

    Ok(input)
}

/// Resolves a single [`InputBinding`] in isolation — exposed crate-wide so
/// the scheduler's control-flow drivers can resolve a `loop` node's
/// `items_source` the same way ordinary nodes resolve their bindings.
pub(crate) fn resolve_binding(binding: &InputBinding, ctx: &RunContext) -> Result<serde_json::Value, IceError> {
    match binding {
        InputBinding::Literal { value } => Ok(value.clone()),
        InputBinding::Reference {
            upstream_id,
            field_path,
        } => {
            let output = ctx.get_node_output(*upstream_id).ok_or_else(|| {
                IceError::internal(format!(
                    "reference binding points at node {upstream_id} with no recorded output"
                ))
            })?;
            let value = output.as_value().ok_or_else(|| {
                IceError::internal(format!(
                    "reference binding points at node {upstream_id}'s blob-spilled output, which cannot be dot-path resolved"
                ))
            })?;
            Ok(get_path(value, field_path).cloned().unwrap_or(serde_json::Value::Null))
        }
        InputBinding::Variable { field_path } => {
            let mut segments = field_path.splitn(2, '.');
            let head = segments.next().unwrap_or_default();
            let Some(root) = ctx.get_variable(head) else {
                return Ok(serde_json::Value::Null);
            };
            match segments.next() {
                Some(rest) => Ok(get_path(&root, rest).cloned().unwrap_or(serde_json::Value::Null)),
                None => Ok(root),
            }
        }
    }
}

/// Navigates a dotted path into a JSON value — `"a.b.c"` walks object keys;
/// a numeric segment indexes into an array.
fn get_path<'v>(value: &'v serde_json::Value, path: &str) -> Option<&'v serde_json::Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match current {
            serde_json::Value::Object(map) => map.get(segment)?,
            serde_json::Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}
