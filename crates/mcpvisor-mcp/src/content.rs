//! Rendering `tools/call` results to text.
//!
//! MCP returns content as an array of typed items. Callers of the supervisor
//! want a single string they can hand to a language model, so text items are
//! joined with newlines and non-text items become bracketed placeholders.

use mcpvisor_core::McpError;
use serde_json::Value;

/// Prefix marking a result the server flagged with `isError`.
pub const ERROR_PREFIX: &str = "Error: ";

const GENERIC_FAILURE: &str = "Tool execution failed";

/// Render a `tools/call` result object.
///
/// A result flagged `isError` is still returned as data, prefixed with
/// [`ERROR_PREFIX`]. A result whose content has no recognizable shape falls
/// back to the serialized result rather than failing.
pub fn render_tool_result(result: &Value) -> Result<String, McpError> {
    let object = result
        .as_object()
        .ok_or_else(|| McpError::InvalidResponse("tools/call result is not an object".into()))?;

    let is_error = object.get("isError").is_some_and(is_truthy);
    let rendered = object.get("content").and_then(render_content);

    if is_error {
        return Ok(match rendered {
            Some(text) if !text.is_empty() => format!("{ERROR_PREFIX}{text}"),
            _ => GENERIC_FAILURE.to_string(),
        });
    }

    match rendered {
        Some(text) => Ok(text),
        None => serde_json::to_string(result).map_err(|e| McpError::EncodingFailed(e.to_string())),
    }
}

fn render_content(content: &Value) -> Option<String> {
    match content {
        Value::String(text) => Some(text.clone()),
        Value::Array(items) if items.is_empty() => Some(String::new()),
        Value::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(render_item).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join("\n"))
            }
        }
        _ => None,
    }
}

fn render_item(item: &Value) -> Option<String> {
    let field = |name: &str| item.get(name).and_then(Value::as_str);

    match field("type")? {
        "text" => field("text").map(String::from),
        "image" => Some(format!("[Image: {}]", field("mimeType").unwrap_or("image"))),
        "audio" => Some(format!("[Audio: {}]", field("mimeType").unwrap_or("audio"))),
        "resource" => {
            let uri = item
                .get("resource")
                .and_then(|r| r.get("uri"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            Some(format!("[Resource: {uri}]"))
        }
        "resource_link" => Some(format!("[Resource: {}]", field("uri").unwrap_or("unknown"))),
        _ => None,
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => s.eq_ignore_ascii_case("true"),
        _ => false,
    }
}
