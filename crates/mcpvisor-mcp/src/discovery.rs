//! Decoding `tools/list` and `resources/list` results.

use mcpvisor_core::{McpError, Resource, Tool};
use serde_json::Value;
use tracing::{debug, warn};

fn listed_array<'a>(result: &'a Value, key: &str, method: &str) -> Result<&'a [Value], McpError> {
    result
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .ok_or_else(|| McpError::InvalidResponse(format!("{method} result has no `{key}` array")))
}

/// Decode a `tools/list` result.
///
/// A malformed tool is skipped with a warning; the rest of the batch is kept.
pub fn parse_tools(server_name: &str, result: &Value) -> Result<Vec<Tool>, McpError> {
    let entries = listed_array(result, "tools", "tools/list")?;

    Ok(entries
        .iter()
        .filter_map(|entry| match Tool::from_descriptor(server_name, entry) {
            Ok(tool) => Some(tool),
            Err(e) => {
                let tool = entry.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");
                warn!(
                    server_name = %server_name,
                    tool = %tool,
                    error = %e,
                    "Skipping malformed tool descriptor"
                );
                None
            }
        })
        .collect())
}

/// Decode a `resources/list` result, silently skipping entries without `uri` or `name`.
pub fn parse_resources(server_name: &str, result: &Value) -> Result<Vec<Resource>, McpError> {
    let entries = listed_array(result, "resources", "resources/list")?;

    let resources: Vec<Resource> = entries
        .iter()
        .filter_map(|entry| Resource::from_descriptor(server_name, entry))
        .collect();

    if resources.len() < entries.len() {
        debug!(
            server_name = %server_name,
            skipped = entries.len() - resources.len(),
            "Skipped incomplete resource descriptors"
        );
    }

    Ok(resources)
}
