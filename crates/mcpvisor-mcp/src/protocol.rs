//! JSON-RPC message shapes for the MCP stdio dialect.
//!
//! Only the subset this client needs: requests with integer ids,
//! notifications, and responses carrying either `result` or `error`.

use mcpvisor_core::McpError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// MCP protocol revision announced during `initialize`.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

const JSONRPC_VERSION: &str = "2.0";

/// JSON-RPC 2.0 request.
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub const fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            id,
            method,
            params,
        }
    }
}

/// JSON-RPC 2.0 notification (no id, no response).
#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    jsonrpc: &'static str,
    pub method: &'a str,
    pub params: Value,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION,
            method,
            params: params.unwrap_or_else(|| json!({})),
        }
    }
}

/// JSON-RPC 2.0 response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

impl JsonRpcResponse {
    /// Split into the `result` payload or the embedded protocol error.
    pub fn into_result(self) -> Result<Value, McpError> {
        if let Some(error) = self.error {
            return Err(McpError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        self.result
            .ok_or_else(|| McpError::InvalidResponse("response has neither result nor error".into()))
    }
}

/// One decoded line from a server's stdout.
#[derive(Debug)]
pub enum Incoming {
    /// Reply to one of our requests.
    Response(JsonRpcResponse),
    /// Server-initiated request or notification; not handled by this client.
    ServerMessage { method: String },
}

/// Decode one line of server output.
///
/// Returns a description of the problem when the line is not a JSON-RPC
/// message this client understands.
pub fn parse_incoming(line: &str) -> Result<Incoming, String> {
    let value: Value = serde_json::from_str(line).map_err(|e| format!("not JSON: {e}"))?;

    if let Some(method) = value.get("method").and_then(Value::as_str) {
        return Ok(Incoming::ServerMessage {
            method: method.to_string(),
        });
    }

    if value.get("result").is_none() && value.get("error").is_none() {
        return Err("object has neither method, result nor error".to_string());
    }

    serde_json::from_value(value)
        .map(Incoming::Response)
        .map_err(|e| format!("malformed response: {e}"))
}

/// Information about the server from the `initialize` result.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerInfo {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// MCP initialize result. Every field is optional; servers vary widely.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
    #[serde(default)]
    pub capabilities: Option<Value>,
}

/// Serialize a message as one protocol line (trailing newline included).
pub fn encode_line<T: Serialize>(message: &T) -> Result<String, McpError> {
    let mut line =
        serde_json::to_string(message).map_err(|e| McpError::EncodingFailed(e.to_string()))?;
    line.push('\n');
    Ok(line)
}
