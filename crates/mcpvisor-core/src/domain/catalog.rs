//! Tool and resource descriptors produced by discovery.
//!
//! Descriptors arrive as loosely-typed JSON from `tools/list` and
//! `resources/list`. The decoding functions here turn one array element into a
//! typed value or explain why it was rejected; they never panic on shape.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use thiserror::Error;

/// Why a discovered descriptor could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DescriptorError {
    #[error("descriptor is not a JSON object")]
    NotAnObject,

    #[error("missing or non-string field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has the wrong type: expected {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },
}

/// The JSON Schema subset MCP tools use to describe their arguments.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolInputSchema {
    #[serde(rename = "type")]
    pub schema_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<Map<String, Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Value>>,
}

impl Default for ToolInputSchema {
    /// An object schema with no declared properties.
    fn default() -> Self {
        Self {
            schema_type: "object".to_string(),
            properties: None,
            required: None,
            items: None,
        }
    }
}

impl ToolInputSchema {
    /// Decode an `inputSchema` value.
    pub fn from_value(value: &Value) -> Result<Self, DescriptorError> {
        let object = value.as_object().ok_or(DescriptorError::WrongType {
            field: "inputSchema",
            expected: "object",
        })?;

        let schema_type = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or(DescriptorError::MissingField("inputSchema.type"))?
            .to_string();

        let properties = match object.get("properties") {
            None | Some(Value::Null) => None,
            Some(Value::Object(map)) => Some(map.clone()),
            Some(_) => {
                return Err(DescriptorError::WrongType {
                    field: "inputSchema.properties",
                    expected: "object",
                });
            }
        };

        let required = match object.get("required") {
            None | Some(Value::Null) => None,
            Some(Value::Array(entries)) => Some(
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect(),
            ),
            Some(_) => {
                return Err(DescriptorError::WrongType {
                    field: "inputSchema.required",
                    expected: "array",
                });
            }
        };

        let items = object.get("items").cloned().map(Box::new);

        Ok(Self {
            schema_type,
            properties,
            required,
            items,
        })
    }

    /// Render back to a JSON Schema object.
    ///
    /// Object schemas always carry `properties`, which function-calling APIs
    /// require even when a tool takes no arguments.
    pub fn to_value(&self) -> Value {
        let mut schema = Map::new();
        schema.insert("type".to_string(), Value::String(self.schema_type.clone()));

        match &self.properties {
            Some(properties) => {
                schema.insert("properties".to_string(), Value::Object(properties.clone()));
            }
            None if self.schema_type == "object" => {
                schema.insert("properties".to_string(), json!({}));
            }
            None => {}
        }

        if let Some(required) = &self.required {
            schema.insert("required".to_string(), json!(required));
        }

        if let Some(items) = &self.items {
            schema.insert("items".to_string(), (**items).clone());
        }

        Value::Object(schema)
    }
}

/// A tool exposed by an MCP server.
///
/// Immutable once discovered; the whole set for a server is replaced on every
/// re-discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// Tool name as the server reports it.
    pub name: String,

    /// Human-readable description.
    pub description: String,

    /// Argument schema.
    pub input_schema: ToolInputSchema,

    /// Name of the server that exposes this tool.
    pub server_name: String,
}

impl Tool {
    /// Decode one element of a `tools/list` result.
    ///
    /// `name`, `description` and `inputSchema` are all required.
    pub fn from_descriptor(server_name: &str, value: &Value) -> Result<Self, DescriptorError> {
        let object = value.as_object().ok_or(DescriptorError::NotAnObject)?;

        let name = object
            .get("name")
            .and_then(Value::as_str)
            .ok_or(DescriptorError::MissingField("name"))?;

        let description = object
            .get("description")
            .and_then(Value::as_str)
            .ok_or(DescriptorError::MissingField("description"))?;

        let input_schema = object
            .get("inputSchema")
            .ok_or(DescriptorError::MissingField("inputSchema"))
            .and_then(ToolInputSchema::from_value)?;

        Ok(Self {
            name: name.to_string(),
            description: description.to_string(),
            input_schema,
            server_name: server_name.to_string(),
        })
    }

    /// Render as an OpenAI-style function definition.
    pub fn to_function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.input_schema.to_value(),
            }
        })
    }
}

/// A read-only, URI-addressed item exposed by an MCP server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub uri: String,
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,

    pub server_name: String,
}

impl Resource {
    /// Decode one element of a `resources/list` result.
    ///
    /// Returns `None` when `uri` or `name` is missing; resources are optional
    /// enough that a bad entry is simply skipped.
    pub fn from_descriptor(server_name: &str, value: &Value) -> Option<Self> {
        let uri = value.get("uri")?.as_str()?;
        let name = value.get("name")?.as_str()?;

        Some(Self {
            uri: uri.to_string(),
            name: name.to_string(),
            description: value
                .get("description")
                .and_then(Value::as_str)
                .map(String::from),
            mime_type: value
                .get("mimeType")
                .and_then(Value::as_str)
                .map(String::from),
            server_name: server_name.to_string(),
        })
    }
}
