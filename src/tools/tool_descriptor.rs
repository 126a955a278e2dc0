//! Backend operation descriptors.
//!
//! A `ToolDescriptor` is the immutable description of one operation the
//! backend executor exposes: its name, a human description, and the
//! argument schema used both to build calls and to reject malformed ones
//! before they are sent.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Schema entry for one argument field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// JSON type name (`string`, `integer`, `number`, `boolean`, ...).
    #[serde(rename = "type")]
    pub field_type: String,
    /// Whether the backend rejects calls that omit this field.
    #[serde(default)]
    pub required: bool,
}

impl FieldSpec {
    pub fn new(field_type: impl Into<String>, required: bool) -> Self {
        Self {
            field_type: field_type.into(),
            required,
        }
    }
}

/// Description of one backend operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDescriptor {
    /// Unique operation name, e.g. `list_beds`.
    pub name: String,
    /// Human description forwarded to the LLM.
    #[serde(default)]
    pub description: String,
    /// Argument fields keyed by field name.
    #[serde(default)]
    pub argument_schema: BTreeMap<String, FieldSpec>,
}

impl ToolDescriptor {
    /// Create a descriptor with an empty argument schema.
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            argument_schema: BTreeMap::new(),
        }
    }

    /// Builder: add one argument field.
    pub fn with_field(mut self, name: &str, field_type: &str, required: bool) -> Self {
        self.argument_schema
            .insert(name.to_string(), FieldSpec::new(field_type, required));
        self
    }

    /// Build a descriptor from an MCP `tools/list` entry.
    ///
    /// The MCP entry carries a JSON Schema under `inputSchema`; only the
    /// top-level `properties` and `required` members are kept. Returns
    /// `None` when the entry has no usable name.
    pub fn from_mcp_definition(definition: &Value) -> Option<Self> {
        let name = definition.get("name")?.as_str()?.trim();
        if name.is_empty() {
            return None;
        }

        let description = definition
            .get("description")
            .and_then(|d| d.as_str())
            .unwrap_or_default()
            .to_string();

        let schema = definition
            .get("inputSchema")
            .or_else(|| definition.get("input_schema"));

        let required: Vec<&str> = schema
            .and_then(|s| s.get("required"))
            .and_then(|r| r.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str()).collect())
            .unwrap_or_default();

        let mut argument_schema = BTreeMap::new();
        if let Some(properties) = schema
            .and_then(|s| s.get("properties"))
            .and_then(|p| p.as_object())
        {
            for (field, spec) in properties {
                let field_type = spec
                    .get("type")
                    .and_then(|t| t.as_str())
                    .unwrap_or("string");
                argument_schema.insert(
                    field.clone(),
                    FieldSpec::new(field_type, required.contains(&field.as_str())),
                );
            }
        }

        // Required fields that were not listed under `properties`.
        for field in required {
            argument_schema
                .entry(field.to_string())
                .or_insert_with(|| FieldSpec::new("string", true));
        }

        Some(Self {
            name: name.to_string(),
            description,
            argument_schema,
        })
    }

    /// Names of the fields marked required, in schema order.
    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.argument_schema
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Whether the operation can be invoked with no arguments.
    pub fn is_no_argument(&self) -> bool {
        self.required_fields().next().is_none()
    }

    /// Whether the schema declares the given field.
    pub fn accepts(&self, field: &str) -> bool {
        self.argument_schema.contains_key(field)
    }

    /// Render the schema as JSON Schema, for LLM prompts.
    pub fn to_json_schema(&self) -> Value {
        let properties: serde_json::Map<String, Value> = self
            .argument_schema
            .iter()
            .map(|(name, spec)| (name.clone(), serde_json::json!({ "type": spec.field_type })))
            .collect();
        let required: Vec<&str> = self.required_fields().collect();
        serde_json::json!({
            "type": "object",
            "properties": properties,
            "required": required,
        })
    }
}

/// Find a descriptor by operation name.
pub fn find_tool<'a>(catalog: &'a [ToolDescriptor], name: &str) -> Option<&'a ToolDescriptor> {
    catalog.iter().find(|tool| tool.name == name)
}
