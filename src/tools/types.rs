//! Parameter schemas for capabilities.

use serde::{Deserialize, Serialize};

/// JSON Schema-based parameter definition for a capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolParameters {
    /// JSON Schema object describing the parameters.
    pub schema: serde_json::Value,
}

impl ToolParameters {
    /// Create from a raw JSON Schema value.
    pub fn from_schema(schema: serde_json::Value) -> Self {
        Self { schema }
    }

    /// Create an empty parameter schema (no parameters).
    pub fn empty() -> Self {
        Self {
            schema: serde_json::json!({
                "type": "object",
                "properties": {},
                "required": [],
            }),
        }
    }

    /// Builder: create an object schema with properties.
    pub fn object() -> ParameterBuilder {
        ParameterBuilder {
            properties: serde_json::Map::new(),
            required: Vec::new(),
        }
    }

    /// Names of the declared properties, in schema order.
    pub fn property_names(&self) -> Vec<&str> {
        self.schema
            .get("properties")
            .and_then(|v| v.as_object())
            .map(|props| props.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Builder for constructing capability parameter schemas.
pub struct ParameterBuilder {
    properties: serde_json::Map<String, serde_json::Value>,
    required: Vec<String>,
}

impl ParameterBuilder {
    fn property(
        mut self,
        name: impl Into<String>,
        schema: serde_json::Value,
        required: bool,
    ) -> Self {
        let name = name.into();
        self.properties.insert(name.clone(), schema);
        if required {
            self.required.push(name);
        }
        self
    }

    /// Add a string property.
    pub fn string(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "string", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add an integer property.
    pub fn integer(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "integer", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add a boolean property.
    pub fn boolean(self, name: impl Into<String>, description: impl Into<String>, required: bool) -> Self {
        let schema = serde_json::json!({ "type": "boolean", "description": description.into() });
        self.property(name, schema, required)
    }

    /// Add an enum (string) property.
    pub fn string_enum(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: &[&str],
        required: bool,
    ) -> Self {
        let schema = serde_json::json!({
            "type": "string",
            "description": description.into(),
            "enum": values,
        });
        self.property(name, schema, required)
    }

    /// Build into ToolParameters.
    pub fn build(self) -> ToolParameters {
        ToolParameters {
            schema: serde_json::json!({
                "type": "object",
                "properties": self.properties,
                "required": self.required,
            }),
        }
    }
}
