//! Typed access to invocation arguments.

use crate::error::OmniError;

/// Wrapper around invocation arguments providing typed extraction.
#[derive(Debug, Clone, Default)]
pub struct ToolArguments {
    value: serde_json::Map<String, serde_json::Value>,
}

impl ToolArguments {
    pub fn new(value: serde_json::Map<String, serde_json::Value>) -> Self {
        Self { value }
    }

    /// Get the raw argument map.
    pub fn raw(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.value
    }

    /// Get a string argument by key.
    pub fn get_str(&self, key: &str) -> Result<&str, OmniError> {
        self.value
            .get(key)
            .and_then(|v| v.as_str())
            .ok_or_else(|| OmniError::InvalidArgument(format!("Missing string argument: {key}")))
    }

    /// Get an optional string argument.
    pub fn get_str_opt(&self, key: &str) -> Option<&str> {
        self.value.get(key).and_then(|v| v.as_str())
    }

    /// Get an optional integer argument.
    pub fn get_i64_opt(&self, key: &str) -> Option<i64> {
        self.value.get(key).and_then(|v| v.as_i64())
    }

    /// Deserialize the entire arguments into a typed struct.
    pub fn deserialize<T: serde::de::DeserializeOwned>(&self) -> Result<T, OmniError> {
        serde_json::from_value(serde_json::Value::Object(self.value.clone())).map_err(|e| {
            OmniError::InvalidArgument(format!("Failed to deserialize arguments: {e}"))
        })
    }
}

impl From<serde_json::Map<String, serde_json::Value>> for ToolArguments {
    fn from(value: serde_json::Map<String, serde_json::Value>) -> Self {
        Self::new(value)
    }
}
