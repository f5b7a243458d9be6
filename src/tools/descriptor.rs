//! Capability descriptors and their per-backend rendering.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::tool::Capability;
use super::validation::is_object_schema;

/// How a backend expects to be told about capabilities and to request them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum BackendFamily {
    /// Tool invocations are first-class request/response fields.
    Structured,
    /// Invocations are embedded as tagged JSON inside plain text.
    Tagged,
}

/// What the model is told about one capability.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: serde_json::Value,
}

/// Why a capability was left out of a load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorRejection {
    EmptyName,
    InvalidName(String),
    EmptyDescription,
    SchemaNotObject,
}

impl std::fmt::Display for DescriptorRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyName => write!(f, "empty name"),
            Self::InvalidName(name) => write!(f, "name '{name}' contains invalid characters"),
            Self::EmptyDescription => write!(f, "empty description"),
            Self::SchemaNotObject => write!(f, "parameter schema is not a JSON object"),
        }
    }
}

impl CapabilityDescriptor {
    pub fn from_capability(capability: &dyn Capability) -> Self {
        Self {
            name: capability.name().trim().to_string(),
            description: capability.description().trim().to_string(),
            parameters: capability.parameters().schema.clone(),
        }
    }

    /// Validate for the given backend family.
    ///
    /// Every family needs an object schema. Structured backends also need a
    /// non-empty name made of `[A-Za-z0-9_-]` and a non-empty description.
    pub fn validate(&self, family: BackendFamily) -> Result<(), DescriptorRejection> {
        if !is_object_schema(&self.parameters) {
            return Err(DescriptorRejection::SchemaNotObject);
        }
        if family == BackendFamily::Structured {
            if self.name.is_empty() {
                return Err(DescriptorRejection::EmptyName);
            }
            if !is_valid_structured_name(&self.name) {
                return Err(DescriptorRejection::InvalidName(self.name.clone()));
            }
            if self.description.is_empty() {
                return Err(DescriptorRejection::EmptyDescription);
            }
        }
        Ok(())
    }

    /// Function entry for a structured-tool request's `tools` array.
    pub fn to_function_spec(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }

    /// One human-readable bullet for a tagged-text system prompt.
    ///
    /// Multi-line descriptions are re-indented under the bullet.
    pub fn to_prompt_line(&self) -> String {
        let description = self
            .description
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n    ");
        let params = serde_json::to_string(&self.parameters).unwrap_or_else(|_| "{}".into());
        format!("- {}: {}\n    parameters: {}", self.name, description, params)
    }
}

/// Names accepted by structured-tool backends.
pub fn is_valid_structured_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn descriptor(name: &str, description: &str) -> CapabilityDescriptor {
        CapabilityDescriptor {
            name: name.into(),
            description: description.into(),
            parameters: json!({"type": "object", "properties": {}}),
        }
    }

    #[test]
    fn structured_rejects_bad_names_and_empty_descriptions() {
        let family = BackendFamily::Structured;
        assert_eq!(descriptor("", "x").validate(family), Err(DescriptorRejection::EmptyName));
        assert!(matches!(
            descriptor("read file", "x").validate(family),
            Err(DescriptorRejection::InvalidName(_))
        ));
        assert_eq!(
            descriptor("read_file", "").validate(family),
            Err(DescriptorRejection::EmptyDescription)
        );
        assert!(descriptor("read-file_2", "Reads").validate(family).is_ok());
    }

    #[test]
    fn tagged_only_requires_object_schema() {
        assert!(descriptor("read file", "").validate(BackendFamily::Tagged).is_ok());

        let mut bad = descriptor("x", "y");
        bad.parameters = json!(["path"]);
        assert_eq!(
            bad.validate(BackendFamily::Tagged),
            Err(DescriptorRejection::SchemaNotObject)
        );
    }

    #[test]
    fn function_spec_shape() {
        let spec = descriptor("create_folder", "Creates a folder").to_function_spec();
        assert_eq!(spec["type"], "function");
        assert_eq!(spec["function"]["name"], "create_folder");
        assert_eq!(spec["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn prompt_line_reindents_description() {
        let line = descriptor("edit_file", "Edits files.\n   Existing only.").to_prompt_line();
        assert!(line.starts_with("- edit_file: Edits files.\n    Existing only."));
        assert!(line.contains("parameters: {"));
    }

    #[test]
    fn family_parses_from_str() {
        assert_eq!("tagged".parse::<BackendFamily>().unwrap(), BackendFamily::Tagged);
        assert_eq!(BackendFamily::Structured.to_string(), "structured");
    }
}
