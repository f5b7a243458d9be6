//! Check invocation arguments against a capability's declared schema.

use serde_json::{Map, Value};

/// Validate arguments against a JSON Schema object.
///
/// Top-level only: required field presence and declared property types.
/// Properties the schema does not mention are accepted.
pub fn validate_arguments(args: &Map<String, Value>, schema: &Value) -> Result<(), String> {
    if let Some(required) = schema.get("required").and_then(|v| v.as_array()) {
        for name in required.iter().filter_map(|v| v.as_str()) {
            if !args.contains_key(name) {
                return Err(format!("Missing required field: {name}"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(|v| v.as_object()) else {
        return Ok(());
    };

    for (key, value) in args {
        let expected = properties
            .get(key)
            .and_then(|p| p.get("type"))
            .and_then(|t| t.as_str());
        if let Some(expected) = expected {
            if !value_matches_type(value, expected) {
                return Err(format!(
                    "Field {key} must be {} {expected}, got {}",
                    article(expected),
                    json_type_name(value)
                ));
            }
        }
    }

    Ok(())
}

/// Whether a schema is usable as a parameter declaration at all.
pub fn is_object_schema(schema: &Value) -> bool {
    match schema.as_object() {
        Some(obj) => obj
            .get("type")
            .and_then(|t| t.as_str())
            .map(|t| t == "object")
            .unwrap_or(true),
        None => false,
    }
}

fn value_matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => value.is_i64() || value.is_u64(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => true,
    }
}

fn article(type_name: &str) -> &'static str {
    if type_name.starts_with(['a', 'e', 'i', 'o', 'u']) {
        "an"
    } else {
        "a"
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
