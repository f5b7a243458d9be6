//! Provider formatting helpers.

use serde_json::Value;

/// Convert a capability result value into the string sent back to a backend.
///
/// Strings pass through verbatim so a capability returning `"X"` yields
/// exactly `X` for every backend family.
pub(crate) fn tool_result_to_string(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(v) => v.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

/// Render an invocation's arguments as the JSON string wire form.
pub(crate) fn arguments_to_string(arguments: &serde_json::Map<String, Value>) -> String {
    serde_json::to_string(arguments).unwrap_or_else(|_| "{}".to_string())
}
