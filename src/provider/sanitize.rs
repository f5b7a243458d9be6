//! Display-side redaction of large binary payloads.
//!
//! Applied only to copies made for logging or inspection. Request bodies sent
//! over the wire are never passed through here.

use serde_json::Value;

/// Replacement text for a redacted payload.
pub const PLACEHOLDER: &str = "[base64 data omitted]";

/// Strings at or below this length are always shown as-is.
const REDACT_MIN_LEN: usize = 1000;

/// Whether a string looks like an oversized inline binary payload.
///
/// Matches data URLs as well as bare base64, which is how the tagged backend
/// carries images.
pub fn is_binary_payload(s: &str) -> bool {
    s.len() > REDACT_MIN_LEN
        && (s.contains(";base64,") || s.starts_with("data:") || is_bare_base64(s))
}

fn is_bare_base64(s: &str) -> bool {
    s.bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'/' | b'='))
}

/// Redact a single string.
pub fn redact_text(s: &str) -> &str {
    if is_binary_payload(s) {
        PLACEHOLDER
    } else {
        s
    }
}

/// Return a copy of `value` with every binary payload string replaced.
pub fn redact_for_display(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(redact_text(s).to_string()),
        Value::Array(items) => Value::Array(items.iter().map(redact_for_display).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), redact_for_display(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}
