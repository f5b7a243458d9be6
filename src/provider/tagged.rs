//! Tagged-text adapter for the Ollama chat API.
//!
//! The backend has no native tool-call field. Capabilities are listed in a
//! system message, and the model requests one invocation per turn by wrapping
//! a JSON object in `<tool_calls>` ... `</tool_calls>` inside its reply.

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::agent::session::Session;
use crate::error::OmniError;
use crate::types::{Message, Role, ToolInvocationRequest, Turn};

use super::http::{endpoint, json_headers, post_json};
use super::sanitize::redact_for_display;
use super::{AdapterSettings, BackendFamily, CapabilityDescriptor, ProviderAdapter};

const OPEN_TAG: &str = "<tool_calls>";
const CLOSE_TAG: &str = "</tool_calls>";

const SYSTEM_PREAMBLE: &str = "You are a helpful coding assistant. You can inspect and \
change files on the user's machine by calling tools.";

const CALL_FORMAT: &str = r#"To use a tool, format your response like this:

<tool_calls>
{
    "type": "function",
    "function": {
        "name": "tool_name",
        "parameters": {
            "param": "value"
        }
    }
}
</tool_calls>

Request at most one tool per response."#;

static TOOL_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<tool_calls>(.*?)</tool_calls>").expect("tool call block regex must compile")
});

pub struct TaggedTextAdapter {
    settings: AdapterSettings,
}

impl TaggedTextAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self { settings }
    }

    fn build_request_body(
        &self,
        session: &Session,
        capabilities: &[CapabilityDescriptor],
    ) -> Value {
        let mut messages = Vec::with_capacity(session.len() + 1);
        messages.push(serde_json::json!({
            "role": "system",
            "content": system_prompt(capabilities),
        }));
        messages.extend(session.messages().iter().map(message_to_wire));

        serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": self.settings.temperature,
                "top_p": self.settings.top_p,
            },
        })
    }
}

#[async_trait]
impl ProviderAdapter for TaggedTextAdapter {
    fn family(&self) -> BackendFamily {
        BackendFamily::Tagged
    }

    fn model(&self) -> &str {
        &self.settings.model
    }

    async fn send(
        &self,
        session: &Session,
        capabilities: &[CapabilityDescriptor],
    ) -> Result<Turn, OmniError> {
        let body = self.build_request_body(session, capabilities);
        let url = endpoint(&self.settings.base_url, "api/chat");

        debug!(
            model = %self.settings.model,
            messages = session.len(),
            tools = capabilities.len(),
            request = %redact_for_display(&body),
            "Tagged send"
        );

        let data = post_json(&url, json_headers(), &body).await?;
        let content = data
            .get("message")
            .and_then(|m| m.get("content"))
            .and_then(Value::as_str)
            .ok_or_else(|| OmniError::MalformedResponse("response has no message.content".into()))?;

        Ok(parse_content(content))
    }

    fn describe_request(
        &self,
        session: &Session,
        capabilities: &[CapabilityDescriptor],
    ) -> Value {
        redact_for_display(&self.build_request_body(session, capabilities))
    }
}

/// System message listing the capabilities and the invocation format.
pub fn system_prompt(capabilities: &[CapabilityDescriptor]) -> String {
    if capabilities.is_empty() {
        return SYSTEM_PREAMBLE.to_string();
    }
    let tools = capabilities
        .iter()
        .map(CapabilityDescriptor::to_prompt_line)
        .collect::<Vec<_>>()
        .join("\n");
    format!("{SYSTEM_PREAMBLE}\n\nAvailable Tools:\n{tools}\n\n{CALL_FORMAT}")
}

fn message_to_wire(msg: &Message) -> Value {
    match msg.role {
        Role::User => {
            let images: Vec<&str> = msg.images().iter().map(|img| img.data.as_str()).collect();
            if images.is_empty() {
                serde_json::json!({ "role": "user", "content": msg.text() })
            } else {
                serde_json::json!({ "role": "user", "content": msg.text(), "images": images })
            }
        }
        Role::Assistant => {
            let mut content = msg.text();
            if content.is_empty() {
                content = msg
                    .tool_calls()
                    .iter()
                    .map(|call| render_block(call))
                    .collect::<Vec<_>>()
                    .join("\n");
            }
            serde_json::json!({ "role": "assistant", "content": content })
        }
        Role::Tool => {
            let output = msg
                .tool_result_part()
                .map(|r| r.output.as_str())
                .unwrap_or_default();
            serde_json::json!({ "role": "tool", "content": output })
        }
    }
}

/// Render an invocation in the same tagged form the model is asked to use.
pub fn render_block(call: &ToolInvocationRequest) -> String {
    let body = serde_json::json!({
        "type": "function",
        "function": {
            "name": call.capability_name,
            "parameters": call.arguments,
        }
    });
    format!("{OPEN_TAG}\n{body}\n{CLOSE_TAG}")
}

/// Turn raw response text into a [`Turn`].
///
/// Only the first tagged block is considered. No block means the text is the
/// final answer; an unparseable block yields a terminal error turn.
pub fn parse_content(content: &str) -> Turn {
    let Some(block) = TOOL_BLOCK_RE
        .captures(content)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
    else {
        return Turn::final_text(content);
    };

    match parse_block(block) {
        Ok(request) => Turn::with_invocations(content, vec![request]),
        Err(reason) => {
            tracing::warn!(error = %reason, "Rejected tool call block");
            Turn::failed(content, reason)
        }
    }
}

fn parse_block(block: &str) -> Result<ToolInvocationRequest, String> {
    let value: Value =
        serde_json::from_str(block).map_err(|e| format!("Invalid tool call format - {e}"))?;

    if value.get("type").and_then(Value::as_str) != Some("function") {
        return Err("Invalid tool call format: missing 'type' or 'function' field".into());
    }
    let function = value
        .get("function")
        .and_then(Value::as_object)
        .ok_or("Invalid tool call format: missing 'type' or 'function' field")?;
    let name = function
        .get("name")
        .and_then(Value::as_str)
        .ok_or("Invalid tool call format: function.name must be a string")?;
    let arguments = match function.get("parameters") {
        None | Some(Value::Null) => Map::new(),
        Some(Value::Object(map)) => map.clone(),
        Some(_) => {
            return Err("Invalid tool call format: function.parameters must be an object".into())
        }
    };

    Ok(ToolInvocationRequest::new(
        ToolInvocationRequest::fresh_id(),
        name,
        arguments,
    ))
}
