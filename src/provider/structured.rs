//! Structured-tool adapter for OpenAI-compatible chat completions.
//!
//! Serves the `openai` and `cborg` providers. Capabilities travel in the
//! request's `tools` array and invocations come back as `tool_calls` entries.

use std::collections::HashSet;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::agent::session::Session;
use crate::error::OmniError;
use crate::types::{ContentPart, Message, Role, ToolInvocationRequest, Turn, Usage};

use super::format::arguments_to_string;
use super::http::{bearer_headers, endpoint, post_json};
use super::sanitize::redact_for_display;
use super::{AdapterSettings, BackendFamily, CapabilityDescriptor, ProviderAdapter};

pub struct StructuredToolAdapter {
    settings: AdapterSettings,
}

impl StructuredToolAdapter {
    pub fn new(settings: AdapterSettings) -> Self {
        Self { settings }
    }

    fn build_request_body(
        &self,
        session: &Session,
        capabilities: &[CapabilityDescriptor],
    ) -> Value {
        let messages = session
            .messages()
            .iter()
            .map(message_to_wire)
            .collect::<Vec<_>>();

        let mut body = serde_json::json!({
            "model": self.settings.model,
            "messages": messages,
            "temperature": self.settings.temperature,
        });

        if !capabilities.is_empty() {
            if let Some(obj) = body.as_object_mut() {
                let tools: Vec<Value> = capabilities
                    .iter()
                    .map(CapabilityDescriptor::to_function_spec)
                    .collect();
                obj.insert("tools".into(), tools.into());
                obj.insert("tool_choice".into(), "auto".into());
            }
        }

        body
    }
}

#[async_trait]
impl ProviderAdapter for StructuredToolAdapter {
    fn family(&self) -> BackendFamily {
        BackendFamily::Structured
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
        let url = endpoint(&self.settings.base_url, "chat/completions");

        debug!(
            model = %self.settings.model,
            messages = session.len(),
            tools = capabilities.len(),
            request = %redact_for_display(&body),
            "Structured send"
        );

        let api_key = self.settings.api_key.as_deref().unwrap_or_default();
        let data = post_json(&url, bearer_headers(api_key), &body).await?;
        parse_response(data)
    }

    fn describe_request(
        &self,
        session: &Session,
        capabilities: &[CapabilityDescriptor],
    ) -> Value {
        redact_for_display(&self.build_request_body(session, capabilities))
    }
}

fn message_to_wire(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => {
            let (call_id, output) = msg
                .tool_result_part()
                .map(|r| (r.call_id.as_str(), r.output.as_str()))
                .unwrap_or_default();
            serde_json::json!({
                "role": "tool",
                "tool_call_id": call_id,
                "content": output,
            })
        }
        Role::Assistant => {
            let text = msg.text();
            let content = if text.is_empty() {
                Value::Null
            } else {
                Value::String(text)
            };
            let calls = msg.tool_calls();
            if calls.is_empty() {
                return serde_json::json!({ "role": "assistant", "content": content });
            }
            let tool_calls: Vec<Value> = calls
                .iter()
                .map(|tc| {
                    serde_json::json!({
                        "id": tc.call_id,
                        "type": "function",
                        "function": {
                            "name": tc.capability_name,
                            "arguments": arguments_to_string(&tc.arguments),
                        }
                    })
                })
                .collect();
            serde_json::json!({
                "role": "assistant",
                "content": content,
                "tool_calls": tool_calls,
            })
        }
        Role::User => {
            if msg.is_text_only() {
                return serde_json::json!({ "role": "user", "content": msg.text() });
            }
            let parts: Vec<Value> = msg
                .content
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(serde_json::json!({
                        "type": "text",
                        "text": text,
                    })),
                    ContentPart::Image(img) => Some(serde_json::json!({
                        "type": "image_url",
                        "image_url": { "url": img.data_url() },
                    })),
                    _ => None,
                })
                .collect();
            serde_json::json!({ "role": "user", "content": parts })
        }
    }
}

/// Normalize a chat-completions response body into a [`Turn`].
pub(crate) fn parse_response(data: Value) -> Result<Turn, OmniError> {
    let data: ChatResponse = serde_json::from_value(data)
        .map_err(|e| OmniError::MalformedResponse(format!("unexpected response shape: {e}")))?;

    let choice = data
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| OmniError::MalformedResponse("No choices in response".into()))?;

    let mut seen = HashSet::new();
    let mut invocations = Vec::new();
    for call in choice.message.tool_calls.unwrap_or_default() {
        let arguments = match call.function.arguments.or(call.function.parameters) {
            Some(raw) => parse_arguments(&call.function.name, raw)?,
            None => Map::new(),
        };
        let call_id = match call.id.filter(|id| !id.is_empty()) {
            Some(id) if !seen.contains(&id) => id,
            _ => ToolInvocationRequest::fresh_id(),
        };
        seen.insert(call_id.clone());
        invocations.push(ToolInvocationRequest::new(
            call_id,
            call.function.name,
            arguments,
        ));
    }

    let usage = data.usage.map(|u| Usage {
        input_tokens: u.prompt_tokens,
        output_tokens: u.completion_tokens,
        total_tokens: u.total_tokens,
    });

    Ok(Turn::with_invocations(choice.message.content.unwrap_or_default(), invocations)
        .with_usage(usage))
}

/// Arguments may arrive as a JSON-encoded string or an inline object.
fn parse_arguments(name: &str, raw: Value) -> Result<Map<String, Value>, OmniError> {
    let value = match raw {
        Value::String(s) if s.trim().is_empty() => return Ok(Map::new()),
        Value::String(s) => serde_json::from_str(&s).map_err(|e| {
            OmniError::MalformedResponse(format!("arguments for {name} are not valid JSON: {e}"))
        })?,
        Value::Null => return Ok(Map::new()),
        other => other,
    };
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(OmniError::MalformedResponse(format!(
            "arguments for {name} are not a JSON object"
        ))),
    }
}

// Chat completions response types (internal)

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
    tool_calls: Option<Vec<ChatToolCall>>,
}

#[derive(Deserialize)]
struct ChatToolCall {
    id: Option<String>,
    function: ChatFunction,
}

#[derive(Deserialize)]
struct ChatFunction {
    name: String,
    arguments: Option<Value>,
    parameters: Option<Value>,
}

#[derive(Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}
