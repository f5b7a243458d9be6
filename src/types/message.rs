//! Message types for the conversation log.

use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// A message in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    pub role: Role,
    pub content: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Message {
    fn with_parts(role: Role, content: Vec<ContentPart>) -> Self {
        Self {
            role,
            content,
            timestamp: Some(Utc::now()),
        }
    }

    /// Create a user message.
    pub fn user(text: impl Into<String>) -> Self {
        Self::with_parts(Role::User, vec![ContentPart::Text { text: text.into() }])
    }

    /// Create a user message from presentation-layer input.
    pub fn from_input(input: &UserInput) -> Self {
        let mut content = vec![ContentPart::Text {
            text: input.text.clone(),
        }];
        if let Some(attachment) = &input.attachment {
            content.push(ContentPart::Image(attachment.to_image()));
        }
        Self::with_parts(Role::User, content)
    }

    /// Create an assistant message.
    pub fn assistant(text: impl Into<String>) -> Self {
        Self::with_parts(Role::Assistant, vec![ContentPart::Text { text: text.into() }])
    }

    /// Create the assistant message that requested one tool invocation.
    ///
    /// Empty text is omitted so the message holds only the call.
    pub fn assistant_tool_call(text: impl Into<String>, call: ToolInvocationRequest) -> Self {
        let text = text.into();
        let mut content = Vec::with_capacity(2);
        if !text.is_empty() {
            content.push(ContentPart::Text { text });
        }
        content.push(ContentPart::ToolCall(call));
        Self::with_parts(Role::Assistant, content)
    }

    /// Create a tool result message.
    pub fn tool_result(result: ToolResult) -> Self {
        Self::with_parts(Role::Tool, vec![ContentPart::ToolResult(result)])
    }

    /// Extract the text content, concatenating all text parts.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("")
    }

    /// Extract tool calls from this message.
    pub fn tool_calls(&self) -> Vec<&ToolInvocationRequest> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::ToolCall(tc) => Some(tc),
                _ => None,
            })
            .collect()
    }

    /// The tool result carried by this message, if any.
    pub fn tool_result_part(&self) -> Option<&ToolResult> {
        self.content.iter().find_map(|part| match part {
            ContentPart::ToolResult(result) => Some(result),
            _ => None,
        })
    }

    /// Images attached to this message.
    pub fn images(&self) -> Vec<&ImageContent> {
        self.content
            .iter()
            .filter_map(|part| match part {
                ContentPart::Image(img) => Some(img),
                _ => None,
            })
            .collect()
    }

    /// Call-linkage id: the id of the invocation this message requests or answers.
    pub fn call_id(&self) -> Option<&str> {
        self.content.iter().find_map(|part| match part {
            ContentPart::ToolCall(tc) => Some(tc.call_id.as_str()),
            ContentPart::ToolResult(tr) => Some(tr.call_id.as_str()),
            _ => None,
        })
    }

    /// Whether the message is plain text only.
    pub fn is_text_only(&self) -> bool {
        self.content
            .iter()
            .all(|part| matches!(part, ContentPart::Text { .. }))
    }
}

/// Conversation role.
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A single part of message content.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image(ImageContent),
    ToolCall(ToolInvocationRequest),
    ToolResult(ToolResult),
}

/// Image content embedded in a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageContent {
    /// Base64-encoded bytes.
    pub data: String,
    pub mime_type: String,
}

impl ImageContent {
    /// Render as a `data:` URL.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.data)
    }
}

/// A capability invocation requested by the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolInvocationRequest {
    pub call_id: String,
    pub capability_name: String,
    pub arguments: serde_json::Map<String, serde_json::Value>,
}

impl ToolInvocationRequest {
    pub fn new(
        call_id: impl Into<String>,
        capability_name: impl Into<String>,
        arguments: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            capability_name: capability_name.into(),
            arguments,
        }
    }

    /// Generate a fresh call id.
    pub fn fresh_id() -> String {
        format!("call_{}", uuid::Uuid::new_v4().simple())
    }
}

/// Outcome of one capability invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolResult {
    pub call_id: String,
    pub capability_name: String,
    pub output: String,
    #[serde(default)]
    pub is_error: bool,
}

impl ToolResult {
    pub fn success(request: &ToolInvocationRequest, output: impl Into<String>) -> Self {
        Self {
            call_id: request.call_id.clone(),
            capability_name: request.capability_name.clone(),
            output: output.into(),
            is_error: false,
        }
    }

    pub fn failure(request: &ToolInvocationRequest, output: impl Into<String>) -> Self {
        Self {
            is_error: true,
            ..Self::success(request, output)
        }
    }
}

/// What the presentation layer sends for one user turn.
#[derive(Debug, Clone, PartialEq)]
pub struct UserInput {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    pub fn with_attachment(text: impl Into<String>, attachment: Attachment) -> Self {
        Self {
            text: text.into(),
            attachment: Some(attachment),
        }
    }

    pub fn is_text_only(&self) -> bool {
        self.attachment.is_none()
    }
}

impl From<&str> for UserInput {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}

impl From<String> for UserInput {
    fn from(text: String) -> Self {
        Self::text(text)
    }
}

/// Raw binary attachment (typically an image).
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Attachment {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    fn to_image(&self) -> ImageContent {
        ImageContent {
            data: base64::engine::general_purpose::STANDARD.encode(&self.bytes),
            mime_type: self.mime_type.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attachment_becomes_base64_image_part() {
        let input = UserInput::with_attachment("look", Attachment::new(vec![1, 2, 3], "image/png"));
        let message = Message::from_input(&input);

        assert_eq!(message.role, Role::User);
        assert_eq!(message.text(), "look");
        assert_eq!(message.images()[0].data, "AQID");
        assert_eq!(message.images()[0].data_url(), "data:image/png;base64,AQID");
        assert!(!message.is_text_only());
    }

    #[test]
    fn call_id_links_request_and_result() {
        let call = ToolInvocationRequest::new("c1", "echo", serde_json::Map::new());
        let request = Message::assistant_tool_call("", call.clone());
        let result = Message::tool_result(ToolResult::success(&call, "ok"));

        assert_eq!(request.content.len(), 1);
        assert_eq!(request.call_id(), Some("c1"));
        assert_eq!(result.call_id(), Some("c1"));
        assert_eq!(result.tool_result_part().map(|r| r.output.as_str()), Some("ok"));
    }
}
