//! Message domain types.
//!
//! A [`Message`] is a sum type keyed by role, so invalid shapes (an assistant
//! message with neither text nor tool calls, a tool result without a call id)
//! cannot be constructed. On the wire and in storage every message is the flat
//! chat-completions object `{role, content, tool_calls?, tool_call_id?}`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

/// Unique identifier for a conversation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConversationId(pub String);

impl ConversationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn from(s: &str) -> Self {
        Self(s.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConversationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConversationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
    Tool,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
            Role::Tool => "tool",
        }
    }
}

/// A model-requested tool invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call id; falls back to the tool name when the model omits one.
    pub id: String,

    /// Registry id of the tool to invoke
    pub name: String,

    #[serde(default)]
    pub parameters: Map<String, Value>,
}

impl ToolCall {
    pub fn new(
        id: Option<String>,
        name: impl Into<String>,
        parameters: Map<String, Value>,
    ) -> Self {
        let name = name.into();
        let id = id.filter(|id| !id.is_empty()).unwrap_or_else(|| name.clone());
        Self {
            id,
            name,
            parameters,
        }
    }

    pub fn record(&self) -> ToolCallRecord {
        ToolCallRecord {
            tool: self.name.clone(),
            parameters: self.parameters.clone(),
        }
    }
}

/// Per-turn log entry of a requested tool call, returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRecord {
    pub tool: String,
    pub parameters: Map<String, Value>,
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireMessage", into = "WireMessage")]
pub enum Message {
    System {
        content: String,
        timestamp: DateTime<Utc>,
    },
    User {
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// Final text reply.
    Assistant {
        content: String,
        timestamp: DateTime<Utc>,
    },
    /// Assistant turn that only requests tools (content is null on the wire).
    ToolRequest {
        tool_calls: Vec<ToolCall>,
        timestamp: DateTime<Utc>,
    },
    Tool {
        tool_call_id: String,
        content: String,
        timestamp: DateTime<Utc>,
    },
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::System {
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn tool_request(tool_calls: Vec<ToolCall>) -> Self {
        Self::ToolRequest {
            tool_calls,
            timestamp: Utc::now(),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self::Tool {
            tool_call_id: tool_call_id.into(),
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn role(&self) -> Role {
        match self {
            Self::System { .. } => Role::System,
            Self::User { .. } => Role::User,
            Self::Assistant { .. } | Self::ToolRequest { .. } => Role::Assistant,
            Self::Tool { .. } => Role::Tool,
        }
    }

    /// Text content, `None` for tool requests.
    pub fn content(&self) -> Option<&str> {
        match self {
            Self::System { content, .. }
            | Self::User { content, .. }
            | Self::Assistant { content, .. }
            | Self::Tool { content, .. } => Some(content),
            Self::ToolRequest { .. } => None,
        }
    }

    pub fn tool_calls(&self) -> &[ToolCall] {
        match self {
            Self::ToolRequest { tool_calls, .. } => tool_calls,
            _ => &[],
        }
    }

    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            Self::Tool { tool_call_id, .. } => Some(tool_call_id),
            _ => None,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::System { timestamp, .. }
            | Self::User { timestamp, .. }
            | Self::Assistant { timestamp, .. }
            | Self::ToolRequest { timestamp, .. }
            | Self::Tool { timestamp, .. } => *timestamp,
        }
    }
}

/// Check the pairing invariant: every tool result answers a call id issued by
/// an earlier tool request in the same sequence.
pub fn validate_sequence(messages: &[Message]) -> Result<(), MessageError> {
    let mut issued: Vec<&str> = Vec::new();
    for (index, message) in messages.iter().enumerate() {
        match message {
            Message::ToolRequest { tool_calls, .. } => {
                issued.extend(tool_calls.iter().map(|c| c.id.as_str()));
            }
            Message::Tool { tool_call_id, .. } => {
                if !issued.contains(&tool_call_id.as_str()) {
                    return Err(MessageError::UnmatchedToolResult {
                        index,
                        tool_call_id: tool_call_id.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MessageError {
    #[error("{role} message requires content")]
    MissingContent { role: &'static str },

    #[error("tool message requires tool_call_id")]
    MissingToolCallId,

    #[error("tool result at index {index} has no matching tool call '{tool_call_id}'")]
    UnmatchedToolResult { index: usize, tool_call_id: String },
}

// ── Wire form ──

fn now() -> DateTime<Utc> {
    Utc::now()
}

#[derive(Serialize, Deserialize)]
struct WireMessage {
    role: Role,
    content: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(default = "now")]
    timestamp: DateTime<Utc>,
}

impl TryFrom<WireMessage> for Message {
    type Error = MessageError;

    fn try_from(wire: WireMessage) -> Result<Self, Self::Error> {
        let timestamp = wire.timestamp;
        let content = |role: Role| {
            wire.content
                .clone()
                .ok_or(MessageError::MissingContent { role: role.as_str() })
        };
        Ok(match wire.role {
            Role::System => Message::System {
                content: content(Role::System)?,
                timestamp,
            },
            Role::User => Message::User {
                content: content(Role::User)?,
                timestamp,
            },
            Role::Assistant if !wire.tool_calls.is_empty() => Message::ToolRequest {
                tool_calls: wire.tool_calls,
                timestamp,
            },
            Role::Assistant => Message::Assistant {
                content: content(Role::Assistant)?,
                timestamp,
            },
            Role::Tool => Message::Tool {
                tool_call_id: wire.tool_call_id.ok_or(MessageError::MissingToolCallId)?,
                content: wire.content.unwrap_or_default(),
                timestamp,
            },
        })
    }
}

impl From<Message> for WireMessage {
    fn from(message: Message) -> Self {
        let role = message.role();
        match message {
            Message::System { content, timestamp }
            | Message::User { content, timestamp }
            | Message::Assistant { content, timestamp } => WireMessage {
                role,
                content: Some(content),
                tool_calls: Vec::new(),
                tool_call_id: None,
                timestamp,
            },
            Message::ToolRequest {
                tool_calls,
                timestamp,
            } => WireMessage {
                role,
                content: None,
                tool_calls,
                tool_call_id: None,
                timestamp,
            },
            Message::Tool {
                tool_call_id,
                content,
                timestamp,
            } => WireMessage {
                role,
                content: Some(content),
                tool_calls: Vec::new(),
                tool_call_id: Some(tool_call_id),
                timestamp,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tool_call_id_falls_back_to_name() {
        let call = ToolCall::new(None, "search_network", Map::new());
        assert_eq!(call.id, "search_network");

        let call = ToolCall::new(Some(String::new()), "search_network", Map::new());
        assert_eq!(call.id, "search_network");

        let call = ToolCall::new(Some("call_1".into()), "search_network", Map::new());
        assert_eq!(call.id, "call_1");
    }

    #[test]
    fn tool_request_serializes_null_content() {
        let msg = Message::tool_request(vec![ToolCall::new(
            Some("c1".into()),
            "search_network",
            json!({"query": "jazz"}).as_object().cloned().unwrap(),
        )]);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["role"], "assistant");
        assert!(value["content"].is_null());
        assert_eq!(value["tool_calls"][0]["name"], "search_network");
        assert_eq!(value["tool_calls"][0]["parameters"]["query"], "jazz");
    }

    #[test]
    fn assistant_without_content_or_calls_is_rejected() {
        let err = serde_json::from_value::<Message>(json!({
            "role": "assistant",
            "content": null
        }))
        .unwrap_err();
        assert!(err.to_string().contains("requires content"));
    }

    #[test]
    fn tool_message_requires_call_id() {
        let err = serde_json::from_value::<Message>(json!({
            "role": "tool",
            "content": "{}"
        }))
        .unwrap_err();
        assert!(err.to_string().contains("tool_call_id"));
    }

    #[test]
    fn decodes_stored_tool_result() {
        let msg: Message = serde_json::from_value(json!({
            "role": "tool",
            "content": "{\"success\":true}",
            "tool_call_id": "c1",
            "timestamp": "2026-01-02T03:04:05Z"
        }))
        .unwrap();
        assert_eq!(msg.role(), Role::Tool);
        assert_eq!(msg.tool_call_id(), Some("c1"));
    }

    #[test]
    fn sequence_rejects_orphan_tool_result() {
        let messages = vec![Message::user("hi"), Message::tool_result("c9", "{}")];
        let err = validate_sequence(&messages).unwrap_err();
        assert_eq!(
            err,
            MessageError::UnmatchedToolResult {
                index: 1,
                tool_call_id: "c9".into()
            }
        );
    }

    #[test]
    fn sequence_accepts_paired_tool_result() {
        let messages = vec![
            Message::user("hi"),
            Message::tool_request(vec![ToolCall::new(Some("c1".into()), "t", Map::new())]),
            Message::tool_result("c1", "{}"),
        ];
        assert!(validate_sequence(&messages).is_ok());
    }
}
