//! Messages stored in a conversation thread.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tools::ToolFailureKind;

/// Role of a message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// User input.
    User,
    /// Final assistant answer.
    Assistant,
    /// Tool invocation emitted by the model.
    ToolRequest,
    /// Output of a tool invocation.
    ToolResult,
}

impl Role {
    /// Stable string form.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::ToolRequest => "tool_request",
            Self::ToolResult => "tool_result",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A tool invocation requested by the model.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Provider-assigned call id, echoed on the result.
    pub id: String,
    /// Requested tool name.
    pub name: String,
    /// Arguments object as sent by the model.
    pub arguments: Value,
}

/// One immutable entry of a thread's history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "snake_case")]
pub enum Message {
    /// User input.
    User {
        /// Text typed by the user.
        content: String,
    },
    /// Final assistant answer for a turn.
    Assistant {
        /// Answer text.
        content: String,
    },
    /// A tool call the model asked for.
    ToolRequest {
        /// The call.
        call: ToolCallRequest,
    },
    /// What a tool returned.
    ToolResult {
        /// Id of the originating call.
        call_id: String,
        /// Name of the tool that produced this result.
        tool_name: String,
        /// Raw textual result, or an error description.
        content: String,
        /// Set when the tool failed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<ToolFailureKind>,
    },
}

impl Message {
    /// Build a user message.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::User {
            content: content.into(),
        }
    }

    /// Build an assistant message.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::Assistant {
            content: content.into(),
        }
    }

    /// Build a tool-request message.
    #[must_use]
    pub const fn tool_request(call: ToolCallRequest) -> Self {
        Self::ToolRequest { call }
    }

    /// Build a tool-result message.
    #[must_use]
    pub fn tool_result(
        call_id: impl Into<String>,
        tool_name: impl Into<String>,
        content: impl Into<String>,
        error: Option<ToolFailureKind>,
    ) -> Self {
        Self::ToolResult {
            call_id: call_id.into(),
            tool_name: tool_name.into(),
            content: content.into(),
            error,
        }
    }

    /// Role of this message.
    #[must_use]
    pub const fn role(&self) -> Role {
        match self {
            Self::User { .. } => Role::User,
            Self::Assistant { .. } => Role::Assistant,
            Self::ToolRequest { .. } => Role::ToolRequest,
            Self::ToolResult { .. } => Role::ToolResult,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_role_names_match_serde() {
        for role in [Role::User, Role::Assistant, Role::ToolRequest, Role::ToolResult] {
            let value = serde_json::to_value(role).unwrap_or_default();
            assert_eq!(value, role.as_str());
            assert_eq!(role.to_string(), role.as_str());
        }
    }

    #[test]
    fn test_serialized_shape() {
        let message = Message::tool_result(
            "call_1",
            "describe-image",
            "error: image not found: a.png",
            Some(ToolFailureKind::ImageNotFound),
        );
        let value = serde_json::to_value(&message).unwrap_or_default();
        assert_eq!(value["role"], "tool_result");
        assert_eq!(value["tool_name"], "describe-image");
        assert_eq!(value["error"], "image_not_found");

        let ok = serde_json::to_value(Message::tool_result("c", "t", "fine", None)).unwrap_or_default();
        assert!(ok.get("error").is_none());
    }

    #[test]
    fn test_role_of_each_variant() {
        let request = Message::tool_request(ToolCallRequest {
            id: "c".to_string(),
            name: "explain-diagram-source".to_string(),
            arguments: json!({}),
        });
        assert_eq!(request.role(), Role::ToolRequest);
        assert_eq!(Message::user("hi").role(), Role::User);
        assert_eq!(Message::assistant("ok").role(), Role::Assistant);
    }
}
