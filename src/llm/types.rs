//! Request and reply types shared by every provider.

use crate::agent::message::{Message, ToolCallRequest};
use crate::tools::ToolDescriptor;

/// One invocation of the conversational model.
#[derive(Clone, Copy, Debug)]
pub struct ChatRequest<'a> {
    /// System context placed ahead of the history.
    pub system: &'a str,
    /// Full ordered history of the thread.
    pub messages: &'a [Message],
    /// Tools the model may ask to run.
    pub tools: &'a [ToolDescriptor],
}

/// What the conversational model answered.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ModelReply {
    /// Plain text content (may be empty when tools are requested).
    pub text: String,
    /// Tool invocations requested by the model, in the order received.
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    /// A reply carrying only text.
    #[must_use]
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tool_calls: Vec::new(),
        }
    }

    /// A reply requesting tool calls.
    #[must_use]
    pub const fn tools(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            text: String::new(),
            tool_calls,
        }
    }

    /// Whether the model asked for at least one tool.
    #[must_use]
    pub fn requests_tools(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// An image ready to be embedded in a vision request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncodedImage {
    /// MIME type, e.g. `image/png`.
    pub media_type: &'static str,
    /// Standard base64 payload.
    pub data: String,
}

impl EncodedImage {
    /// Render as a `data:` URL.
    #[must_use]
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.media_type, self.data)
    }
}
