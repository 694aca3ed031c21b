//! Per-thread conversation state.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::agent::message::Message;
use crate::tools::ToolContext;

/// Opaque, caller-chosen conversation identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThreadId(String);

impl ThreadId {
    /// Generate a random identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Borrow as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ThreadId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for ThreadId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for ThreadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Everything remembered about one thread.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    /// Thread identifier.
    pub thread_id: ThreadId,
    /// Append-only chronological history.
    messages: Vec<Message>,
    /// Current diagram source text.
    pub diagram_source: Option<String>,
    /// Current image reference.
    pub image_reference: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last time a turn or context update was committed.
    pub updated_at: DateTime<Utc>,
}

impl ConversationState {
    /// Empty state for `thread_id`.
    #[must_use]
    pub fn new(thread_id: ThreadId) -> Self {
        let now = Utc::now();
        Self {
            thread_id,
            messages: Vec::new(),
            diagram_source: None,
            image_reference: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Ordered history.
    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Append a message.
    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Replace the diagram source; blank text clears it.
    pub fn set_diagram_source(&mut self, source: Option<String>) {
        self.diagram_source = non_blank(source);
        self.touch();
    }

    /// Replace the image reference; blank text clears it.
    pub fn set_image_reference(&mut self, reference: Option<String>) {
        self.image_reference = non_blank(reference);
        self.touch();
    }

    /// Apply per-call context: `None` keeps the current value.
    pub fn apply_context(&mut self, diagram_source: Option<String>, image_reference: Option<String>) {
        if diagram_source.is_some() {
            self.set_diagram_source(diagram_source);
        }
        if image_reference.is_some() {
            self.set_image_reference(image_reference);
        }
    }

    /// Snapshot of the context handed to tools.
    #[must_use]
    pub fn tool_context(&self) -> ToolContext {
        ToolContext {
            diagram_source: self.diagram_source.clone(),
            image_reference: self.image_reference.clone(),
        }
    }

    /// Bump `updated_at`.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
