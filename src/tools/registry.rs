//! Tool descriptors and the name → handler dispatch table.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::agent::message::ToolCallRequest;
use crate::tools::errors::{ToolError, ToolFailureKind};

/// Boxed future type for tool handlers.
pub type ToolFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Static description of a tool, declared to the model.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolDescriptor {
    /// Name the model uses to request the tool.
    pub name: &'static str,
    /// When the tool applies, in natural language.
    pub description: &'static str,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// Thread context visible to tools during a turn.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ToolContext {
    /// Current diagram source text.
    pub diagram_source: Option<String>,
    /// Current image reference.
    pub image_reference: Option<String>,
}

/// A typed tool implementation.
pub trait ToolHandler: Send + Sync {
    /// Descriptor declared to the model.
    fn descriptor(&self) -> ToolDescriptor;

    /// Run the tool with model-supplied `arguments`.
    ///
    /// # Errors
    /// Returns an error if the arguments are unusable or the work fails.
    fn call<'a>(
        &'a self,
        arguments: &'a Value,
        context: &'a ToolContext,
    ) -> ToolFuture<'a, Result<String, ToolError>>;
}

/// Result of dispatching one tool call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolOutcome {
    /// The tool produced text.
    Success(String),
    /// The tool failed; the message is fed back to the model.
    Failure {
        /// Failure category.
        kind: ToolFailureKind,
        /// Human-readable description.
        message: String,
    },
}

impl ToolOutcome {
    fn from_error(error: &ToolError) -> Self {
        Self::Failure {
            kind: error.kind(),
            message: format!("error: {error}"),
        }
    }

    /// Text recorded in the tool-result message.
    #[must_use]
    pub fn content(&self) -> &str {
        match self {
            Self::Success(text) => text,
            Self::Failure { message, .. } => message,
        }
    }

    /// Failure category, if any.
    #[must_use]
    pub const fn failure_kind(&self) -> Option<ToolFailureKind> {
        match self {
            Self::Success(_) => None,
            Self::Failure { kind, .. } => Some(*kind),
        }
    }
}

/// Explicit mapping from tool name to handler.
pub struct ToolRegistry {
    handlers: HashMap<&'static str, Arc<dyn ToolHandler>>,
    descriptors: Vec<ToolDescriptor>,
}

impl ToolRegistry {
    /// Build a registry, rejecting duplicate names.
    ///
    /// # Errors
    /// Returns [`ToolError::DuplicateTool`] if two handlers share a name.
    pub fn new(handlers: Vec<Arc<dyn ToolHandler>>) -> Result<Self, ToolError> {
        let mut registry = Self {
            handlers: HashMap::with_capacity(handlers.len()),
            descriptors: Vec::with_capacity(handlers.len()),
        };

        for handler in handlers {
            let descriptor = handler.descriptor();
            if registry.handlers.contains_key(descriptor.name) {
                return Err(ToolError::DuplicateTool(descriptor.name.to_string()));
            }
            registry.handlers.insert(descriptor.name, handler);
            registry.descriptors.push(descriptor);
        }

        Ok(registry)
    }

    /// Check that every name in `required` has a handler.
    ///
    /// # Errors
    /// Returns [`ToolError::MissingTool`] for the first missing name.
    pub fn verify_complete(&self, required: &[&str]) -> Result<(), ToolError> {
        for name in required {
            if !self.handlers.contains_key(*name) {
                return Err(ToolError::MissingTool((*name).to_string()));
            }
        }
        Ok(())
    }

    /// Descriptors in registration order.
    #[must_use]
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.descriptors
    }

    /// Run one requested call; failures become [`ToolOutcome::Failure`].
    pub async fn dispatch(&self, call: &ToolCallRequest, context: &ToolContext) -> ToolOutcome {
        let Some(handler) = self.handlers.get(call.name.as_str()) else {
            warn!(tool = %call.name, "model requested an unknown tool");
            return ToolOutcome::from_error(&ToolError::UnknownTool(call.name.clone()));
        };

        debug!(tool = %call.name, call_id = %call.id, "dispatching tool call");

        match handler.call(&call.arguments, context).await {
            Ok(text) => ToolOutcome::Success(text),
            Err(error) => {
                warn!(tool = %call.name, call_id = %call.id, "tool failed: {error}");
                ToolOutcome::from_error(&error)
            }
        }
    }
}
