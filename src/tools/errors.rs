//! Error types for tool dispatch.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::llm::errors::ProviderError;

/// Errors raised by tool handlers or the registry.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The image reference does not resolve to a readable file.
    #[error("image not found: {0}")]
    ImageNotFound(String),
    /// No diagram source was supplied or available in context.
    #[error("no diagram source is available to explain")]
    EmptyDiagram,
    /// Arguments did not match the tool schema.
    #[error("invalid arguments for {tool}: {reason}")]
    InvalidArguments {
        /// Tool name.
        tool: &'static str,
        /// What was wrong.
        reason: String,
    },
    /// The model named a tool that is not registered.
    #[error("unknown tool: {0}")]
    UnknownTool(String),
    /// Two handlers were registered under the same name.
    #[error("duplicate tool registration: {0}")]
    DuplicateTool(String),
    /// A required tool is missing from the registry.
    #[error("required tool is not registered: {0}")]
    MissingTool(String),
    /// The provider behind the tool failed.
    #[error("tool execution failed: {0}")]
    Execution(#[from] ProviderError),
}

/// Failure category recorded on a tool-result message.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolFailureKind {
    /// See [`ToolError::ImageNotFound`].
    ImageNotFound,
    /// See [`ToolError::EmptyDiagram`].
    EmptyDiagram,
    /// See [`ToolError::InvalidArguments`].
    InvalidArguments,
    /// See [`ToolError::UnknownTool`].
    UnknownTool,
    /// Any other execution failure.
    ExecutionError,
}

impl ToolError {
    /// Category used when the failure is recorded in history.
    #[must_use]
    pub const fn kind(&self) -> ToolFailureKind {
        match self {
            Self::ImageNotFound(_) => ToolFailureKind::ImageNotFound,
            Self::EmptyDiagram => ToolFailureKind::EmptyDiagram,
            Self::InvalidArguments { .. } => ToolFailureKind::InvalidArguments,
            Self::UnknownTool(_) => ToolFailureKind::UnknownTool,
            Self::DuplicateTool(_) | Self::MissingTool(_) | Self::Execution(_) => {
                ToolFailureKind::ExecutionError
            }
        }
    }
}
