//! Error types for the conversation loop.

use thiserror::Error;

use crate::agent::state::ThreadId;
use crate::llm::errors::ProviderError;
use crate::tools::ToolError;

/// Errors surfaced by [`crate::agent::FlowchartAssistant`].
#[derive(Debug, Error)]
pub enum AgentError {
    /// The user message was empty.
    #[error("message must not be empty")]
    EmptyMessage,
    /// The conversational model could not be reached or failed.
    #[error("model unavailable: {0}")]
    ModelUnavailable(#[source] ProviderError),
    /// The model kept requesting tools past the configured limit.
    #[error("turn exceeded {limit} model round-trips")]
    IterationLimit {
        /// Configured maximum.
        limit: usize,
    },
    /// Tool setup failed.
    #[error("tool execution error: {0}")]
    ToolExecution(#[from] ToolError),
    /// No thread with this id exists.
    #[error("unknown thread: {0}")]
    UnknownThread(ThreadId),
}

/// Convenience result alias for loop operations.
pub type AgentResult<T> = Result<T, AgentError>;
