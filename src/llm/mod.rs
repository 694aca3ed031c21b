//! Hosted model collaborators.
//!
//! The loop and the tools only see the traits in [`provider`]; concrete
//! clients are built once at startup and injected.

pub mod errors;
pub mod ollama;
pub mod openai_compat;
pub mod provider;
pub mod types;

pub use errors::{LlmResult, ProviderError};
pub use ollama::OllamaCompleter;
pub use openai_compat::OpenAiCompatClient;
pub use provider::{ChatModel, LlmFuture, TextCompleter, VisionModel};
pub use types::{ChatRequest, EncodedImage, ModelReply};
