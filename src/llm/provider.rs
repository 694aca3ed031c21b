//! Provider seams injected into the conversation loop and the tools.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::llm::errors::{LlmResult, ProviderError};
use crate::llm::types::{ChatRequest, EncodedImage, ModelReply};

/// Boxed future type for provider operations.
pub type LlmFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Conversational model able to request tool calls.
pub trait ChatModel: Send + Sync {
    /// Run one completion over the system context and history.
    ///
    /// # Errors
    /// Returns an error if the provider cannot be reached or answers badly.
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> LlmFuture<'a, LlmResult<ModelReply>>;
}

/// Plain text completion, used by the diagram explainer.
pub trait TextCompleter: Send + Sync {
    /// Complete `prompt`, optionally under a system `preamble`.
    ///
    /// # Errors
    /// Returns an error if the provider call fails.
    fn complete<'a>(
        &'a self,
        preamble: Option<&'a str>,
        prompt: &'a str,
    ) -> LlmFuture<'a, LlmResult<String>>;
}

/// Vision-capable model describing images.
pub trait VisionModel: Send + Sync {
    /// Describe `image` following `prompt`.
    ///
    /// # Errors
    /// Returns an error if the provider call fails.
    fn describe<'a>(
        &'a self,
        prompt: &'a str,
        image: &'a EncodedImage,
    ) -> LlmFuture<'a, LlmResult<String>>;
}

/// Bound `call` by `limit`; an elapsed deadline becomes [`ProviderError::Timeout`].
pub(crate) async fn with_timeout<T, F>(limit: Duration, call: F) -> LlmResult<T>
where
    F: Future<Output = LlmResult<T>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or(Err(ProviderError::Timeout))
}
