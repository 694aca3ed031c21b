//! Error types for provider calls.

use thiserror::Error;

/// Errors raised while talking to a hosted completion provider.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The request exceeded its timeout.
    #[error("provider request timed out")]
    Timeout,
    /// Transport or decoding failure from the HTTP client.
    #[error("http request failed: {0}")]
    Http(#[source] reqwest::Error),
    /// The provider answered with a non-success status.
    #[error("provider returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as returned.
        body: String,
    },
    /// The response decoded but did not carry what we need.
    #[error("malformed provider response: {0}")]
    MalformedResponse(String),
    /// Client construction failed because of bad settings.
    #[error("invalid provider configuration: {0}")]
    InvalidConfig(String),
    /// HTTP client error from Rig.
    #[error("http client error: {0}")]
    HttpClient(#[from] rig::http_client::Error),
    /// Completion error from Rig.
    #[error("completion error: {0}")]
    Completion(#[from] rig::completion::CompletionError),
}

impl From<reqwest::Error> for ProviderError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(value)
        }
    }
}

/// Convenience result alias for provider calls.
pub type LlmResult<T> = Result<T, ProviderError>;
