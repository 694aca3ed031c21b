//! Local diagram explainer backed by Ollama through Rig.

use std::time::Duration;

use reqwest::Client as ReqwestClient;
use rig::client::CompletionClient;
use rig::completion::CompletionModel;
use rig::message::AssistantContent;
use rig::providers::ollama;
use tracing::debug;

use crate::config::ExplainerConfig;
use crate::llm::errors::{LlmResult, ProviderError};
use crate::llm::provider::{LlmFuture, TextCompleter, with_timeout};

/// Text completer running against a local (or remote) Ollama server.
pub struct OllamaCompleter {
    model: ollama::CompletionModel,
    model_name: String,
    temperature: f64,
    request_timeout: Duration,
}

impl OllamaCompleter {
    /// Create a completer from the explainer settings.
    ///
    /// # Errors
    /// Returns an error if the Ollama client cannot be built.
    pub fn new(config: &ExplainerConfig) -> LlmResult<Self> {
        let builder = ollama::Client::<ReqwestClient>::builder().api_key(rig::client::Nothing);
        let builder = if let Some(base_url) = &config.ollama_base_url {
            builder.base_url(base_url)
        } else {
            builder
        };
        let client = builder.build().map_err(ProviderError::from)?;
        let model = client.completion_model(config.ollama_model.clone());

        Ok(Self {
            model,
            model_name: config.ollama_model.clone(),
            temperature: config.temperature,
            request_timeout: config.request_timeout,
        })
    }
}

impl TextCompleter for OllamaCompleter {
    fn complete<'a>(
        &'a self,
        preamble: Option<&'a str>,
        prompt: &'a str,
    ) -> LlmFuture<'a, LlmResult<String>> {
        Box::pin(async move {
            debug!(model = %self.model_name, "ollama completion request");

            let builder = self
                .model
                .completion_request(prompt.to_string())
                .temperature(self.temperature);
            let builder = if let Some(preamble) = preamble {
                builder.preamble(preamble.to_string())
            } else {
                builder
            };

            let request = builder.build();
            let response = with_timeout(self.request_timeout, async {
                self.model
                    .completion(request)
                    .await
                    .map_err(ProviderError::from)
            })
            .await?;
            let text = extract_text(&response.choice);
            if text.is_empty() {
                return Err(ProviderError::MalformedResponse(
                    "ollama returned no text".to_string(),
                ));
            }
            Ok(text)
        })
    }
}

fn extract_text(choice: &rig::OneOrMany<AssistantContent>) -> String {
    let mut out = String::new();
    for content in choice.iter() {
        if let AssistantContent::Text(text) = content {
            out.push_str(&text.text);
        }
    }
    out
}
