//! Client for OpenAI-compatible `/chat/completions` endpoints.
//!
//! One client type serves the three provider roles:
//! - the conversational model, with tool declarations,
//! - plain completions for the diagram explainer,
//! - vision requests (Groq speaks the same wire format).
//!
//! Every request goes through a `reqwest` client carrying both a connect and a
//! total timeout, so a stalled provider surfaces as [`ProviderError::Timeout`].

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::agent::message::{Message, ToolCallRequest};
use crate::config::ModelConfig;
use crate::llm::errors::{LlmResult, ProviderError};
use crate::llm::provider::{ChatModel, LlmFuture, TextCompleter, VisionModel};
use crate::llm::types::{ChatRequest, EncodedImage, ModelReply};
use crate::tools::ToolDescriptor;

/// HTTP client bound to one model on one OpenAI-compatible endpoint.
#[derive(Clone, Debug)]
pub struct OpenAiCompatClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    temperature: Option<f64>,
}

impl OpenAiCompatClient {
    /// Build a client from model settings.
    ///
    /// # Errors
    /// Returns an error if the model name is empty or the HTTP client cannot be built.
    pub fn new(config: &ModelConfig) -> LlmResult<Self> {
        if config.model.trim().is_empty() {
            return Err(ProviderError::InvalidConfig(
                "model name must not be empty".to_string(),
            ));
        }

        let client = Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            temperature: config.temperature,
        })
    }

    async fn post(&self, body: &CompletionBody<'_>) -> LlmResult<ResponseMessage> {
        let mut request = self.client.post(&self.endpoint).json(body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let parsed = response.json::<CompletionResponse>().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message)
            .ok_or_else(|| ProviderError::MalformedResponse("no choices in response".to_string()))
    }
}

impl ChatModel for OpenAiCompatClient {
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> LlmFuture<'a, LlmResult<ModelReply>> {
        Box::pin(async move {
            let body = CompletionBody {
                model: &self.model,
                messages: history_to_wire(request.system, request.messages),
                tools: request.tools.iter().map(WireTool::from).collect(),
                temperature: self.temperature,
            };

            debug!(
                model = %self.model,
                messages = body.messages.len(),
                tools = body.tools.len(),
                "chat completion request"
            );

            let message = self.post(&body).await?;
            Ok(reply_from_wire(message))
        })
    }
}

impl TextCompleter for OpenAiCompatClient {
    fn complete<'a>(
        &'a self,
        preamble: Option<&'a str>,
        prompt: &'a str,
    ) -> LlmFuture<'a, LlmResult<String>> {
        Box::pin(async move {
            let mut messages = Vec::with_capacity(2);
            if let Some(preamble) = preamble {
                messages.push(WireMessage::text("system", preamble));
            }
            messages.push(WireMessage::text("user", prompt));

            let body = CompletionBody {
                model: &self.model,
                messages,
                tools: Vec::new(),
                temperature: self.temperature,
            };

            let message = self.post(&body).await?;
            message
                .content
                .ok_or_else(|| ProviderError::MalformedResponse("completion had no content".to_string()))
        })
    }
}

impl VisionModel for OpenAiCompatClient {
    fn describe<'a>(
        &'a self,
        prompt: &'a str,
        image: &'a EncodedImage,
    ) -> LlmFuture<'a, LlmResult<String>> {
        Box::pin(async move {
            let body = CompletionBody {
                model: &self.model,
                messages: vec![vision_message(prompt, image)],
                tools: Vec::new(),
                temperature: None,
            };

            debug!(model = %self.model, media_type = image.media_type, "vision request");

            let message = self.post(&body).await?;
            message
                .content
                .ok_or_else(|| ProviderError::MalformedResponse("vision reply had no content".to_string()))
        })
    }
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<WireTool<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<WireContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

impl WireMessage {
    fn text(role: &'static str, content: &str) -> Self {
        Self {
            role,
            content: Some(WireContent::Text(content.to_string())),
            tool_calls: None,
            tool_call_id: None,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type", default = "function_kind")]
    kind: String,
    function: WireFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct WireFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

fn function_kind() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize)]
struct WireTool<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    function: WireFunctionSpec<'a>,
}

#[derive(Debug, Serialize)]
struct WireFunctionSpec<'a> {
    name: &'a str,
    description: &'a str,
    parameters: &'a Value,
}

impl<'a> From<&'a ToolDescriptor> for WireTool<'a> {
    fn from(descriptor: &'a ToolDescriptor) -> Self {
        Self {
            kind: "function",
            function: WireFunctionSpec {
                name: descriptor.name,
                description: descriptor.description,
                parameters: &descriptor.parameters,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

/// Map thread history onto the provider's message list.
///
/// Each tool request becomes an assistant message with a single `tool_calls`
/// entry, immediately followed by the matching `tool` message.
fn history_to_wire(system: &str, history: &[Message]) -> Vec<WireMessage> {
    let mut out = Vec::with_capacity(history.len() + 1);
    out.push(WireMessage::text("system", system));

    for message in history {
        let wire = match message {
            Message::User { content } => WireMessage::text("user", content),
            Message::Assistant { content } => WireMessage::text("assistant", content),
            Message::ToolRequest { call } => WireMessage {
                role: "assistant",
                content: None,
                tool_calls: Some(vec![WireToolCall {
                    id: call.id.clone(),
                    kind: function_kind(),
                    function: WireFunction {
                        name: call.name.clone(),
                        arguments: arguments_to_wire(&call.arguments),
                    },
                }]),
                tool_call_id: None,
            },
            Message::ToolResult {
                call_id, content, ..
            } => WireMessage {
                role: "tool",
                content: Some(WireContent::Text(content.clone())),
                tool_calls: None,
                tool_call_id: Some(call_id.clone()),
            },
        };
        out.push(wire);
    }

    out
}

fn vision_message(prompt: &str, image: &EncodedImage) -> WireMessage {
    WireMessage {
        role: "user",
        content: Some(WireContent::Parts(vec![
            ContentPart::Text {
                text: prompt.to_string(),
            },
            ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: image.data_url(),
                },
            },
        ])),
        tool_calls: None,
        tool_call_id: None,
    }
}

// Unparsable arguments are kept as a raw string so the tool can report them.
fn arguments_to_wire(arguments: &Value) -> String {
    match arguments {
        Value::String(raw) => raw.clone(),
        other => other.to_string(),
    }
}

fn arguments_from_wire(raw: String) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(serde_json::Map::new());
    }
    serde_json::from_str(&raw).unwrap_or(Value::String(raw))
}

fn reply_from_wire(message: ResponseMessage) -> ModelReply {
    let tool_calls = message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|call| ToolCallRequest {
            id: call.id,
            name: call.function.name,
            arguments: arguments_from_wire(call.function.arguments),
        })
        .collect();

    ModelReply {
        text: message.content.unwrap_or_default(),
        tool_calls,
    }
}
