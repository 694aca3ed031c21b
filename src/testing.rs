//! Scripted provider stubs shared by unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use tokio::sync::Notify;

use crate::agent::message::{Message, ToolCallRequest};
use crate::diagram::errors::DiagramError;
use crate::diagram::plantuml::{DiagramRenderer, RenderFuture};
use crate::llm::errors::{LlmResult, ProviderError};
use crate::llm::provider::{ChatModel, LlmFuture, TextCompleter, VisionModel};
use crate::llm::types::{ChatRequest, EncodedImage, ModelReply};

/// What the chat stub saw on one invocation.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub system: String,
    pub messages: Vec<Message>,
    pub tool_names: Vec<&'static str>,
}

/// Chat model answering from a fixed script.
pub struct ScriptedChat {
    script: Mutex<VecDeque<LlmResult<ModelReply>>>,
    repeat: Option<ModelReply>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl ScriptedChat {
    pub fn new(script: Vec<LlmResult<ModelReply>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            repeat: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies(replies: Vec<ModelReply>) -> Self {
        Self::new(replies.into_iter().map(Ok).collect())
    }

    /// Answers `reply` forever.
    pub fn always(reply: ModelReply) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            repeat: Some(reply),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl ChatModel for ScriptedChat {
    fn chat<'a>(&'a self, request: ChatRequest<'a>) -> LlmFuture<'a, LlmResult<ModelReply>> {
        Box::pin(async move {
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(RecordedRequest {
                    system: request.system.to_string(),
                    messages: request.messages.to_vec(),
                    tool_names: request.tools.iter().map(|t| t.name).collect(),
                });
            }

            let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
            match (next, &self.repeat) {
                (Some(result), _) => result,
                (None, Some(reply)) => Ok(reply.clone()),
                (None, None) => Err(ProviderError::MalformedResponse(
                    "script exhausted".to_string(),
                )),
            }
        })
    }
}

/// Chat model that never answers; `started` fires once a call is in flight.
#[derive(Default)]
pub struct PendingChat {
    pub started: Notify,
}

impl ChatModel for PendingChat {
    fn chat<'a>(&'a self, _request: ChatRequest<'a>) -> LlmFuture<'a, LlmResult<ModelReply>> {
        Box::pin(async move {
            self.started.notify_one();
            std::future::pending().await
        })
    }
}

/// Text completer recording every prompt.
pub struct RecordingCompleter {
    reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl RecordingCompleter {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl TextCompleter for RecordingCompleter {
    fn complete<'a>(
        &'a self,
        _preamble: Option<&'a str>,
        prompt: &'a str,
    ) -> LlmFuture<'a, LlmResult<String>> {
        Box::pin(async move {
            if let Ok(mut prompts) = self.prompts.lock() {
                prompts.push(prompt.to_string());
            }
            self.reply.clone().ok_or(ProviderError::Timeout)
        })
    }
}

/// Vision model recording the images it was shown.
pub struct StubVision {
    reply: String,
    images: Mutex<Vec<(String, EncodedImage)>>,
}

impl StubVision {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            images: Mutex::new(Vec::new()),
        }
    }

    pub fn images(&self) -> Vec<(String, EncodedImage)> {
        self.images.lock().map(|i| i.clone()).unwrap_or_default()
    }
}

impl VisionModel for StubVision {
    fn describe<'a>(
        &'a self,
        prompt: &'a str,
        image: &'a EncodedImage,
    ) -> LlmFuture<'a, LlmResult<String>> {
        Box::pin(async move {
            if let Ok(mut images) = self.images.lock() {
                images.push((prompt.to_string(), image.clone()));
            }
            Ok(self.reply.clone())
        })
    }
}

/// Renderer returning fixed bytes, or failing when built with `failing`.
pub struct StubRenderer {
    png: Option<Vec<u8>>,
}

impl StubRenderer {
    pub fn replying(png: &[u8]) -> Self {
        Self {
            png: Some(png.to_vec()),
        }
    }

    pub fn failing() -> Self {
        Self { png: None }
    }
}

impl DiagramRenderer for StubRenderer {
    fn render_png<'a>(&'a self, _source: &'a str) -> RenderFuture<'a> {
        Box::pin(async move {
            self.png.clone().ok_or(DiagramError::Status {
                status: 503,
                body: "unavailable".to_string(),
            })
        })
    }
}

/// A tool call with a fixed id.
pub fn tool_call(id: &str, name: &str, arguments: serde_json::Value) -> ToolCallRequest {
    ToolCallRequest {
        id: id.to_string(),
        name: name.to_string(),
        arguments,
    }
}
