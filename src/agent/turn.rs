//! The tool-routing turn loop.
//!
//! A turn walks `AwaitingModel → (Done | ExecutingTools → AwaitingModel)`:
//! the model sees the system context plus the whole thread history, and every
//! tool call it requests is executed in order, recorded as a request/result
//! pair, and fed back on the next invocation.
//!
//! Turns work on a copy of the thread state which replaces the stored state
//! only when the turn reaches `Done`. A failed turn leaves history untouched,
//! and readers see the last committed state while a turn is running.

use std::sync::Arc;

use tracing::{debug, info};

use crate::agent::errors::{AgentError, AgentResult};
use crate::agent::message::{Message, ToolCallRequest};
use crate::agent::prompt::system_context;
use crate::agent::state::{ConversationState, ThreadId};
use crate::agent::store::{ConversationStore, ThreadSummary};
use crate::config::AgentConfig;
use crate::llm::provider::ChatModel;
use crate::llm::types::ChatRequest;
use crate::tools::ToolRegistry;

/// Where a turn currently stands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    /// The model is about to be invoked.
    AwaitingModel,
    /// The model asked for these tools.
    ExecutingTools(Vec<ToolCallRequest>),
    /// The model answered without tools.
    Done(String),
}

/// Conversation loop over a keyed thread store.
pub struct FlowchartAssistant {
    model: Arc<dyn ChatModel>,
    tools: Arc<ToolRegistry>,
    store: ConversationStore,
    max_round_trips: usize,
}

impl FlowchartAssistant {
    /// Wire the loop to a model and a tool registry.
    #[must_use]
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<ToolRegistry>, config: &AgentConfig) -> Self {
        Self {
            model,
            tools,
            store: ConversationStore::new(),
            max_round_trips: config.max_round_trips.max(1),
        }
    }

    /// Start a new empty thread with a random id.
    #[must_use]
    pub fn create_thread(&self) -> ThreadId {
        let thread_id = ThreadId::random();
        let _ = self.store.get_or_create(&thread_id);
        thread_id
    }

    /// Run one turn and return the assistant's answer.
    ///
    /// `diagram_source` and `image_reference` replace the thread context when
    /// given and stay in effect for later turns.
    ///
    /// # Errors
    /// - [`AgentError::EmptyMessage`] if `user_text` is blank.
    /// - [`AgentError::ModelUnavailable`] if the model call fails.
    /// - [`AgentError::IterationLimit`] if the model never stops requesting tools.
    pub async fn submit(
        &self,
        thread_id: &ThreadId,
        user_text: &str,
        diagram_source: Option<String>,
        image_reference: Option<String>,
    ) -> AgentResult<String> {
        if user_text.trim().is_empty() {
            return Err(AgentError::EmptyMessage);
        }

        let slot = self.store.get_or_create(thread_id);
        let writer = slot.begin_write().await;

        let mut draft = slot.read().await;
        let committed_len = draft.messages().len();
        draft.apply_context(diagram_source, image_reference);
        draft.push(Message::user(user_text));

        info!(thread = %thread_id, "turn started");
        let reply = self.run_turn(&mut draft).await?;

        draft.touch();
        let added = draft.messages().len() - committed_len;
        slot.commit(&writer, draft).await;
        info!(thread = %thread_id, messages = added, "turn finished");

        Ok(reply)
    }

    async fn run_turn(&self, state: &mut ConversationState) -> AgentResult<String> {
        let mut phase = TurnPhase::AwaitingModel;
        let mut round_trips = 0_usize;

        loop {
            phase = match phase {
                TurnPhase::AwaitingModel => {
                    if round_trips == self.max_round_trips {
                        return Err(AgentError::IterationLimit {
                            limit: self.max_round_trips,
                        });
                    }
                    round_trips += 1;

                    let system = system_context(
                        state.diagram_source.as_deref(),
                        state.image_reference.as_deref(),
                    );
                    let request = ChatRequest {
                        system: &system,
                        messages: state.messages(),
                        tools: self.tools.descriptors(),
                    };

                    debug!(thread = %state.thread_id, round_trip = round_trips, "invoking model");
                    let reply = self
                        .model
                        .chat(request)
                        .await
                        .map_err(AgentError::ModelUnavailable)?;

                    if reply.requests_tools() {
                        TurnPhase::ExecutingTools(reply.tool_calls)
                    } else {
                        TurnPhase::Done(reply.text)
                    }
                }
                TurnPhase::ExecutingTools(calls) => {
                    let context = state.tool_context();
                    for call in calls {
                        state.push(Message::tool_request(call.clone()));
                        let outcome = self.tools.dispatch(&call, &context).await;
                        state.push(Message::tool_result(
                            call.id,
                            call.name,
                            outcome.content(),
                            outcome.failure_kind(),
                        ));
                    }
                    TurnPhase::AwaitingModel
                }
                TurnPhase::Done(text) => {
                    state.push(Message::assistant(text.clone()));
                    return Ok(text);
                }
            };
        }
    }

    /// Full state of a thread, for display.
    ///
    /// # Errors
    /// Returns [`AgentError::UnknownThread`] if the thread does not exist.
    pub async fn history(&self, thread_id: &ThreadId) -> AgentResult<ConversationState> {
        self.store
            .snapshot(thread_id)
            .await
            .ok_or_else(|| AgentError::UnknownThread(thread_id.clone()))
    }

    /// Replace the diagram source of a thread, creating it if needed.
    ///
    /// Waits for a running turn on the thread to finish.
    pub async fn set_diagram_source(&self, thread_id: &ThreadId, source: Option<String>) {
        self.update(thread_id, |state| state.set_diagram_source(source))
            .await;
    }

    /// Replace the image reference of a thread, creating it if needed.
    ///
    /// Waits for a running turn on the thread to finish.
    pub async fn set_image_reference(&self, thread_id: &ThreadId, reference: Option<String>) {
        self.update(thread_id, |state| state.set_image_reference(reference))
            .await;
    }

    async fn update<F>(&self, thread_id: &ThreadId, change: F)
    where
        F: FnOnce(&mut ConversationState),
    {
        let slot = self.store.get_or_create(thread_id);
        let writer = slot.begin_write().await;
        let mut state = slot.read().await;
        change(&mut state);
        slot.commit(&writer, state).await;
    }

    /// Summaries of all threads.
    pub async fn threads(&self) -> Vec<ThreadSummary> {
        self.store.summaries().await
    }

    /// Forget a thread.
    ///
    /// # Errors
    /// Returns [`AgentError::UnknownThread`] if the thread does not exist.
    pub fn delete_thread(&self, thread_id: &ThreadId) -> AgentResult<()> {
        if self.store.remove(thread_id) {
            Ok(())
        } else {
            Err(AgentError::UnknownThread(thread_id.clone()))
        }
    }
}
