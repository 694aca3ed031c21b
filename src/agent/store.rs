//! Keyed in-memory store of conversation threads.
//!
//! Each thread has two locks. The writer lock is held for a whole turn (or a
//! context update) and serializes writers. The committed state sits behind a
//! read/write lock that writers only take to publish a finished draft, so
//! readers never wait for a model round-trip.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::agent::state::{ConversationState, ThreadId};

/// One thread: writer lock plus committed state.
#[derive(Debug)]
pub struct ThreadSlot {
    writer: Mutex<()>,
    state: RwLock<ConversationState>,
}

/// Proof that the caller holds a thread's writer lock.
pub type WriterGuard<'a> = MutexGuard<'a, ()>;

impl ThreadSlot {
    fn new(thread_id: ThreadId) -> Self {
        Self {
            writer: Mutex::new(()),
            state: RwLock::new(ConversationState::new(thread_id)),
        }
    }

    /// Wait until no other writer is active on this thread.
    pub async fn begin_write(&self) -> WriterGuard<'_> {
        self.writer.lock().await
    }

    /// Copy of the committed state; does not wait for running turns.
    pub async fn read(&self) -> ConversationState {
        self.state.read().await.clone()
    }

    /// Publish `state` as the committed state.
    pub async fn commit(&self, _writer: &WriterGuard<'_>, state: ConversationState) {
        *self.state.write().await = state;
    }
}

/// Shared handle to one thread.
pub type ThreadHandle = Arc<ThreadSlot>;

/// Listing entry for a thread.
#[derive(Clone, Debug, Serialize)]
pub struct ThreadSummary {
    /// Thread identifier.
    pub thread_id: ThreadId,
    /// Number of stored messages.
    pub message_count: usize,
    /// Whether a diagram source is attached.
    pub has_diagram: bool,
    /// Whether an image is attached.
    pub has_image: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last update time.
    pub updated_at: DateTime<Utc>,
}

impl ThreadSummary {
    fn of(state: &ConversationState) -> Self {
        Self {
            thread_id: state.thread_id.clone(),
            message_count: state.messages().len(),
            has_diagram: state.diagram_source.is_some(),
            has_image: state.image_reference.is_some(),
            created_at: state.created_at,
            updated_at: state.updated_at,
        }
    }
}

/// Mapping thread id → slot, safe to share across tasks.
#[derive(Default)]
pub struct ConversationStore {
    threads: DashMap<ThreadId, ThreadHandle>,
}

impl ConversationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for `thread_id`, creating an empty thread if needed.
    #[must_use]
    pub fn get_or_create(&self, thread_id: &ThreadId) -> ThreadHandle {
        self.threads
            .entry(thread_id.clone())
            .or_insert_with(|| Arc::new(ThreadSlot::new(thread_id.clone())))
            .clone()
    }

    /// Handle for an existing thread.
    #[must_use]
    pub fn get(&self, thread_id: &ThreadId) -> Option<ThreadHandle> {
        self.threads.get(thread_id).map(|entry| entry.value().clone())
    }

    /// Committed state of a thread.
    pub async fn snapshot(&self, thread_id: &ThreadId) -> Option<ConversationState> {
        let slot = self.get(thread_id)?;
        Some(slot.read().await)
    }

    /// Summaries of every thread, most recently updated first.
    pub async fn summaries(&self) -> Vec<ThreadSummary> {
        // Collect handles first so no map shard stays locked across an await.
        let slots: Vec<ThreadHandle> = self
            .threads
            .iter()
            .map(|entry| entry.value().clone())
            .collect();

        let mut summaries = Vec::with_capacity(slots.len());
        for slot in slots {
            let state = slot.state.read().await;
            summaries.push(ThreadSummary::of(&state));
        }
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        summaries
    }

    /// Drop a thread. Returns whether it existed.
    pub fn remove(&self, thread_id: &ThreadId) -> bool {
        self.threads.remove(thread_id).is_some()
    }
}
