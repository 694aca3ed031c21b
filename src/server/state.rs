//! Application state shared across all request handlers.

use std::sync::Arc;

use crate::agent::FlowchartAssistant;
use crate::diagram::{DiagramRenderer, UploadStore};

/// Shared application state.
pub struct AppState {
    /// Conversation loop and thread store.
    pub assistant: FlowchartAssistant,
    /// Renders uploaded diagram source for display.
    pub renderer: Arc<dyn DiagramRenderer>,
    /// Output directory for uploads and rendered diagrams.
    pub uploads: UploadStore,
    /// Largest accepted request body.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Bundle the collaborators into shareable state.
    #[must_use]
    pub fn new(
        assistant: FlowchartAssistant,
        renderer: Arc<dyn DiagramRenderer>,
        uploads: UploadStore,
        max_upload_bytes: usize,
    ) -> Arc<Self> {
        Arc::new(Self {
            assistant,
            renderer,
            uploads,
            max_upload_bytes,
        })
    }
}
