//! Conversation threads and the tool-routing assistant loop.

pub mod errors;
pub mod message;
pub mod prompt;
pub mod state;
pub mod store;
pub mod turn;

pub use errors::{AgentError, AgentResult};
pub use message::{Message, Role, ToolCallRequest};
pub use state::{ConversationState, ThreadId};
pub use store::{ConversationStore, ThreadSummary};
pub use turn::{FlowchartAssistant, TurnPhase};
