//! Runtime for executing conversation turns
//!
//! Drives the pure workflow graph against a model client and a tool
//! executor, and broadcasts progress to subscribers.

mod executor;
pub mod traits;
mod transcript;

#[cfg(test)]
pub mod testing;

pub use executor::{AgentRuntime, RuntimeError, TurnOutcome, DEFAULT_EVENT_CAPACITY};
pub use traits::*;
pub use transcript::Transcript;

use crate::llm::{LlmMessage, Usage};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;

/// Runtime over trait objects, as assembled by the binaries
pub type SharedRuntime = AgentRuntime<Arc<dyn LlmClient>, Arc<dyn ToolExecutor>>;

/// Progress of a turn, as sent to clients
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A message was appended to the transcript
    Message { message: LlmMessage },
    ToolStarted {
        id: String,
        name: String,
        input: Value,
    },
    ToolFinished {
        id: String,
        name: String,
        success: bool,
        output: String,
    },
    Retrying {
        attempt: u32,
        delay_ms: u64,
        message: String,
    },
    Done { answer: String, usage: Usage },
    Error { message: String },
}

impl AgentEvent {
    /// SSE event name
    pub fn name(&self) -> &'static str {
        match self {
            AgentEvent::Message { .. } => "message",
            AgentEvent::ToolStarted { .. } => "tool_started",
            AgentEvent::ToolFinished { .. } => "tool_finished",
            AgentEvent::Retrying { .. } => "retrying",
            AgentEvent::Done { .. } => "done",
            AgentEvent::Error { .. } => "error",
        }
    }

    /// Last event of a turn
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentEvent::Done { .. } | AgentEvent::Error { .. })
    }
}

/// An [`AgentEvent`] tagged with the conversation it belongs to
#[derive(Debug, Clone)]
pub struct ConversationEvent {
    pub conversation_id: String,
    pub event: AgentEvent,
}
