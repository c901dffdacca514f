//! Effects produced by transitions

use super::state::ToolCall;
use crate::llm::LlmMessage;
use std::time::Duration;

/// Work the runtime performs after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a message to the transcript
    AppendMessage { message: LlmMessage },

    /// Call the model with the transcript so far
    RequestModel,

    /// Run the calls sequentially, then report `ToolsComplete`
    ExecuteTools { calls: Vec<ToolCall> },

    /// Wait `delay`, then report `RetryElapsed { attempt }`
    ScheduleRetry { delay: Duration, attempt: u32 },

    /// Tell connected clients
    Notify(Notification),
}

/// Client-facing progress signal
#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    Retrying {
        attempt: u32,
        delay: Duration,
        message: String,
    },
    Done,
    Failed {
        message: String,
    },
}

impl Effect {
    pub fn append(message: LlmMessage) -> Self {
        Effect::AppendMessage { message }
    }

    pub fn notify_done() -> Self {
        Effect::Notify(Notification::Done)
    }

    pub fn notify_failed(message: impl Into<String>) -> Self {
        Effect::Notify(Notification::Failed {
            message: message.into(),
        })
    }
}
