//! Events that drive the graph

use super::state::ToolResult;
use crate::llm::{ContentBlock, LlmError, LlmErrorKind, Usage};
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Event {
    UserMessage {
        text: String,
    },

    ModelResponse {
        content: Vec<ContentBlock>,
        usage: Usage,
    },
    ModelError {
        kind: LlmErrorKind,
        message: String,
        /// Server-provided wait before retrying
        retry_after: Option<Duration>,
    },
    RetryElapsed {
        attempt: u32,
    },

    /// Every pending tool call has produced a result
    ToolsComplete {
        results: Vec<ToolResult>,
    },
}

impl From<LlmError> for Event {
    fn from(error: LlmError) -> Self {
        Event::ModelError {
            kind: error.kind,
            message: error.message,
            retry_after: error.retry_after,
        }
    }
}
