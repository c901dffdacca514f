//! Conversation transcript

use crate::llm::{LlmMessage, MessageRole};
use serde::Serialize;

/// Ordered, append-only record of a conversation
///
/// The only way to remove messages is rolling back a turn that did not
/// complete, which restores the transcript to its length before the turn.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Transcript {
    messages: Vec<LlmMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> &[LlmMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn push(&mut self, message: LlmMessage) {
        self.messages.push(message);
    }

    /// Text of the last assistant message, if it has any
    pub fn last_text(&self) -> Option<String> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::Assistant)
            .map(LlmMessage::text)
            .filter(|text| !text.is_empty())
    }

    pub(crate) fn rollback(&mut self, len: usize) {
        self.messages.truncate(len);
    }
}
