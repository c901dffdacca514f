//! Graph state types

use crate::llm::ContentBlock;
use crate::tools::ToolOutput;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool invocation requested by the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, input: Value) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            input,
        }
    }

    /// Tool calls in the order the model emitted them
    pub fn extract(content: &[ContentBlock]) -> Vec<ToolCall> {
        content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::ToolUse { id, name, input } => {
                    Some(ToolCall::new(id, name, input.clone()))
                }
                _ => None,
            })
            .collect()
    }
}

/// Output of one executed tool call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_use_id: String,
    pub name: String,
    pub output: ToolOutput,
}

impl ToolResult {
    pub fn new(call: &ToolCall, output: ToolOutput) -> Self {
        Self {
            tool_use_id: call.id.clone(),
            name: call.name.clone(),
            output,
        }
    }

    pub fn to_content_block(&self) -> ContentBlock {
        ContentBlock::tool_result(
            &self.tool_use_id,
            &self.name,
            &self.output.output,
            !self.output.success,
        )
    }
}

/// Where a turn currently is in the graph
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphState {
    /// No turn has run yet
    #[default]
    Idle,

    /// Agent node: a model request is in flight or scheduled for retry
    CallingModel {
        attempt: u32,
        /// Node executions so far in this turn, this one included
        step: u32,
    },

    /// Tools node: executing the calls of the last model reply
    RunningTools { pending: Vec<ToolCall>, step: u32 },

    /// The model answered without requesting tools
    Done,

    Failed { message: String },
}

impl GraphState {
    /// A turn is in progress; new user messages must wait
    pub fn is_busy(&self) -> bool {
        matches!(
            self,
            GraphState::CallingModel { .. } | GraphState::RunningTools { .. }
        )
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, GraphState::Done | GraphState::Failed { .. })
    }

    /// Node executions so far in the current turn
    pub fn step(&self) -> u32 {
        match self {
            GraphState::CallingModel { step, .. } | GraphState::RunningTools { step, .. } => *step,
            _ => 0,
        }
    }
}

/// Immutable settings for one conversation
#[derive(Debug, Clone)]
pub struct GraphContext {
    pub conversation_id: String,
    /// Maximum node executions per turn
    pub max_steps: u32,
}

impl GraphContext {
    pub fn new(conversation_id: impl Into<String>, max_steps: u32) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            max_steps,
        }
    }
}
