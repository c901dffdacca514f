//! API request and response types

use crate::alert::AlertOutcome;
use crate::llm::{LlmMessage, Usage};
use serde::{Deserialize, Serialize};

/// Request to run one chat turn
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub text: String,
    /// Continue this session; a new one is started when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

/// Result of a chat turn
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub session_id: String,
    pub answer: String,
    pub steps: u32,
    pub usage: Usage,
    /// Full transcript of the session after the turn
    pub messages: Vec<LlmMessage>,
}

/// Request to post an alert without going through the agent
#[derive(Debug, Deserialize)]
pub struct AlertRequest {
    pub error_logs: String,
    #[serde(default)]
    pub severity: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AlertResponse {
    pub delivered: bool,
    pub summary: String,
    #[serde(flatten)]
    pub outcome: AlertOutcome,
}

/// Tool name and description
#[derive(Debug, Serialize)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

#[derive(Debug, Serialize)]
pub struct ToolsResponse {
    pub model: String,
    pub tools: Vec<ToolInfo>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub messages: Vec<LlmMessage>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
