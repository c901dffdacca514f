//! Tools exposed to the model
//!
//! Tools are stateless singletons; the shared API clients and monitoring
//! target arrive through [`ToolContext`] on every call.

mod gcp_logs;
mod gcp_traces;
mod github_file;
mod github_search;
mod slack_alert;

pub use gcp_logs::CheckGcpLogsTool;
pub use gcp_traces::CheckGcpTracesTool;
pub use github_file::QueryGithubFileTool;
pub use github_search::{FindGithubFileTool, SearchGithubCodeTool};
pub use slack_alert::SendSlackAlertTool;

use crate::alert::SlackAlerter;
use crate::config::SentinelConfig;
use crate::gcp::{LoggingClient, TokenSource, TraceClient};
use crate::github::GitHubClient;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Result from tool execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolOutput {
    pub success: bool,
    pub output: String,
}

impl ToolOutput {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            output: message.into(),
        }
    }
}

/// What is being monitored
#[derive(Debug, Clone)]
pub struct MonitorTarget {
    pub project: Option<String>,
    pub service_name: Option<String>,
    pub resource_type: String,
    pub lookback_hours: u32,
}

/// Clients shared by every tool call
#[derive(Clone)]
pub struct ToolServices {
    pub target: MonitorTarget,
    pub logging: LoggingClient,
    pub traces: TraceClient,
    /// `None` when no repository is configured
    pub github: Option<GitHubClient>,
    pub alerter: SlackAlerter,
}

impl ToolServices {
    pub fn from_config(config: &SentinelConfig, tokens: Arc<dyn TokenSource>) -> Self {
        let github = config.github_repo.as_deref().and_then(|repo| {
            GitHubClient::new(config.github_token.clone(), repo, &config.github_ref)
                .map_err(|e| tracing::warn!(error = %e, "GitHub lookups disabled"))
                .ok()
        });

        Self {
            target: MonitorTarget {
                project: config.gcp_project.clone(),
                service_name: config.service_name.clone(),
                resource_type: config.resource_type.clone(),
                lookback_hours: config.lookback_hours,
            },
            logging: LoggingClient::new(tokens.clone()),
            traces: TraceClient::new(tokens),
            github,
            alerter: SlackAlerter::new(config.slack_webhook_url.clone(), config.alert_dry_run),
        }
    }

    pub(crate) fn project(&self) -> Result<&str, ToolOutput> {
        self.target
            .project
            .as_deref()
            .ok_or_else(|| ToolOutput::error("GCP project is not configured (set GCP_PROJECT)"))
    }

    pub(crate) fn github(&self) -> Result<&GitHubClient, ToolOutput> {
        self.github
            .as_ref()
            .ok_or_else(|| ToolOutput::error("GitHub repository is not configured (set GITHUB_REPO)"))
    }
}

/// All context needed for a tool invocation.
///
/// Created fresh for each tool call.
#[derive(Clone)]
pub struct ToolContext {
    /// Cancellation signal for long-running operations
    pub cancel: CancellationToken,

    /// The conversation this tool is executing within
    pub conversation_id: String,

    pub services: Arc<ToolServices>,
}

impl ToolContext {
    pub fn new(
        cancel: CancellationToken,
        conversation_id: String,
        services: Arc<ToolServices>,
    ) -> Self {
        Self {
            cancel,
            conversation_id,
            services,
        }
    }
}

/// Trait for tools that can be executed by the agent
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name
    fn name(&self) -> &str;

    /// Tool description for LLM
    fn description(&self) -> String;

    /// JSON schema for tool input
    fn input_schema(&self) -> Value;

    /// Execute the tool with all context provided via `ToolContext`
    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput;
}

/// Deserialize a tool input or produce the error output the model sees
pub(crate) fn parse_input<T: DeserializeOwned>(input: Value) -> Result<T, ToolOutput> {
    serde_json::from_value(input).map_err(|e| ToolOutput::error(format!("Invalid input: {e}")))
}

/// Collection of tools available to conversations
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// The monitoring tool set
    pub fn standard() -> Self {
        Self {
            tools: vec![
                Arc::new(CheckGcpLogsTool),
                Arc::new(CheckGcpTracesTool),
                Arc::new(QueryGithubFileTool),
                Arc::new(FindGithubFileTool),
                Arc::new(SearchGithubCodeTool),
                Arc::new(SendSlackAlertTool),
            ],
        }
    }

    /// Get all tool definitions for LLM
    pub fn definitions(&self) -> Vec<crate::llm::ToolDefinition> {
        self.tools
            .iter()
            .map(|t| crate::llm::ToolDefinition {
                name: t.name().to_string(),
                description: t.description(),
                input_schema: t.input_schema(),
            })
            .collect()
    }

    /// Execute a tool by name; `None` when no tool has that name
    pub async fn execute(&self, name: &str, input: Value, ctx: ToolContext) -> Option<ToolOutput> {
        let tool = self.tools.iter().find(|t| t.name() == name)?;
        let cancel = ctx.cancel.clone();
        let output = tokio::select! {
            biased;
            () = cancel.cancelled() => ToolOutput::error("Cancelled"),
            output = tool.run(input, ctx) => output,
        };
        Some(output)
    }
}
