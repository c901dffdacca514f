//! Slack alert tool

use super::{parse_input, Tool, ToolContext, ToolOutput};
use crate::alert::AlertOutcome;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

fn default_severity() -> String {
    "ERROR".to_string()
}

#[derive(Debug, Deserialize)]
struct SendSlackAlertInput {
    error_logs: String,
    #[serde(default = "default_severity")]
    severity: String,
}

/// Notify the on-call channel about an error
pub struct SendSlackAlertTool;

#[async_trait]
impl Tool for SendSlackAlertTool {
    fn name(&self) -> &'static str {
        "send_slack_alert"
    }

    fn description(&self) -> String {
        "Send an alert to the team's Slack channel with the relevant error logs. Only use it when an error in the logs needs human attention, and include the log lines that show the problem.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["error_logs"],
            "properties": {
                "error_logs": {
                    "type": "string",
                    "description": "The log lines to include in the alert"
                },
                "severity": {
                    "type": "string",
                    "description": "Severity shown in the alert title (default ERROR)"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: SendSlackAlertInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        if input.error_logs.trim().is_empty() {
            return ToolOutput::error("Invalid input: error_logs must not be empty");
        }

        let severity = input.severity.trim().to_uppercase();
        let outcome = ctx.services.alerter.send(&input.error_logs, &severity).await;
        tracing::info!(conv_id = %ctx.conversation_id, severity = %severity, delivered = outcome.is_delivered(), "Slack alert tool");

        match outcome {
            AlertOutcome::Sent | AlertOutcome::DryRun { .. } => {
                ToolOutput::success(outcome.summary())
            }
            _ => ToolOutput::error(outcome.summary()),
        }
    }
}
