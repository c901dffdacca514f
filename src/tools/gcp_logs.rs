//! Cloud Logging lookup tool

use super::{parse_input, Tool, ToolContext, ToolOutput};
use crate::gcp::{render_entries, LogFilter, Severity, TimeWindow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_HOURS: u32 = 24 * 30;
const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 200;

#[derive(Debug, Deserialize)]
struct CheckGcpLogsInput {
    #[serde(default)]
    hours: Option<u32>,
    #[serde(default)]
    severity: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    limit: Option<u32>,
}

/// Recent error logs of the monitored service
pub struct CheckGcpLogsTool;

#[async_trait]
impl Tool for CheckGcpLogsTool {
    fn name(&self) -> &'static str {
        "check_gcp_logs"
    }

    fn description(&self) -> String {
        "Query the recent logs of the monitored Google Cloud service and return entries at or above a severity (ERROR by default) from the last 24 hours unless told otherwise. Each entry shows its timestamp, severity, message, source location, and trace id when available. Use this first when asked whether anything is broken.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "hours": {
                    "type": "integer",
                    "description": "How many hours back to look (default 24, max 720)"
                },
                "severity": {
                    "type": "string",
                    "description": "Minimum severity: DEBUG, INFO, NOTICE, WARNING, ERROR, CRITICAL, ALERT, EMERGENCY",
                    "enum": ["DEFAULT", "DEBUG", "INFO", "NOTICE", "WARNING", "ERROR", "CRITICAL", "ALERT", "EMERGENCY"]
                },
                "query": {
                    "type": "string",
                    "description": "Optional free-text term the entries must contain"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of entries (default 50, max 200)"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: CheckGcpLogsInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        let services = &ctx.services;
        let project = match services.project() {
            Ok(p) => p,
            Err(out) => return out,
        };

        let severity = match input.severity.as_deref().map(str::parse::<Severity>) {
            None => Severity::Error,
            Some(Ok(s)) => s,
            Some(Err(e)) => return ToolOutput::error(format!("Invalid input: {e}")),
        };
        let hours = input
            .hours
            .unwrap_or(services.target.lookback_hours)
            .clamp(1, MAX_HOURS);
        let limit = input.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let mut filter = LogFilter::new()
            .resource_type(&services.target.resource_type)
            .min_severity(severity)
            .window(TimeWindow::last_hours(Utc::now(), hours));
        if let Some(service) = &services.target.service_name {
            filter = filter.service_name(service);
        }
        if let Some(query) = input.query {
            filter = filter.text(query);
        }
        let filter = filter.build();

        match services.logging.list_entries(project, &filter, limit).await {
            Ok(entries) if entries.is_empty() => ToolOutput::success(format!(
                "No log entries at {severity} or above in the last {hours}h (filter: {filter})"
            )),
            Ok(entries) => ToolOutput::success(format!(
                "{} log entries at {severity} or above in the last {hours}h, newest first:\n{}",
                entries.len(),
                render_entries(&entries)
            )),
            Err(e) => {
                tracing::warn!(conv_id = %ctx.conversation_id, error = %e, "Log query failed");
                ToolOutput::error(format!("Failed to query Cloud Logging: {e}"))
            }
        }
    }
}
