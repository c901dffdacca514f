//! Cloud Trace lookup tool

use super::{parse_input, Tool, ToolContext, ToolOutput};
use crate::gcp::{render_traces, TimeWindow};
use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_HOURS: u32 = 24 * 30;
const DEFAULT_LIMIT: u32 = 20;
const MAX_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
struct CheckGcpTracesInput {
    #[serde(default)]
    hours: Option<u32>,
    #[serde(default)]
    limit: Option<u32>,
}

/// Recent request traces of the monitored project
pub struct CheckGcpTracesTool;

#[async_trait]
impl Tool for CheckGcpTracesTool {
    fn name(&self) -> &'static str {
        "check_gcp_traces"
    }

    fn description(&self) -> String {
        "List recent Cloud Trace traces of the monitored Google Cloud project (last 24 hours by default) with their spans, timings, and labels such as HTTP status codes. Use it to find slow or failing requests and to follow a trace id seen in a log entry.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "hours": {
                    "type": "integer",
                    "description": "How many hours back to look (default 24, max 720)"
                },
                "limit": {
                    "type": "integer",
                    "description": "Maximum number of traces (default 20, max 100)"
                }
            }
        })
    }

    async fn run(&self, input: Value, ctx: ToolContext) -> ToolOutput {
        let input: CheckGcpTracesInput = match parse_input(input) {
            Ok(i) => i,
            Err(out) => return out,
        };
        let services = &ctx.services;
        let project = match services.project() {
            Ok(p) => p,
            Err(out) => return out,
        };

        let hours = input
            .hours
            .unwrap_or(services.target.lookback_hours)
            .clamp(1, MAX_HOURS);
        let limit = input.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
        let window = TimeWindow::last_hours(Utc::now(), hours);

        match services.traces.list_traces(project, &window, limit).await {
            Ok(traces) if traces.is_empty() => {
                ToolOutput::success(format!("No traces recorded in the last {hours}h"))
            }
            Ok(traces) => ToolOutput::success(format!(
                "{} traces in the last {hours}h:\n{}",
                traces.len(),
                render_traces(&traces)
            )),
            Err(e) => {
                tracing::warn!(conv_id = %ctx.conversation_id, error = %e, "Trace query failed");
                ToolOutput::error(format!("Failed to query Cloud Trace: {e}"))
            }
        }
    }
}
