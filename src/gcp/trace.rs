//! Cloud Trace v1 `traces.list` client

use super::{check_status, GcpError, TimeWindow, TokenSource};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

const TRACE_API_BASE: &str = "https://cloudtrace.googleapis.com";

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTracesResponse {
    #[serde(default)]
    traces: Vec<Trace>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trace {
    pub project_id: Option<String>,
    pub trace_id: String,
    #[serde(default)]
    pub spans: Vec<TraceSpan>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceSpan {
    pub span_id: Option<String>,
    pub kind: Option<String>,
    pub name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub parent_span_id: Option<String>,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

/// Client for the Cloud Trace v1 API
#[derive(Clone)]
pub struct TraceClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl TraceClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: TRACE_API_BASE.to_string(),
            tokens,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Traces of `project` that overlap `window`, with all spans
    pub async fn list_traces(
        &self,
        project: &str,
        window: &TimeWindow,
        page_size: u32,
    ) -> Result<Vec<Trace>, GcpError> {
        let start = window.start_rfc3339();
        let end = window.end_rfc3339();
        let page_size_param = page_size.to_string();
        tracing::debug!(project, %start, %end, page_size, "Listing traces");

        let token = self.tokens.token().await?;
        let response = self
            .client
            .get(format!("{}/v1/projects/{project}/traces", self.base_url))
            .bearer_auth(token)
            .query(&[
                ("startTime", start.as_str()),
                ("endTime", end.as_str()),
                ("view", "COMPLETE"),
                ("pageSize", page_size_param.as_str()),
            ])
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: ListTracesResponse = response
            .json()
            .await
            .map_err(|e| GcpError::Decode(format!("traces.list: {e}")))?;

        Ok(parsed.traces)
    }
}

/// Text rendering: one header line per trace, one indented line per span
pub fn render_traces(traces: &[Trace]) -> String {
    let mut out = String::new();
    for trace in traces {
        let _ = writeln!(out, "trace {} ({} spans)", trace.trace_id, trace.spans.len());
        for span in &trace.spans {
            let name = span.name.as_deref().unwrap_or("<unnamed>");
            let start = span.start_time.as_deref().unwrap_or("-");
            let end = span.end_time.as_deref().unwrap_or("-");
            let _ = write!(out, "  {name} [{start} .. {end}]");
            if !span.labels.is_empty() {
                let labels: Vec<String> = span
                    .labels
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect();
                let _ = write!(out, " {}", labels.join(" "));
            }
            out.push('\n');
        }
    }
    out
}
