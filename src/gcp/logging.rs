//! Cloud Logging `entries:list` client

use super::{check_status, GcpError, TokenSource};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::time::Duration;

const LOGGING_API_BASE: &str = "https://logging.googleapis.com";

/// Longest message rendered per entry, in characters
const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesRequest<'a> {
    resource_names: Vec<String>,
    filter: &'a str,
    order_by: &'static str,
    page_size: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListEntriesResponse {
    #[serde(default)]
    entries: Vec<LogEntry>,
}

/// One log entry, restricted to the fields the agent looks at
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: Option<String>,
    pub severity: Option<String>,
    pub log_name: Option<String>,
    pub text_payload: Option<String>,
    pub json_payload: Option<Value>,
    pub proto_payload: Option<Value>,
    pub resource: Option<MonitoredResource>,
    pub trace: Option<String>,
    pub source_location: Option<SourceLocation>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MonitoredResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    #[serde(default)]
    pub labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceLocation {
    pub file: Option<String>,
    /// int64 fields arrive as JSON strings
    pub line: Option<Value>,
    pub function: Option<String>,
}

impl LogEntry {
    /// Human-readable message of the entry, whichever payload it carries
    pub fn message(&self) -> String {
        if let Some(text) = &self.text_payload {
            return text.clone();
        }
        if let Some(json) = &self.json_payload {
            for key in ["message", "msg", "error"] {
                if let Some(Value::String(s)) = json.get(key) {
                    return s.clone();
                }
            }
            return json.to_string();
        }
        if let Some(proto) = &self.proto_payload {
            if let Some(Value::String(s)) = proto.pointer("/status/message") {
                return s.clone();
            }
            return proto.to_string();
        }
        String::new()
    }
}

/// Client for the Cloud Logging v2 API
#[derive(Clone)]
pub struct LoggingClient {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenSource>,
}

impl LoggingClient {
    pub fn new(tokens: Arc<dyn TokenSource>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self {
            client,
            base_url: LOGGING_API_BASE.to_string(),
            tokens,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Newest-first entries of `project` matching `filter`
    pub async fn list_entries(
        &self,
        project: &str,
        filter: &str,
        page_size: u32,
    ) -> Result<Vec<LogEntry>, GcpError> {
        let body = ListEntriesRequest {
            resource_names: vec![format!("projects/{project}")],
            filter,
            order_by: "timestamp desc",
            page_size,
        };

        tracing::debug!(project, filter, page_size, "Listing log entries");
        let token = self.tokens.token().await?;
        let response = self
            .client
            .post(format!("{}/v2/entries:list", self.base_url))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await?;
        let response = check_status(response).await?;
        let parsed: ListEntriesResponse = response
            .json()
            .await
            .map_err(|e| GcpError::Decode(format!("entries:list: {e}")))?;

        Ok(parsed.entries)
    }
}

/// Compact one-line-per-entry rendering for the model
pub fn render_entries(entries: &[LogEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        let timestamp = entry.timestamp.as_deref().unwrap_or("-");
        let severity = entry.severity.as_deref().unwrap_or("DEFAULT");
        let _ = write!(out, "[{timestamp}] {severity}");
        if let Some(resource) = &entry.resource {
            if let Some(service) = resource.labels.get("service_name") {
                let _ = write!(out, " {service}");
            }
        }
        let _ = write!(out, ": {}", truncate_chars(&entry.message(), MAX_MESSAGE_CHARS));
        if let Some(location) = &entry.source_location {
            if let Some(file) = &location.file {
                let line = location.line.as_ref().map(plain_value).unwrap_or_default();
                let _ = write!(out, " (at {file}:{line})");
            }
        }
        if let Some(trace) = &entry.trace {
            let _ = write!(out, " trace={trace}");
        }
        out.push('\n');
    }
    out
}

fn plain_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}... [truncated]", s.get(..idx).unwrap_or(s)),
        None => s.to_string(),
    }
}
