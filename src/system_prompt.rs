//! System prompt construction
//!
//! The base prompt fixes the agent's role. A `<deployment>` block appended
//! to it tells the model what it is watching, so it does not have to ask
//! for project or repository names the tools already know.

use crate::config::SentinelConfig;
use std::fmt::Write;

/// Base system prompt establishing the agent's role
const BASE_PROMPT: &str = r"You are a monitoring agent in charge of checking the logs of a deployed environment. When asked to, query the recent logs (last 24 hours) of the Google Cloud environment and check whether any error is present.

When an error is present and points to an easily identifiable file, look that file up in its GitHub repository, find the line of the error and propose a fix to the user. Quote the relevant lines with their line numbers.

Guidelines:
- Start with check_gcp_logs. Use check_gcp_traces for latency or request failures without a clear log message.
- Stack traces often contain container paths (e.g. /app/src/main.py). Use find_github_file to map them to repository paths before calling query_github_file.
- Only call send_slack_alert when an error needs human attention, and include the relevant log lines.
- If nothing is wrong, say so plainly. Never invent log entries or code.";

/// Build the system prompt for the configured deployment
pub fn build_system_prompt(config: &SentinelConfig) -> String {
    let mut prompt = String::from(BASE_PROMPT);

    prompt.push_str("\n\n<deployment>\n");
    match &config.gcp_project {
        Some(project) => {
            let _ = writeln!(prompt, "GCP project: {project}");
        }
        None => prompt.push_str("GCP project: not configured, log and trace tools will fail\n"),
    }
    if let Some(service) = &config.service_name {
        let _ = writeln!(prompt, "Service: {service} ({})", config.resource_type);
    }
    match &config.github_repo {
        Some(repo) => {
            let _ = writeln!(prompt, "Repository: {repo} (branch {})", config.github_ref);
        }
        None => prompt.push_str("Repository: not configured, source lookups are unavailable\n"),
    }
    let _ = writeln!(prompt, "Default lookback: {} hours", config.lookback_hours);
    let alerts = if config.alert_dry_run {
        "dry run (alerts are logged, not posted)"
    } else if config.slack_webhook_url.is_some() {
        "enabled"
    } else {
        "not configured"
    };
    let _ = writeln!(prompt, "Slack alerts: {alerts}");
    prompt.push_str("</deployment>");

    prompt
}
