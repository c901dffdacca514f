//! Slack-compatible webhook alerts
//!
//! Delivery failures are logged and reported in the outcome, never raised:
//! an alert that cannot be sent must not abort the conversation.

use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Result of one alert attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AlertOutcome {
    /// Dry run: the payload was logged instead of posted
    DryRun { payload: Value },
    Sent,
    /// The webhook answered with something other than 200
    Rejected { status: u16, body: String },
    /// The request never completed
    Failed { message: String },
    NotConfigured,
}

impl AlertOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, AlertOutcome::Sent | AlertOutcome::DryRun { .. })
    }

    /// One-line summary suitable as a tool result
    pub fn summary(&self) -> String {
        match self {
            AlertOutcome::DryRun { .. } => "Dry run: alert payload logged, not sent".to_string(),
            AlertOutcome::Sent => "Alert sent".to_string(),
            AlertOutcome::Rejected { status, body } => {
                format!("Error while sending message to Slack: HTTP {status}: {body}")
            }
            AlertOutcome::Failed { message } => {
                format!("Error while sending message to Slack: {message}")
            }
            AlertOutcome::NotConfigured => {
                "Slack alerts are not configured (SLACK_WEBHOOK_URL unset)".to_string()
            }
        }
    }
}

/// Posts error reports to a webhook
#[derive(Debug, Clone)]
pub struct SlackAlerter {
    client: Client,
    webhook_url: Option<String>,
    dry_run: bool,
}

impl SlackAlerter {
    pub fn new(webhook_url: Option<String>, dry_run: bool) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .unwrap_or_default();
        Self {
            client,
            webhook_url,
            dry_run,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some() || self.dry_run
    }

    /// Webhook body for an error report
    pub fn payload(error_logs: &str, severity: &str) -> Value {
        json!({
            "attachments": [
                {
                    "fallback": format!("*{severity} in production"),
                    "text": format!("```{error_logs}```"),
                }
            ]
        })
    }

    pub async fn send(&self, error_logs: &str, severity: &str) -> AlertOutcome {
        let payload = Self::payload(error_logs, severity);

        if self.dry_run {
            let pretty = serde_json::to_string_pretty(&payload).unwrap_or_default();
            tracing::info!(payload = %pretty, "[dry run] Slack alert");
            return AlertOutcome::DryRun { payload };
        }

        let Some(url) = &self.webhook_url else {
            tracing::warn!("Slack alert requested but SLACK_WEBHOOK_URL is not set");
            return AlertOutcome::NotConfigured;
        };

        let response = match self.client.post(url).json(&payload).send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(error = %e, "Error while sending message to Slack");
                return AlertOutcome::Failed {
                    message: e.to_string(),
                };
            }
        };

        let status = response.status();
        if status == StatusCode::OK {
            tracing::info!(severity, "Slack alert sent");
            return AlertOutcome::Sent;
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(status = status.as_u16(), body = %body, "Error while sending message to Slack");
        AlertOutcome::Rejected {
            status: status.as_u16(),
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_payload_shape() {
        let payload = SlackAlerter::payload("Traceback: boom", "ERROR");
        assert_eq!(
            payload,
            json!({
                "attachments": [{
                    "fallback": "*ERROR in production",
                    "text": "```Traceback: boom```"
                }]
            })
        );
    }

    #[tokio::test]
    async fn test_sent_on_200() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/json"))
            .and(body_json(SlackAlerter::payload("boom", "CRITICAL")))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .expect(1)
            .mount(&server)
            .await;

        let alerter = SlackAlerter::new(Some(server.uri()), false);
        assert_eq!(alerter.send("boom", "CRITICAL").await, AlertOutcome::Sent);
    }

    #[tokio::test]
    async fn test_non_200_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("invalid_token"))
            .mount(&server)
            .await;

        let alerter = SlackAlerter::new(Some(server.uri()), false);
        let outcome = alerter.send("boom", "ERROR").await;
        assert_eq!(
            outcome,
            AlertOutcome::Rejected {
                status: 403,
                body: "invalid_token".to_string()
            }
        );
        assert!(!outcome.is_delivered());
        assert!(outcome.summary().contains("invalid_token"));
    }

    #[tokio::test]
    async fn test_other_success_codes_are_rejections() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(204))
            .mount(&server)
            .await;

        let alerter = SlackAlerter::new(Some(server.uri()), false);
        assert!(matches!(
            alerter.send("boom", "ERROR").await,
            AlertOutcome::Rejected { status: 204, .. }
        ));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_post() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let alerter = SlackAlerter::new(Some(server.uri()), true);
        let outcome = alerter.send("boom", "ERROR").await;
        assert_eq!(
            outcome,
            AlertOutcome::DryRun {
                payload: SlackAlerter::payload("boom", "ERROR")
            }
        );
        assert!(outcome.is_delivered());
    }

    #[tokio::test]
    async fn test_unconfigured() {
        let alerter = SlackAlerter::new(None, false);
        assert!(!alerter.is_configured());
        assert_eq!(alerter.send("boom", "ERROR").await, AlertOutcome::NotConfigured);
    }

    #[tokio::test]
    async fn test_unreachable_webhook_is_failed() {
        // Port 9 (discard) on localhost is not expected to accept HTTP
        let alerter = SlackAlerter::new(Some("http://127.0.0.1:9/hook".to_string()), false);
        assert!(matches!(
            alerter.send("boom", "ERROR").await,
            AlertOutcome::Failed { .. }
        ));
    }
}
