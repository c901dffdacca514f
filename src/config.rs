//! Process configuration
//!
//! Everything is read once from the environment at startup and never
//! mutated afterwards. Missing values fall back to defaults or `None`; a
//! tool whose backing service is unconfigured reports that as its result
//! instead of failing the process.

use crate::llm::LlmConfig;

/// Default Cloud Logging monitored resource type (Cloud Run services)
pub const DEFAULT_RESOURCE_TYPE: &str = "cloud_run_revision";

/// Default branch the source files are read from
pub const DEFAULT_GITHUB_REF: &str = "dev";

/// Default number of graph steps allowed per turn
pub const DEFAULT_MAX_STEPS: u32 = 25;

/// Default log/trace lookback window
pub const DEFAULT_LOOKBACK_HOURS: u32 = 24;

const DEFAULT_PORT: u16 = 8000;

/// Immutable configuration for the whole process
#[derive(Debug, Clone)]
pub struct SentinelConfig {
    /// GCP project whose logs and traces are inspected
    pub gcp_project: Option<String>,
    /// Cloud Run service name, narrows the log filter when set
    pub service_name: Option<String>,
    /// Monitored resource type used in the log filter
    pub resource_type: String,
    pub github_token: Option<String>,
    /// Repository in `owner/name` form
    pub github_repo: Option<String>,
    /// Branch, tag, or commit the files are read from
    pub github_ref: String,
    pub slack_webhook_url: Option<String>,
    /// Log alerts instead of posting them
    pub alert_dry_run: bool,
    pub llm: LlmConfig,
    pub port: u16,
    pub max_steps: u32,
    pub lookback_hours: u32,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            gcp_project: None,
            service_name: None,
            resource_type: DEFAULT_RESOURCE_TYPE.to_string(),
            github_token: None,
            github_repo: None,
            github_ref: DEFAULT_GITHUB_REF.to_string(),
            slack_webhook_url: None,
            alert_dry_run: false,
            llm: LlmConfig::default(),
            port: DEFAULT_PORT,
            max_steps: DEFAULT_MAX_STEPS,
            lookback_hours: DEFAULT_LOOKBACK_HOURS,
        }
    }
}

impl SentinelConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            gcp_project: get("GCP_PROJECT").or_else(|| get("GOOGLE_CLOUD_PROJECT")),
            service_name: get("SERVICE_NAME"),
            resource_type: get("GCP_RESOURCE_TYPE").unwrap_or(defaults.resource_type),
            github_token: get("GITHUB_TOKEN"),
            github_repo: get("GITHUB_REPO"),
            github_ref: get("GITHUB_REF").unwrap_or(defaults.github_ref),
            slack_webhook_url: get("SLACK_WEBHOOK_URL"),
            alert_dry_run: get("ALERT_DRY_RUN").is_some_and(|v| parse_bool(&v)),
            llm: LlmConfig::from_lookup(&get),
            port: get("SENTINEL_PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            max_steps: get("SENTINEL_MAX_STEPS")
                .and_then(|p| p.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_steps),
            lookback_hours: get("SENTINEL_LOOKBACK_HOURS")
                .and_then(|p| p.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.lookback_hours),
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
