//! Process startup shared by the server and the one-shot checker

use crate::config::SentinelConfig;
use crate::gcp::{token_source_from_env, TokenSource};
use crate::llm::{build_llm_service, LlmError};
use crate::runtime::{
    AgentRuntime, LlmClient, ServiceLlmClient, SharedRuntime, ToolExecutor, ToolRegistryExecutor,
};
use crate::system_prompt::build_system_prompt;
use crate::tools::{ToolRegistry, ToolServices};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Log filter used when `RUST_LOG` is unset
pub const DEFAULT_LOG_FILTER: &str = "log_sentinel=info,tower_http=debug";

/// Install the JSON tracing subscriber.
///
/// With `to_stderr` the log lines stay out of the way of output meant for
/// the terminal.
pub fn init_tracing(to_stderr: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    let layer = tracing_subscriber::fmt::layer()
        .json()
        .with_current_span(false)
        .with_span_list(false);

    if to_stderr {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer.with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .init();
    }
}

/// Assemble the agent runtime from configuration
pub fn build_runtime(config: &SentinelConfig) -> Result<SharedRuntime, LlmError> {
    build_runtime_with_tokens(config, token_source_from_env())
}

pub fn build_runtime_with_tokens(
    config: &SentinelConfig,
    tokens: Arc<dyn TokenSource>,
) -> Result<SharedRuntime, LlmError> {
    let service = build_llm_service(&config.llm, config.gcp_project.as_deref(), tokens.clone())?;
    let llm: Arc<dyn LlmClient> = Arc::new(ServiceLlmClient::new(service));

    let services = Arc::new(ToolServices::from_config(config, tokens));
    let tools: Arc<dyn ToolExecutor> =
        Arc::new(ToolRegistryExecutor::new(ToolRegistry::standard(), services));

    tracing::info!(
        model = %llm.model_id(),
        project = ?config.gcp_project,
        repo = ?config.github_repo,
        max_steps = config.max_steps,
        "Agent runtime configured"
    );

    Ok(AgentRuntime::new(llm, tools, build_system_prompt(config))
        .with_max_steps(config.max_steps)
        .with_generation(Some(config.llm.max_tokens), Some(config.llm.temperature)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gcp::StaticToken;
    use crate::llm::{LlmConfig, LlmErrorKind};

    fn tokens() -> Arc<dyn TokenSource> {
        Arc::new(StaticToken::new("t"))
    }

    #[test]
    fn test_runtime_from_api_key() {
        let config = SentinelConfig {
            llm: LlmConfig {
                gemini_api_key: Some("key".to_string()),
                ..LlmConfig::default()
            },
            github_repo: Some("acme/api".to_string()),
            ..SentinelConfig::default()
        };
        let runtime = build_runtime_with_tokens(&config, tokens()).unwrap();

        assert_eq!(runtime.model_id(), "gemini-2.0-flash-001");
        assert!(runtime.system_prompt().contains("Repository: acme/api"));
        let names: Vec<String> = runtime
            .tool_definitions()
            .into_iter()
            .map(|d| d.name)
            .collect();
        for tool in [
            "check_gcp_logs",
            "check_gcp_traces",
            "find_github_file",
            "query_github_file",
            "search_github_code",
            "send_slack_alert",
        ] {
            assert!(names.iter().any(|n| n == tool), "missing {tool}");
        }
    }

    #[test]
    fn test_runtime_needs_model_credentials() {
        let Err(err) = build_runtime_with_tokens(&SentinelConfig::default(), tokens()) else {
            panic!("expected missing credentials error");
        };
        assert_eq!(err.kind, LlmErrorKind::Auth);
    }
}
