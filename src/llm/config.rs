//! Model configuration and service construction

use super::{GeminiAuth, GeminiService, LlmError, LlmService, LoggingService};
use crate::gcp::TokenSource;
use std::sync::Arc;

/// Model used when `GEMINI_MODEL` is unset
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash-001";

/// Vertex AI region used when `VERTEX_LOCATION` is unset
pub const DEFAULT_LOCATION: &str = "us-central1";

const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Configuration for the hosted model
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Public API key; when unset, Vertex AI is used with GCP credentials
    pub gemini_api_key: Option<String>,
    pub model: String,
    pub location: String,
    /// Overrides the endpoint host (gateways, tests)
    pub base_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            model: DEFAULT_MODEL.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            base_url: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: 0.0,
        }
    }
}

impl LlmConfig {
    pub(crate) fn from_lookup<F>(get: &F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            gemini_api_key: get("GEMINI_API_KEY"),
            model: get("GEMINI_MODEL").unwrap_or(defaults.model),
            location: get("VERTEX_LOCATION").unwrap_or(defaults.location),
            base_url: get("LLM_BASE_URL"),
            max_tokens: get("LLM_MAX_TOKENS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_tokens),
            temperature: defaults.temperature,
        }
    }
}

/// Build the logging-wrapped model service.
///
/// An API key selects the public endpoint; otherwise Vertex AI is used,
/// which needs a GCP project.
pub fn build_llm_service(
    config: &LlmConfig,
    project: Option<&str>,
    tokens: Arc<dyn TokenSource>,
) -> Result<Arc<dyn LlmService>, LlmError> {
    let auth = match (&config.gemini_api_key, project) {
        (Some(key), _) => GeminiAuth::ApiKey(key.clone()),
        (None, Some(project)) => GeminiAuth::Vertex {
            project: project.to_string(),
            location: config.location.clone(),
            tokens,
        },
        (None, None) => {
            return Err(LlmError::auth(
                "No model credentials: set GEMINI_API_KEY or GCP_PROJECT for Vertex AI",
            ))
        }
    };

    let service = GeminiService::new(auth, &config.model, config.base_url.as_deref())?;
    Ok(Arc::new(LoggingService::new(Arc::new(service))))
}
