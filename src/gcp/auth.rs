//! Access tokens for Google APIs
//!
//! `GCP_ACCESS_TOKEN` wins when set (local runs, `gcloud auth
//! print-access-token`); otherwise the metadata server of the Cloud Run or
//! GCE instance is asked for the default service account token.

use super::GcpError;
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Tokens are refreshed this long before they expire
const REFRESH_MARGIN_SECS: i64 = 60;

/// Source of OAuth2 bearer tokens
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn token(&self) -> Result<String, GcpError>;
}

/// A fixed token
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<String, GcpError> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct MetadataTokenResponse {
    access_token: String,
    expires_in: i64,
}

/// Token from the instance metadata server, cached until shortly before expiry
pub struct MetadataTokenSource {
    client: Client,
    url: String,
    cached: Mutex<Option<CachedToken>>,
}

impl MetadataTokenSource {
    pub fn new() -> Self {
        Self::with_url(METADATA_TOKEN_URL)
    }

    pub fn with_url(url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self {
            client,
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    async fn fetch(&self) -> Result<CachedToken, GcpError> {
        let response = self
            .client
            .get(&self.url)
            .header("Metadata-Flavor", "Google")
            .send()
            .await
            .map_err(|e| GcpError::Auth(format!("metadata server unreachable: {e}")))?;
        let response = super::check_status(response).await?;
        let body: MetadataTokenResponse = response
            .json()
            .await
            .map_err(|e| GcpError::Decode(format!("metadata token: {e}")))?;

        Ok(CachedToken {
            value: body.access_token,
            expires_at: Utc::now() + ChronoDuration::seconds(body.expires_in),
        })
    }
}

impl Default for MetadataTokenSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TokenSource for MetadataTokenSource {
    async fn token(&self) -> Result<String, GcpError> {
        let mut cached = self.cached.lock().await;
        let margin = ChronoDuration::seconds(REFRESH_MARGIN_SECS);
        if let Some(token) = cached.as_ref() {
            if token.expires_at - margin > Utc::now() {
                return Ok(token.value.clone());
            }
        }

        tracing::debug!(url = %self.url, "Refreshing access token from metadata server");
        let fresh = self.fetch().await?;
        let value = fresh.value.clone();
        *cached = Some(fresh);
        Ok(value)
    }
}

/// Pick the token source for this process
pub fn token_source_from_env() -> Arc<dyn TokenSource> {
    match std::env::var("GCP_ACCESS_TOKEN") {
        Ok(token) if !token.trim().is_empty() => {
            tracing::info!("Using GCP access token from environment");
            Arc::new(StaticToken::new(token.trim()))
        }
        _ => Arc::new(MetadataTokenSource::new()),
    }
}
