//! log-sentinel HTTP server
//!
//! Serves the chat API for the monitoring agent.

use log_sentinel::alert::SlackAlerter;
use log_sentinel::api::{create_router, AppState};
use log_sentinel::bootstrap::{build_runtime, init_tracing};
use log_sentinel::config::SentinelConfig;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing(false);

    let config = SentinelConfig::from_env();
    let runtime = build_runtime(&config)?;

    let alerter = SlackAlerter::new(config.slack_webhook_url.clone(), config.alert_dry_run);
    if !alerter.is_configured() {
        tracing::warn!("SLACK_WEBHOOK_URL is not set, alerts will not be delivered");
    }

    let state = AppState::new(Arc::new(runtime), alerter);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let compression = CompressionLayer::new()
        .gzip(true)
        .br(true)
        .deflate(true)
        .zstd(true);

    let app = create_router(state)
        .layer(cors)
        .layer(compression)
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("log-sentinel listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
