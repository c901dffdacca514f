//! Google Cloud clients: credentials, Cloud Logging, and Cloud Trace
//!
//! Thin REST wrappers. Each call issues one request and returns typed
//! results plus a compact text rendering for the model; retries and
//! pagination beyond one page are left out on purpose.

mod auth;
mod error;
mod filter;
mod logging;
mod trace;

pub use auth::{token_source_from_env, MetadataTokenSource, StaticToken, TokenSource};
pub use error::GcpError;
pub use filter::{LogFilter, Severity, TimeWindow};
pub use logging::{render_entries, LogEntry, LoggingClient};
pub use trace::{render_traces, Trace, TraceClient, TraceSpan};

use reqwest::Response;

/// Turn a non-success response into [`GcpError::Status`]
pub(crate) async fn check_status(response: Response) -> Result<Response, GcpError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GcpError::Status {
        status: status.as_u16(),
        body,
    })
}
