//! HTTP API
//!
//! Chat with the monitoring agent (blocking JSON or SSE streaming), send an
//! alert directly, list the tools, and check health. Conversations live in
//! memory for the lifetime of the process.

mod handlers;
mod sessions;
mod sse;
mod types;

pub use handlers::create_router;
pub use sessions::SessionStore;
pub use types::*;

use crate::alert::SlackAlerter;
use crate::runtime::SharedRuntime;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<SharedRuntime>,
    pub alerter: SlackAlerter,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(runtime: Arc<SharedRuntime>, alerter: SlackAlerter) -> Self {
        Self {
            runtime,
            alerter,
            sessions: SessionStore::default(),
        }
    }
}
