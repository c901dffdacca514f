//! HTTP request handlers

use super::sessions::SessionHandle;
use super::sse::sse_stream;
use super::types::{
    AlertRequest, AlertResponse, ChatRequest, ChatResponse, ErrorResponse, HealthResponse,
    SessionResponse, ToolInfo, ToolsResponse,
};
use super::AppState;
use crate::graph::TransitionError;
use crate::llm::LlmMessage;
use crate::runtime::{RuntimeError, Transcript, TurnOutcome};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/tools", get(list_tools))
        .route("/api/chat", post(chat))
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/sessions/:id", get(get_session).delete(delete_session))
        .route("/api/alert", post(send_alert))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn list_tools(State(state): State<AppState>) -> Json<ToolsResponse> {
    let tools = state
        .runtime
        .tool_definitions()
        .into_iter()
        .map(|def| ToolInfo {
            name: def.name,
            description: def.description,
        })
        .collect();
    Json(ToolsResponse {
        model: state.runtime.model_id().to_string(),
        tools,
    })
}

// ============================================================
// Chat
// ============================================================

/// Run one turn and answer once it is complete
async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let text = validate_text(&req.text)?;
    let claim = claim_session(&state, req.session_id).await?;
    let session_id = claim.id.clone();

    // The turn runs in its own task so a dropped request cannot leave the
    // transcript half-written.
    let task = tokio::spawn(run_claimed_turn(
        state,
        claim,
        text,
        CancellationToken::new(),
    ));
    let (result, messages) = task
        .await
        .map_err(|e| AppError::Internal(format!("Turn task failed: {e}")))?;
    let outcome = result?;

    Ok(Json(ChatResponse {
        session_id,
        answer: outcome.answer,
        steps: outcome.steps,
        usage: outcome.usage,
        messages,
    }))
}

/// Run one turn and stream its events
async fn chat_stream(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Response, AppError> {
    let text = validate_text(&req.text)?;
    let claim = claim_session(&state, req.session_id).await?;
    let session_id = claim.id.clone();

    // Subscribe before the turn starts so no event is missed
    let events = state.runtime.subscribe();
    let cancel = CancellationToken::new();

    let turn = run_claimed_turn(state, claim, text, cancel.clone());
    tokio::spawn(async move {
        // The outcome reaches the client through the event stream
        let (result, _) = turn.await;
        if let Err(e) = result {
            tracing::debug!(error = %e, "Streamed turn ended with error");
        }
    });

    Ok(sse_stream(session_id, events, cancel.drop_guard()).into_response())
}

/// A session locked for one turn
struct ClaimedSession {
    id: String,
    transcript: OwnedMutexGuard<Transcript>,
    /// Created by this request
    created: bool,
}

/// Run a turn on a claimed session and release it.
///
/// A session created for this turn is discarded when the turn does not
/// complete, so failed first requests leave nothing behind.
async fn run_claimed_turn(
    state: AppState,
    mut claim: ClaimedSession,
    text: String,
    cancel: CancellationToken,
) -> (Result<TurnOutcome, RuntimeError>, Vec<LlmMessage>) {
    let result = state
        .runtime
        .run_turn(&claim.id, &mut claim.transcript, &text, &cancel)
        .await;
    let messages = claim.transcript.messages().to_vec();
    if result.is_err() && claim.created {
        state.sessions.remove(&claim.id).await;
        tracing::info!(session_id = %claim.id, "Discarded session after failed first turn");
    }
    (result, messages)
}

fn validate_text(text: &str) -> Result<String, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::BadRequest("Message text is empty".to_string()));
    }
    Ok(text.to_string())
}

/// Find or create the session and lock it; a session runs one turn at a time
async fn claim_session(
    state: &AppState,
    session_id: Option<String>,
) -> Result<ClaimedSession, AppError> {
    let (id, handle, created) = match session_id {
        Some(id) => {
            let handle = state
                .sessions
                .get(&id)
                .await
                .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))?;
            (id, handle, false)
        }
        None => {
            let (id, handle) = state.sessions.create().await;
            (id, handle, true)
        }
    };
    let transcript = lock_session(handle)?;
    Ok(ClaimedSession {
        id,
        transcript,
        created,
    })
}

fn lock_session(session: SessionHandle) -> Result<OwnedMutexGuard<Transcript>, AppError> {
    session
        .try_lock_owned()
        .map_err(|_| AppError::Conflict(TransitionError::AgentBusy.to_string()))
}

// ============================================================
// Sessions
// ============================================================

async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionResponse>, AppError> {
    let session = state
        .sessions
        .get(&id)
        .await
        .ok_or_else(|| AppError::NotFound(format!("Session not found: {id}")))?;
    let transcript = lock_session(session)?;
    Ok(Json(SessionResponse {
        session_id: id,
        messages: transcript.messages().to_vec(),
    }))
}

async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    if state.sessions.remove(&id).await {
        tracing::info!(session_id = %id, "Session deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Session not found: {id}")))
    }
}

// ============================================================
// Alerts
// ============================================================

async fn send_alert(
    State(state): State<AppState>,
    Json(req): Json<AlertRequest>,
) -> Result<Json<AlertResponse>, AppError> {
    if req.error_logs.trim().is_empty() {
        return Err(AppError::BadRequest("error_logs is empty".to_string()));
    }
    let severity = req
        .severity
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("ERROR")
        .to_ascii_uppercase();

    let outcome = state.alerter.send(&req.error_logs, &severity).await;
    Ok(Json(AlertResponse {
        delivered: outcome.is_delivered(),
        summary: outcome.summary(),
        outcome,
    }))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<RuntimeError> for AppError {
    fn from(e: RuntimeError) -> Self {
        match e {
            RuntimeError::Transition(TransitionError::AgentBusy) => {
                AppError::Conflict(e.to_string())
            }
            other => AppError::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
