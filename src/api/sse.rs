//! Server-Sent Events support
//!
//! A stream carries the events of one session's turn and ends after the
//! turn's terminal event. Dropping it (client disconnect) cancels the turn.

use crate::runtime::{AgentEvent, ConversationEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;
use tokio_util::sync::DropGuard;

struct TurnStream {
    events: BroadcastStream<ConversationEvent>,
    session_id: String,
    finished: bool,
    /// Cancels the turn when the stream is dropped
    _cancel_on_drop: DropGuard,
}

/// Convert the runtime broadcast into the SSE stream of one session
pub fn sse_stream(
    session_id: String,
    broadcast_rx: broadcast::Receiver<ConversationEvent>,
    cancel_on_drop: DropGuard,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let init_data = json!({ "type": "session", "session_id": session_id });
    let init = futures::stream::once(async move {
        Ok(Event::default()
            .event("session")
            .data(init_data.to_string()))
    });

    let turn = TurnStream {
        events: BroadcastStream::new(broadcast_rx),
        session_id,
        finished: false,
        _cancel_on_drop: cancel_on_drop,
    };
    let events = futures::stream::unfold(turn, |mut turn| async move {
        if turn.finished {
            return None;
        }
        while let Some(item) = turn.events.next().await {
            match item {
                Ok(ev) if ev.conversation_id == turn.session_id => {
                    turn.finished = ev.event.is_terminal();
                    return Some((Ok(agent_event_to_axum(&ev.event)), turn));
                }
                Ok(_) => {}
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    tracing::warn!(session_id = %turn.session_id, skipped, "SSE subscriber lagged");
                }
            }
        }
        None
    });

    Sse::new(futures::StreamExt::chain(init, events)).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

fn agent_event_to_axum(event: &AgentEvent) -> Event {
    let data = serde_json::to_string(event).unwrap_or_default();
    Event::default().event(event.name()).data(data)
}
