use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use chrono::Duration;
use futures::stream::{Stream, StreamExt};
use serde::Deserialize;
use tandem_graph::TurnRequest;
use tandem_types::{ActorContext, ResumeDecision, StreamEvent};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Sessions touched by a chat message stay alive this long.
const SESSION_KEEPALIVE_HOURS: i64 = 24;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ResumeRequest {
    pub thread_id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    pub resume_data: ResumeDecision,
}

/// Send a message and stream the turn's events over SSE.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let message = req.message.trim().to_string();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".to_string()));
    }

    let actor = resolve_actor(&state, req.session_id.as_deref()).await;

    let (thread_id, rx) = state.graph.spawn_turn(TurnRequest {
        message,
        thread_id: req.thread_id,
        actor,
    });
    tracing::info!(%thread_id, "chat turn started");

    Ok(sse_stream(rx))
}

/// Resume a thread suspended at a human gate.
pub async fn resume(
    State(state): State<AppState>,
    Json(req): Json<ResumeRequest>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    let thread_id = req.thread_id.trim().to_string();
    if thread_id.is_empty() {
        return Err(ApiError::BadRequest("thread_id is required".to_string()));
    }

    let actor = resolve_actor(&state, req.session_id.as_deref()).await;

    tracing::info!(%thread_id, action = %req.resume_data.action, "resume requested");
    let rx = state.graph.spawn_resume(thread_id, req.resume_data, actor);

    Ok(sse_stream(rx))
}

/// Resolves the session id to the actor the turn acts on behalf of, and
/// keeps a live session alive. Missing or expired sessions degrade to the
/// configured default actor with a warning; they never fail the turn.
async fn resolve_actor(state: &AppState, session_id: Option<&str>) -> Option<ActorContext> {
    let session_id = session_id?;
    match state.sessions.get(session_id).await {
        Ok(Some(record)) => {
            let _ = state
                .sessions
                .refresh(session_id, Some(Duration::hours(SESSION_KEEPALIVE_HOURS)))
                .await;
            tracing::debug!(
                session_id,
                actor_id = record.actor_id,
                "session resolved and refreshed"
            );
            Some(ActorContext::new(record.actor_id, record.actor_name))
        }
        Ok(None) => {
            tracing::warn!(session_id, "session not found or expired, using defaults");
            None
        }
        Err(e) => {
            tracing::warn!(session_id, error = %e, "session lookup failed, using defaults");
            None
        }
    }
}

/// Maps the turn's event channel onto SSE. Every event is one JSON `data:`
/// frame; the stream closes after the terminal event because the graph drops
/// the sender.
fn sse_stream(
    rx: mpsc::Receiver<StreamEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = ReceiverStream::new(rx).map(|event| {
        let sse_event = Event::default().json_data(&event).unwrap_or_else(|e| {
            tracing::error!(error = %e, "failed to serialize stream event");
            Event::default().data(
                serde_json::json!({
                    "type": "error",
                    "content": "internal serialization failure",
                })
                .to_string(),
            )
        });
        Ok::<Event, Infallible>(sse_event)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
