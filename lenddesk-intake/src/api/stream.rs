//! Server-Sent Events (SSE) for session progress streaming
//!
//! GET /sessions/{id}/stream pushes a full `{analytics, jobs}` snapshot
//! immediately on subscribe, again on every job event for the session (and
//! on degraded-mode transitions), and a heartbeat on a fixed interval.
//! Recomputing the snapshot per push keeps the stream consistent with the
//! job map regardless of which backing mode produced the data. The stream
//! ends when the session is cancelled, releasing its timers.

use axum::{
    extract::{Path, State},
    response::sse::{Event, Sse},
    routing::get,
    Router,
};
use chrono::{DateTime, Utc};
use futures::stream::Stream;
use lenddesk_common::events::IntakeEvent;
use serde::Serialize;
use std::convert::Infallible;
use uuid::Uuid;

use crate::analytics::SessionAnalytics;
use crate::error::ApiResult;
use crate::pipeline::JobSnapshot;
use crate::AppState;

/// One snapshot frame pushed to subscribers
#[derive(Debug, Serialize)]
pub struct ProgressSnapshot {
    pub session_id: Uuid,
    pub analytics: SessionAnalytics,
    pub jobs: Vec<JobSnapshot>,
    pub degraded: bool,
    pub timestamp: DateTime<Utc>,
}

async fn snapshot_event(state: &AppState, session_id: Uuid) -> Option<Event> {
    let jobs = state.pipeline.session_jobs(session_id).await;
    let snapshot = ProgressSnapshot {
        session_id,
        analytics: SessionAnalytics::compute(&jobs),
        jobs,
        degraded: state.mode.is_active(),
        timestamp: Utc::now(),
    };
    lenddesk_common::sse::json_event("Snapshot", &snapshot)
}

/// GET /sessions/{id}/stream
pub async fn session_stream(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Sse<impl Stream<Item = Result<Event, Infallible>>>> {
    // Unknown or expired sessions never get a stream
    let cancel_token = state.registry.watch_token(session_id).await?;
    let heartbeat = state.config.sse_heartbeat();

    tracing::info!(session_id = %session_id, "New SSE client connected");

    let mut rx = state.event_bus.subscribe();
    let stream = async_stream::stream! {
        // Immediate snapshot on subscribe
        if let Some(event) = snapshot_event(&state, session_id).await {
            yield Ok(event);
        }

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    tracing::debug!(session_id = %session_id, "Session cancelled, closing SSE stream");
                    if let Some(event) = lenddesk_common::sse::json_event(
                        "SessionClosed",
                        &serde_json::json!({ "session_id": session_id }),
                    ) {
                        yield Ok(event);
                    }
                    break;
                }

                _ = tokio::time::sleep(heartbeat) => {
                    yield Ok(Event::default().comment("heartbeat"));
                }

                Ok(event) = rx.recv() => {
                    let relevant = match event.session_id() {
                        Some(id) => id == session_id,
                        // Process-wide events (mode transitions) go to everyone
                        None => true,
                    };
                    if relevant {
                        if let Some(event) = snapshot_event(&state, session_id).await {
                            yield Ok(event);
                        }
                        if matches!(
                            event,
                            IntakeEvent::SessionEnded { .. } | IntakeEvent::SessionExpired { .. }
                        ) {
                            break;
                        }
                    }
                }
            }
        }

        tracing::debug!(session_id = %session_id, "SSE stream closed");
    };

    Ok(Sse::new(stream).keep_alive(lenddesk_common::sse::keep_alive(heartbeat)))
}

/// Build stream routes
pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/sessions/:id/stream", get(session_stream))
}
