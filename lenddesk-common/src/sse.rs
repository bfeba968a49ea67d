//! Server-Sent Events (SSE) utilities
//!
//! Shared SSE helpers for LendDesk services.

use axum::response::sse::{Event, KeepAlive};
use std::time::Duration;

/// Standard keep-alive policy for LendDesk SSE endpoints
pub fn keep_alive(interval: Duration) -> KeepAlive {
    KeepAlive::new().interval(interval).text("heartbeat")
}

/// Serialize a value into a named SSE event
///
/// Returns None (and logs) when serialization fails rather than tearing the
/// stream down; the next snapshot supersedes the lost one.
pub fn json_event<T: serde::Serialize>(event_type: &str, value: &T) -> Option<Event> {
    match serde_json::to_string(value) {
        Ok(json) => Some(Event::default().event(event_type).data(json)),
        Err(e) => {
            tracing::warn!("SSE: Failed to serialize {} event: {}", event_type, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Snapshot {
        jobs: usize,
    }

    #[test]
    fn json_event_serializes_payload() {
        let event = json_event("Snapshot", &Snapshot { jobs: 3 });
        assert!(event.is_some());
    }
}
