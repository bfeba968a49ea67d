//! Event types for the LendDesk event system
//!
//! Provides the shared intake event definitions and the `EventBus` used to
//! fan progress out to SSE subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Document processing stage
///
/// Stages form a fixed forward-only sequence. `Failed` is an absorbing error
/// state reachable from any non-terminal stage; a job never moves backward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Ingest,
    ThreatScan,
    Ocr,
    Policy,
    AiReview,
    Complete,
    Failed,
}

impl Stage {
    /// Next stage in the processing sequence, None for terminal stages
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Ingest => Some(Stage::ThreatScan),
            Stage::ThreatScan => Some(Stage::Ocr),
            Stage::Ocr => Some(Stage::Policy),
            Stage::Policy => Some(Stage::AiReview),
            Stage::AiReview => Some(Stage::Complete),
            Stage::Complete | Stage::Failed => None,
        }
    }

    /// True for `Complete` and `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Complete | Stage::Failed)
    }

    /// All non-terminal processing stages, in order
    pub fn processing_stages() -> [Stage; 5] {
        [
            Stage::Ingest,
            Stage::ThreatScan,
            Stage::Ocr,
            Stage::Policy,
            Stage::AiReview,
        ]
    }

    /// Stage label as used in API responses and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Ingest => "ingest",
            Stage::ThreatScan => "threat_scan",
            Stage::Ocr => "ocr",
            Stage::Policy => "policy",
            Stage::AiReview => "ai_review",
            Stage::Complete => "complete",
            Stage::Failed => "failed",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LendDesk intake event types
///
/// Events are broadcast via `EventBus` and serialized for SSE transmission.
/// All events use this central enum for type safety and exhaustive matching.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IntakeEvent {
    /// Intake session created
    SessionStarted {
        session_id: Uuid,
        loan_type: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session ended explicitly by the client
    SessionEnded {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Session removed by the TTL sweep
    SessionExpired {
        session_id: Uuid,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Document accepted and queued at the ingest stage
    JobSubmitted {
        session_id: Uuid,
        job_id: Uuid,
        document_id: Uuid,
        original_name: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job advanced one stage forward
    JobStageAdvanced {
        session_id: Uuid,
        job_id: Uuid,
        stage: Stage,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job reached the absorbing failed state
    JobFailed {
        session_id: Uuid,
        job_id: Uuid,
        /// Stage that was executing when the failure fired
        stage: Stage,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Job completed with a validation verdict
    JobCompleted {
        session_id: Uuid,
        job_id: Uuid,
        accepted: bool,
        confidence: f64,
        timestamp: chrono::DateTime<chrono::Utc>,
    },

    /// Degraded mode entered or exited
    DegradedModeChanged {
        active: bool,
        reason: String,
        timestamp: chrono::DateTime<chrono::Utc>,
    },
}

impl IntakeEvent {
    /// Event type name as used for the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            IntakeEvent::SessionStarted { .. } => "SessionStarted",
            IntakeEvent::SessionEnded { .. } => "SessionEnded",
            IntakeEvent::SessionExpired { .. } => "SessionExpired",
            IntakeEvent::JobSubmitted { .. } => "JobSubmitted",
            IntakeEvent::JobStageAdvanced { .. } => "JobStageAdvanced",
            IntakeEvent::JobFailed { .. } => "JobFailed",
            IntakeEvent::JobCompleted { .. } => "JobCompleted",
            IntakeEvent::DegradedModeChanged { .. } => "DegradedModeChanged",
        }
    }

    /// Session this event belongs to, None for process-wide events
    pub fn session_id(&self) -> Option<Uuid> {
        match self {
            IntakeEvent::SessionStarted { session_id, .. }
            | IntakeEvent::SessionEnded { session_id, .. }
            | IntakeEvent::SessionExpired { session_id, .. }
            | IntakeEvent::JobSubmitted { session_id, .. }
            | IntakeEvent::JobStageAdvanced { session_id, .. }
            | IntakeEvent::JobFailed { session_id, .. }
            | IntakeEvent::JobCompleted { session_id, .. } => Some(*session_id),
            IntakeEvent::DegradedModeChanged { .. } => None,
        }
    }
}

/// Broadcast event bus shared by the pipeline, the mode controller, and SSE
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<IntakeEvent>,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// Old events are dropped for lagging subscribers once the channel fills;
    /// SSE subscribers recover by recomputing a snapshot on the next event.
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<IntakeEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// A send with no receivers is not an error; there is simply no one
    /// listening yet.
    pub fn emit(&self, event: IntakeEvent) -> usize {
        match self.tx.send(event) {
            Ok(receiver_count) => receiver_count,
            Err(_) => 0,
        }
    }
}
