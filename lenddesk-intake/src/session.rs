//! Intake session lifecycle
//!
//! Sessions group one applicant interaction's uploads. The registry is the
//! sole owner of session state; jobs hold the session id only. A background
//! sweep expires sessions past their TTL and cascades cancellation to their
//! job timers and stream subscriptions via the per-session token.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use lenddesk_common::events::{EventBus, IntakeEvent};
use lenddesk_common::{Error, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::pipeline::DocumentPipeline;

/// Mix a session seed and a submission index into a per-job seed
///
/// SplitMix64-style finalizer; consecutive jobs in a seeded session get
/// well-separated, reproducible seeds.
fn derive_job_seed(session_seed: u64, job_index: u32) -> u64 {
    let mut z = session_seed
        .wrapping_add(0x9E37_79B9_7F4A_7C15_u64.wrapping_mul(job_index as u64 + 1));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// One intake session (owned exclusively by the registry)
#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub loan_type: String,
    pub applicant_name: Option<String>,
    pub email: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Optional replay seed; derived per-job seeds come from this
    pub seed: Option<u64>,
    /// Number of jobs submitted so far, used for seed derivation
    pub jobs_submitted: u32,
    /// Cancelled on expiry or explicit end; cascades to jobs and streams
    pub cancel_token: CancellationToken,
}

/// Read-only session view for API responses
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub loan_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applicant_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.id,
            loan_type: self.loan_type.clone(),
            applicant_name: self.applicant_name.clone(),
            created_at: self.created_at,
            expires_at: self.expires_at,
        }
    }
}

/// Parameters for session creation (loan type already validated by caller)
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub loan_type: String,
    pub applicant_name: Option<String>,
    pub email: Option<String>,
    pub seed: Option<u64>,
}

/// Creates, looks up, and expires intake sessions
pub struct SessionRegistry {
    sessions: RwLock<HashMap<Uuid, Session>>,
    ttl: ChronoDuration,
    event_bus: EventBus,
}

impl SessionRegistry {
    pub fn new(ttl: Duration, event_bus: EventBus) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            ttl: ChronoDuration::from_std(ttl).unwrap_or_else(|_| ChronoDuration::minutes(30)),
            event_bus,
        }
    }

    /// Create a session with a fresh random id and a fixed TTL
    pub async fn start(&self, config: SessionConfig) -> SessionSnapshot {
        let now = Utc::now();
        let session = Session {
            id: Uuid::new_v4(),
            loan_type: config.loan_type,
            applicant_name: config.applicant_name,
            email: config.email,
            created_at: now,
            expires_at: now + self.ttl,
            seed: config.seed,
            jobs_submitted: 0,
            cancel_token: CancellationToken::new(),
        };
        let snapshot = session.snapshot();

        self.event_bus.emit(IntakeEvent::SessionStarted {
            session_id: session.id,
            loan_type: session.loan_type.clone(),
            timestamp: now,
        });
        tracing::info!(
            session_id = %session.id,
            loan_type = %snapshot.loan_type,
            expires_at = %snapshot.expires_at,
            "Session started"
        );

        self.sessions.write().await.insert(session.id, session);
        snapshot
    }

    /// Look up a live session; expired-but-unswept sessions count as gone
    pub async fn get(&self, id: Uuid) -> Result<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some(s) if s.expires_at > Utc::now() => Ok(s.snapshot()),
            _ => Err(Error::NotFound(format!("session {}", id))),
        }
    }

    /// Extend expiry on activity
    pub async fn touch(&self, id: Uuid) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(s) if s.expires_at > Utc::now() => {
                s.expires_at = Utc::now() + self.ttl;
                Ok(())
            }
            _ => Err(Error::NotFound(format!("session {}", id))),
        }
    }

    /// Reserve the next job slot: returns the cancel token, the per-job seed,
    /// and the applicant name for extraction.
    pub async fn reserve_job(
        &self,
        id: Uuid,
    ) -> Result<(CancellationToken, Option<u64>, Option<String>)> {
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(s) if s.expires_at > Utc::now() => {
                let index = s.jobs_submitted;
                s.jobs_submitted += 1;
                let job_seed = s.seed.map(|seed| derive_job_seed(seed, index));
                Ok((s.cancel_token.clone(), job_seed, s.applicant_name.clone()))
            }
            _ => Err(Error::NotFound(format!("session {}", id))),
        }
    }

    /// Cancellation token for a live session (stream subscriptions hook
    /// onto this without reserving a job slot)
    pub async fn watch_token(&self, id: Uuid) -> Result<CancellationToken> {
        let sessions = self.sessions.read().await;
        match sessions.get(&id) {
            Some(s) if s.expires_at > Utc::now() => Ok(s.cancel_token.clone()),
            _ => Err(Error::NotFound(format!("session {}", id))),
        }
    }

    /// End a session now: cancels its token and removes it
    ///
    /// Job-map cleanup is the caller's cascade (see `spawn_expiry_sweep`).
    pub async fn end(&self, id: Uuid) -> Result<()> {
        let session = self.sessions.write().await.remove(&id);
        match session {
            Some(session) => {
                session.cancel_token.cancel();
                self.event_bus.emit(IntakeEvent::SessionEnded {
                    session_id: id,
                    timestamp: Utc::now(),
                });
                tracing::info!(session_id = %id, "Session ended");
                Ok(())
            }
            None => Err(Error::NotFound(format!("session {}", id))),
        }
    }

    /// Remove every session past its expiry; returns the expired sessions
    pub async fn sweep_expired(&self) -> Vec<Session> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let expired_ids: Vec<Uuid> = sessions
            .values()
            .filter(|s| s.expires_at <= now)
            .map(|s| s.id)
            .collect();

        expired_ids
            .into_iter()
            .filter_map(|id| sessions.remove(&id))
            .collect()
    }

    /// Live session count, for diagnostics
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Background expiry sweep
///
/// Every `interval`, expired sessions are removed, their tokens cancelled
/// (stopping job timers and SSE streams), and their jobs dropped from the
/// pipeline map.
pub fn spawn_expiry_sweep(
    registry: Arc<SessionRegistry>,
    pipeline: DocumentPipeline,
    event_bus: EventBus,
    interval: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        // First tick fires immediately; skip it
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let expired = registry.sweep_expired().await;
            for session in expired {
                session.cancel_token.cancel();
                let removed_jobs = pipeline.remove_session_jobs(session.id).await;
                event_bus.emit(IntakeEvent::SessionExpired {
                    session_id: session.id,
                    timestamp: Utc::now(),
                });
                tracing::info!(
                    session_id = %session.id,
                    removed_jobs = removed_jobs,
                    "Session expired and swept"
                );
            }
        }
    })
}
