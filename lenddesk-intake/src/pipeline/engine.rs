//! Stage-driven document pipeline
//!
//! Each submitted document gets one spawned task that walks the fixed stage
//! sequence on cooperative timers. Within a job, transitions are strictly
//! sequential, so subscribers observe them in the order they occurred. Stage
//! checkpoints are read and written through the resilient store, which keeps
//! the pipeline's behavior identical whether the backing store is healthy or
//! the service is degraded.
//!
//! All randomness (stage duration, failure draw, simulated extraction) comes
//! from a per-job RNG. When the session carries a seed the full stage
//! sequence and the validation verdict replay exactly.

use crate::pipeline::extraction::simulate_extraction;
use crate::pipeline::types::{Job, JobSnapshot, UploadMeta};
use crate::resilience::ResilientStore;
use crate::store::{DocumentRecord, StageCheckpoint};
use crate::validation::ValidationEngine;
use chrono::Utc;
use lenddesk_common::config::{IntakeConfig, StageDurationMs, StageTimings};
use lenddesk_common::events::{EventBus, IntakeEvent, Stage};
use lenddesk_common::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Session-scoped inputs for one submission
#[derive(Debug, Clone)]
pub struct SubmitContext {
    pub session_id: Uuid,
    pub applicant_name: Option<String>,
    /// Cancelled when the session ends or expires
    pub cancel_token: CancellationToken,
    /// Per-job seed derived from the session seed, None for entropy
    pub job_seed: Option<u64>,
}

/// Simulated failure description for a stage
fn stage_failure_reason(stage: Stage) -> &'static str {
    match stage {
        Stage::Ingest => "upload corrupted in transit",
        Stage::ThreatScan => "malware signature match",
        Stage::Ocr => "document unreadable, OCR aborted",
        Stage::Policy => "policy engine rejected document",
        Stage::AiReview => "review model could not classify document",
        // Terminal stages never draw a failure
        Stage::Complete | Stage::Failed => "unexpected terminal stage failure",
    }
}

fn stage_duration(timings: &StageTimings, stage: Stage) -> StageDurationMs {
    match stage {
        Stage::Ingest => timings.ingest,
        Stage::ThreatScan => timings.threat_scan,
        Stage::Ocr => timings.ocr,
        Stage::Policy => timings.policy,
        // Complete/Failed are instantaneous; ai_review covers the last draw
        Stage::AiReview | Stage::Complete | Stage::Failed => timings.ai_review,
    }
}

/// The document pipeline: job map plus stage-advancement machinery
///
/// Cheap to clone; all mutable state lives behind the shared job map.
#[derive(Clone)]
pub struct DocumentPipeline {
    jobs: Arc<RwLock<HashMap<Uuid, Job>>>,
    store: Arc<ResilientStore>,
    validation: Arc<ValidationEngine>,
    event_bus: EventBus,
    timings: StageTimings,
    failure_probability: f64,
    max_jobs_per_session: usize,
    max_upload_bytes: u64,
}

impl DocumentPipeline {
    pub fn new(store: Arc<ResilientStore>, event_bus: EventBus, config: &IntakeConfig) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            store,
            validation: Arc::new(ValidationEngine::default()),
            event_bus,
            timings: config.stage_timings.clone(),
            failure_probability: config.stage_failure_probability,
            max_jobs_per_session: config.max_jobs_per_session,
            max_upload_bytes: config.max_upload_bytes,
        }
    }

    /// Accept a document and schedule its stage advancement
    ///
    /// Enforces the per-session active-job cap and the upload size limit;
    /// session existence is the caller's responsibility (the registry hands
    /// out the `SubmitContext`).
    pub async fn submit(&self, ctx: SubmitContext, meta: UploadMeta) -> Result<JobSnapshot> {
        if meta.size_bytes > self.max_upload_bytes {
            return Err(Error::Validation(format!(
                "file size {} exceeds maximum {} bytes",
                meta.size_bytes, self.max_upload_bytes
            )));
        }
        if meta.original_name.trim().is_empty() {
            return Err(Error::Validation("missing file name".to_string()));
        }

        let job = {
            let mut jobs = self.jobs.write().await;
            let active = jobs
                .values()
                .filter(|j| j.session_id == ctx.session_id && j.is_active())
                .count();
            if active >= self.max_jobs_per_session {
                return Err(Error::Validation(format!(
                    "session already has {} active jobs (limit {})",
                    active, self.max_jobs_per_session
                )));
            }

            let job = Job::new(ctx.session_id, &meta);
            jobs.insert(job.id, job.clone());
            job
        };

        // Record the upload; degraded writes are absorbed by the fallback
        let record = DocumentRecord {
            id: job.document_id,
            session_id: job.session_id,
            job_id: job.id,
            original_name: job.original_name.clone(),
            declared_kind: job.declared_kind,
            size_bytes: job.size_bytes,
            uploaded_at: job.created_at,
        };
        match self.store.put_document_record(record).await {
            Ok(written) if written.fallback => {
                tracing::debug!(job_id = %job.id, "Document record absorbed by fallback");
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(job_id = %job.id, error = %e, "Document record write failed");
            }
        }

        self.event_bus.emit(IntakeEvent::JobSubmitted {
            session_id: job.session_id,
            job_id: job.id,
            document_id: job.document_id,
            original_name: job.original_name.clone(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            session_id = %job.session_id,
            job_id = %job.id,
            original_name = %job.original_name,
            size_bytes = job.size_bytes,
            "Job submitted at ingest stage"
        );

        let pipeline = self.clone();
        let job_id = job.id;
        tokio::spawn(async move {
            pipeline.run_job(job_id, ctx).await;
        });

        Ok(job.snapshot())
    }

    /// Pure read of a job's current stage and result
    pub async fn status(&self, job_id: Uuid) -> Option<JobSnapshot> {
        self.jobs.read().await.get(&job_id).map(Job::snapshot)
    }

    /// All jobs for a session, oldest first
    pub async fn session_jobs(&self, session_id: Uuid) -> Vec<JobSnapshot> {
        let mut jobs: Vec<JobSnapshot> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|j| j.session_id == session_id)
            .map(Job::snapshot)
            .collect();
        jobs.sort_by_key(|j| j.created_at);
        jobs
    }

    /// Drop all jobs for a session (expiry/end cascade)
    pub async fn remove_session_jobs(&self, session_id: Uuid) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, j| j.session_id != session_id);
        before - jobs.len()
    }

    /// Drive one job through the stage sequence
    async fn run_job(self, job_id: Uuid, ctx: SubmitContext) {
        let mut rng = match ctx.job_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let (original_name, declared_kind, size_bytes) = match self.status(job_id).await {
            Some(snap) => (snap.original_name, snap.declared_kind, snap.size_bytes),
            None => return,
        };

        for stage in Stage::processing_stages() {
            let bounds = stage_duration(&self.timings, stage);
            let duration = Duration::from_millis(rng.gen_range(bounds.range()));

            tokio::select! {
                _ = ctx.cancel_token.cancelled() => {
                    tracing::debug!(job_id = %job_id, stage = %stage, "Session ended, job timer cancelled");
                    return;
                }
                _ = tokio::time::sleep(duration) => {}
            }

            // Simulated real-world failure path
            if self.failure_probability > 0.0 && rng.gen_bool(self.failure_probability) {
                self.fail_job(job_id, ctx.session_id, stage).await;
                return;
            }

            if stage == Stage::AiReview {
                // Terminal transition: validation runs exactly once, here
                let extraction = simulate_extraction(
                    &mut rng,
                    &original_name,
                    declared_kind,
                    size_bytes,
                    ctx.applicant_name.as_deref(),
                );
                let result = self.validation.validate(&extraction);

                let snapshot = {
                    let mut jobs = self.jobs.write().await;
                    match jobs.get_mut(&job_id) {
                        Some(job) => {
                            job.advance_to(Stage::Complete);
                            job.result = Some(result.clone());
                            Some(job.snapshot())
                        }
                        None => None,
                    }
                };
                if snapshot.is_none() {
                    return;
                }

                self.checkpoint(job_id, Stage::Complete).await;
                self.event_bus.emit(IntakeEvent::JobStageAdvanced {
                    session_id: ctx.session_id,
                    job_id,
                    stage: Stage::Complete,
                    timestamp: Utc::now(),
                });
                self.event_bus.emit(IntakeEvent::JobCompleted {
                    session_id: ctx.session_id,
                    job_id,
                    accepted: result.accepted,
                    confidence: result.confidence,
                    timestamp: Utc::now(),
                });

                tracing::info!(
                    session_id = %ctx.session_id,
                    job_id = %job_id,
                    accepted = result.accepted,
                    confidence = result.confidence,
                    "Job complete"
                );
                return;
            }

            // Ordinary forward transition
            let next = stage.next().expect("non-terminal stage has a successor");
            {
                let mut jobs = self.jobs.write().await;
                match jobs.get_mut(&job_id) {
                    Some(job) => job.advance_to(next),
                    None => return,
                }
            }

            self.checkpoint(job_id, next).await;
            self.event_bus.emit(IntakeEvent::JobStageAdvanced {
                session_id: ctx.session_id,
                job_id,
                stage: next,
                timestamp: Utc::now(),
            });

            tracing::debug!(
                session_id = %ctx.session_id,
                job_id = %job_id,
                stage = %next,
                "Job advanced"
            );
        }
    }

    async fn fail_job(&self, job_id: Uuid, session_id: Uuid, stage: Stage) {
        let reason = stage_failure_reason(stage);
        {
            let mut jobs = self.jobs.write().await;
            if let Some(job) = jobs.get_mut(&job_id) {
                job.advance_to(Stage::Failed);
                job.failure_reason = Some(reason.to_string());
            } else {
                return;
            }
        }

        self.checkpoint(job_id, Stage::Failed).await;
        self.event_bus.emit(IntakeEvent::JobFailed {
            session_id,
            job_id,
            stage,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });

        tracing::info!(
            session_id = %session_id,
            job_id = %job_id,
            stage = %stage,
            reason = reason,
            "Job failed"
        );
    }

    /// Best-effort checkpoint write through the resilient store
    async fn checkpoint(&self, job_id: Uuid, stage: Stage) {
        let checkpoint = StageCheckpoint {
            job_id,
            stage,
            recorded_at: Utc::now(),
        };
        if let Err(e) = self.store.put_stage_checkpoint(checkpoint).await {
            // Only non-dependency errors reach here; dependency failures are
            // absorbed by the fallback
            tracing::warn!(job_id = %job_id, stage = %stage, error = %e, "Checkpoint write failed");
        }
    }
}
