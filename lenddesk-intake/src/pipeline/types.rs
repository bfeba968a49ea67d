//! Job state for the document pipeline
//!
//! A job tracks one uploaded document through the fixed stage sequence.
//! Stage moves forward or to `Failed`, never backward; a completed job
//! always carries a validation result.

use crate::store::DocumentKind;
use crate::validation::ValidationResult;
use chrono::{DateTime, Utc};
use lenddesk_common::events::Stage;
use serde::Serialize;
use uuid::Uuid;

/// Coarse job status derived from the stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn from_stage(stage: Stage) -> Self {
        match stage {
            Stage::Complete => JobStatus::Complete,
            Stage::Failed => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }
}

/// Upload metadata accepted by `DocumentPipeline::submit`
#[derive(Debug, Clone)]
pub struct UploadMeta {
    pub original_name: String,
    pub declared_kind: DocumentKind,
    pub size_bytes: u64,
}

/// One document's progress through the pipeline (owned by the pipeline map)
#[derive(Debug, Clone)]
pub struct Job {
    pub id: Uuid,
    pub document_id: Uuid,
    pub session_id: Uuid,
    pub original_name: String,
    pub declared_kind: DocumentKind,
    pub size_bytes: u64,
    pub stage: Stage,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub result: Option<ValidationResult>,
    pub failure_reason: Option<String>,
}

impl Job {
    pub fn new(session_id: Uuid, meta: &UploadMeta) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            document_id: Uuid::new_v4(),
            session_id,
            original_name: meta.original_name.clone(),
            declared_kind: meta.declared_kind,
            size_bytes: meta.size_bytes,
            stage: Stage::Ingest,
            created_at: now,
            updated_at: now,
            result: None,
            failure_reason: None,
        }
    }

    /// Forward-only stage update; ignores attempts to move backward
    pub fn advance_to(&mut self, stage: Stage) {
        debug_assert!(
            stage >= self.stage || stage == Stage::Failed,
            "stage may only move forward or to failed"
        );
        if stage > self.stage || stage == Stage::Failed {
            self.stage = stage;
            self.updated_at = Utc::now();
        }
    }

    pub fn is_active(&self) -> bool {
        !self.stage.is_terminal()
    }

    pub fn snapshot(&self) -> JobSnapshot {
        JobSnapshot {
            job_id: self.id,
            document_id: self.document_id,
            session_id: self.session_id,
            original_name: self.original_name.clone(),
            declared_kind: self.declared_kind,
            size_bytes: self.size_bytes,
            stage: self.stage,
            status: JobStatus::from_stage(self.stage),
            created_at: self.created_at,
            updated_at: self.updated_at,
            result: self.result.clone(),
            failure_reason: self.failure_reason.clone(),
        }
    }
}

/// Read-only view of a job, as returned by status and stream endpoints
#[derive(Debug, Clone, Serialize)]
pub struct JobSnapshot {
    pub job_id: Uuid,
    pub document_id: Uuid,
    pub session_id: Uuid,
    pub original_name: String,
    pub declared_kind: DocumentKind,
    pub size_bytes: u64,
    pub stage: Stage,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}
