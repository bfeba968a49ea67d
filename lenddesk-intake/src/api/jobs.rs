//! Job status handler
//!
//! GET /jobs/{id}/status — pure read of current stage and result; polling is
//! idempotent and side-effect-free.

use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};
use lenddesk_common::events::Stage;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::JobStatus;
use crate::validation::ValidationResult;
use crate::AppState;

/// GET /jobs/{id}/status response
#[derive(Debug, Serialize)]
pub struct JobStatusResponse {
    pub job_id: Uuid,
    pub session_id: Uuid,
    pub stage: Stage,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub degraded: bool,
}

/// GET /jobs/{id}/status
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<Uuid>,
) -> ApiResult<Json<JobStatusResponse>> {
    let snapshot = state
        .pipeline
        .status(job_id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {}", job_id)))?;

    Ok(Json(JobStatusResponse {
        job_id: snapshot.job_id,
        session_id: snapshot.session_id,
        stage: snapshot.stage,
        status: snapshot.status,
        result: snapshot.result,
        failure_reason: snapshot.failure_reason,
        degraded: state.mode.is_active(),
    }))
}

/// Build job routes
pub fn job_routes() -> Router<AppState> {
    Router::new().route("/jobs/:id/status", get(job_status))
}
