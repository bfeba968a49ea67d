//! Session API handlers
//!
//! POST /sessions, GET /sessions/{id}/documents, DELETE /sessions/{id}

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{JobSnapshot, JobStatus};
use crate::session::SessionConfig;
use crate::store::{ChecklistItem, DocumentKind};
use crate::AppState;

/// POST /sessions request
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub loan_type: String,
    #[serde(default)]
    pub applicant_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    /// Optional seed for deterministic replay of the whole session
    #[serde(default)]
    pub seed: Option<u64>,
}

/// POST /sessions response
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub loan_type: String,
    pub loan_display_name: String,
    pub expires_at: chrono::DateTime<chrono::Utc>,
    /// True when product data came from the static fallback
    pub degraded: bool,
}

/// One checklist row with its satisfaction state
#[derive(Debug, Serialize)]
pub struct ChecklistRow {
    pub kind: DocumentKind,
    pub label: String,
    pub required: bool,
    /// An accepted, completed upload of this kind exists
    pub satisfied: bool,
}

/// GET /sessions/{id}/documents response
#[derive(Debug, Serialize)]
pub struct SessionDocumentsResponse {
    pub session_id: Uuid,
    pub documents: Vec<JobSnapshot>,
    pub required_checklist: Vec<ChecklistRow>,
    pub degraded: bool,
}

/// POST /sessions
///
/// Validates the loan type against the product catalog (served through the
/// resilient store, so creation works while degraded) and opens a session
/// with the configured TTL.
pub async fn create_session(
    State(state): State<AppState>,
    Json(request): Json<CreateSessionRequest>,
) -> ApiResult<(StatusCode, Json<CreateSessionResponse>)> {
    if request.loan_type.trim().is_empty() {
        return Err(ApiError::BadRequest("loan_type is required".to_string()));
    }

    let product = state.store.get_loan_product(&request.loan_type).await?;

    let session = state
        .registry
        .start(SessionConfig {
            loan_type: request.loan_type,
            applicant_name: request.applicant_name,
            email: request.email,
            seed: request.seed,
        })
        .await;

    Ok((
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.session_id,
            loan_type: session.loan_type,
            loan_display_name: product.value.display_name,
            expires_at: session.expires_at,
            degraded: product.fallback || state.mode.is_active(),
        }),
    ))
}

/// GET /sessions/{id}/documents
///
/// Session document listing plus the loan product's required checklist with
/// per-item satisfaction. Activity extends the session TTL.
pub async fn list_session_documents(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<SessionDocumentsResponse>> {
    let session = state.registry.get(session_id).await?;
    let _ = state.registry.touch(session_id).await;

    let product = state.store.get_loan_product(&session.loan_type).await?;
    let records = state.store.list_document_records(session_id).await?;
    let jobs = state.pipeline.session_jobs(session_id).await;

    let checklist = build_checklist(&product.value.required_documents, &jobs);

    Ok(Json(SessionDocumentsResponse {
        session_id,
        documents: jobs,
        required_checklist: checklist,
        degraded: product.fallback || records.fallback || state.mode.is_active(),
    }))
}

/// DELETE /sessions/{id}
///
/// Explicit session end: cancels job timers and stream subscriptions, then
/// drops the session's jobs.
pub async fn end_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state.registry.end(session_id).await?;
    let removed = state.pipeline.remove_session_jobs(session_id).await;
    tracing::info!(
        session_id = %session_id,
        removed_jobs = removed,
        "Session ended by client"
    );
    Ok(StatusCode::NO_CONTENT)
}

fn build_checklist(items: &[ChecklistItem], jobs: &[JobSnapshot]) -> Vec<ChecklistRow> {
    items
        .iter()
        .map(|item| {
            let satisfied = jobs.iter().any(|job| {
                job.declared_kind == item.kind
                    && job.status == JobStatus::Complete
                    && job.result.as_ref().map(|r| r.accepted).unwrap_or(false)
            });
            ChecklistRow {
                kind: item.kind,
                label: item.label.clone(),
                required: item.required,
                satisfied,
            }
        })
        .collect()
}

/// Build session routes
pub fn session_routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/:id/documents", get(list_session_documents))
        .route("/sessions/:id", delete(end_session))
}
