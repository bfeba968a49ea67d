//! Document upload handler
//!
//! POST /sessions/{id}/documents — multipart upload that queues a pipeline
//! job. The file bytes themselves are not retained; only metadata drives the
//! simulated processing.

use axum::{
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Json, Router,
};
use lenddesk_common::events::Stage;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};
use crate::pipeline::{SubmitContext, UploadMeta};
use crate::store::DocumentKind;
use crate::AppState;

/// POST /sessions/{id}/documents response
#[derive(Debug, Serialize)]
pub struct UploadDocumentResponse {
    pub document_id: Uuid,
    pub job_id: Uuid,
    pub session_id: Uuid,
    pub stage: Stage,
    pub degraded: bool,
}

/// Bodies past the request limit surface as 413, everything else as 400
fn map_multipart_error(e: MultipartError) -> ApiError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("request body exceeds the upload limit".to_string())
    } else {
        ApiError::BadRequest(format!("malformed multipart body: {}", e))
    }
}

/// POST /sessions/{id}/documents
///
/// Expects a `file` part; an optional `document_kind` text field declares
/// the checklist kind. 404 for unknown sessions, 413 past the size limit,
/// 400 for anything else malformed. A rejected upload has no side effects:
/// the job slot and its seed index are reserved only once the body has
/// passed validation, so a retry replays the same as a clean session.
pub async fn upload_document(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadDocumentResponse>)> {
    // Session check first so a bad upload against a dead session is a 404
    state.registry.get(session_id).await?;

    let mut original_name: Option<String> = None;
    let mut size_bytes: Option<u64> = None;
    let mut declared_kind = DocumentKind::Unknown;

    while let Some(field) = multipart.next_field().await.map_err(map_multipart_error)? {
        match field.name() {
            Some("file") => {
                original_name = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(map_multipart_error)?;
                size_bytes = Some(bytes.len() as u64);
            }
            Some("document_kind") => {
                let raw = field.text().await.map_err(map_multipart_error)?;
                declared_kind = DocumentKind::parse(&raw);
            }
            _ => {
                // Unknown parts are ignored rather than rejected
            }
        }
    }

    let original_name =
        original_name.ok_or_else(|| ApiError::BadRequest("missing file part".to_string()))?;
    let size_bytes =
        size_bytes.ok_or_else(|| ApiError::BadRequest("missing file part".to_string()))?;

    if size_bytes == 0 {
        return Err(ApiError::BadRequest("empty file upload".to_string()));
    }
    if size_bytes > state.config.max_upload_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file size {} exceeds maximum {} bytes",
            size_bytes, state.config.max_upload_bytes
        )));
    }

    let (cancel_token, job_seed, applicant_name) = state.registry.reserve_job(session_id).await?;

    let snapshot = state
        .pipeline
        .submit(
            SubmitContext {
                session_id,
                applicant_name,
                cancel_token,
                job_seed,
            },
            UploadMeta {
                original_name,
                declared_kind,
                size_bytes,
            },
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadDocumentResponse {
            document_id: snapshot.document_id,
            job_id: snapshot.job_id,
            session_id,
            stage: snapshot.stage,
            degraded: state.mode.is_active(),
        }),
    ))
}

/// Build document routes
pub fn document_routes() -> Router<AppState> {
    Router::new().route("/sessions/:id/documents", post(upload_document))
}
