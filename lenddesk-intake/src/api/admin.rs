//! Fault-injection admin surface
//!
//! POST /admin/faults drives the in-memory dependencies into failure for
//! degraded-mode drills and demos; DELETE clears all injected faults. Not
//! intended to be reachable from outside the back office.

use axum::{
    extract::State,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::resilience::ModeSnapshot;
use crate::store::memory::FaultMode;
use crate::store::{CACHE, PRIMARY_STORE};
use crate::AppState;

/// POST /admin/faults request
#[derive(Debug, Deserialize)]
pub struct FaultRequest {
    /// "primary-store" or "cache"
    pub dependency: String,
    /// "healthy", "retryable", or "non_retryable"
    pub mode: String,
}

/// Fault endpoint response
#[derive(Debug, Serialize)]
pub struct FaultResponse {
    pub mode: ModeSnapshot,
}

/// POST /admin/faults
pub async fn set_fault(
    State(state): State<AppState>,
    Json(request): Json<FaultRequest>,
) -> ApiResult<Json<FaultResponse>> {
    if request.dependency != PRIMARY_STORE && request.dependency != CACHE {
        return Err(ApiError::BadRequest(format!(
            "unknown dependency: {}",
            request.dependency
        )));
    }

    let mode = match request.mode.as_str() {
        "healthy" => FaultMode::Healthy,
        "retryable" => FaultMode::Retryable,
        "non_retryable" => FaultMode::NonRetryable,
        other => {
            return Err(ApiError::BadRequest(format!("unknown fault mode: {}", other)));
        }
    };

    state.faults.set(&request.dependency, mode);
    Ok(Json(FaultResponse {
        mode: state.mode.snapshot(),
    }))
}

/// DELETE /admin/faults
///
/// Clears all injected faults and resets dependency health, so a drill
/// leaves no tripped dependencies behind. (A tripped dependency is never
/// called again, so without the reset the trip would latch.)
pub async fn clear_faults(State(state): State<AppState>) -> Json<FaultResponse> {
    state.faults.clear();
    state.mode.record_success(PRIMARY_STORE);
    state.mode.record_success(CACHE);
    Json(FaultResponse {
        mode: state.mode.snapshot(),
    })
}

/// Build admin routes
pub fn admin_routes() -> Router<AppState> {
    Router::new().route("/admin/faults", post(set_fault).delete(clear_faults))
}
