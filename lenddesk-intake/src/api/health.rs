//! Health check endpoint
//!
//! Exposes the degraded-mode state (active/reason/per-dependency failure
//! counts) for operational visibility.

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;

use crate::resilience::{DependencyHealth, ModeSnapshot};
use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// "ok" or "degraded"
    pub status: String,
    /// Module name ("lenddesk-intake")
    pub module: String,
    /// Crate version from Cargo.toml
    pub version: String,
    /// Seconds since service started
    pub uptime_seconds: u64,
    /// Current degraded-mode state
    pub mode: ModeSnapshot,
    /// Per-dependency health records
    pub dependencies: Vec<DependencyHealth>,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let uptime = Utc::now().signed_duration_since(state.startup_time);
    let uptime_seconds = uptime.num_seconds().max(0) as u64;

    let mode = state.mode.snapshot();
    let status = if mode.active { "degraded" } else { "ok" };

    Json(HealthResponse {
        status: status.to_string(),
        module: "lenddesk-intake".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds,
        mode,
        dependencies: state.mode.dependency_health(),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
