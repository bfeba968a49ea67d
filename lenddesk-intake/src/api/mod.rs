//! HTTP API surface for the intake service

mod admin;
mod documents;
mod health;
mod jobs;
mod sessions;
mod stream;

pub use admin::admin_routes;
pub use documents::document_routes;
pub use health::health_routes;
pub use jobs::job_routes;
pub use sessions::session_routes;
pub use stream::stream_routes;

use crate::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

/// Header present on every response produced while degraded
pub const DEGRADED_MODE_HEADER: &str = "x-degraded-mode";

/// Tag every response with the degraded-mode indicator while active
///
/// Lets downstream consumers distinguish authoritative data from
/// fallback-sourced data without parsing each body.
pub async fn degraded_mode_header(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let degraded = state.mode.is_active();
    let mut response = next.run(request).await;
    if degraded {
        response.headers_mut().insert(
            DEGRADED_MODE_HEADER,
            axum::http::HeaderValue::from_static("true"),
        );
    }
    response
}
