//! lenddesk-intake - Document Intake Service
//!
//! Accepts lending-application uploads, runs them through the simulated
//! multi-stage processing pipeline, and streams progress to the back-office
//! UI over SSE. Backing-store failures flip the whole service into a
//! self-consistent degraded mode served by a static fallback dataset.

use anyhow::Result;
use lenddesk_common::config::IntakeConfig;
use lenddesk_intake::AppState;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting lenddesk-intake (Document Intake) service");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config = IntakeConfig::load().map_err(|e| anyhow::anyhow!("config error: {}", e))?;
    let port = config.port;

    let state = AppState::new(config);
    state.spawn_background_tasks();

    let app = lenddesk_intake::build_router(state);

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port)).await?;
    info!("Listening on http://127.0.0.1:{}", port);
    info!("Health check: http://127.0.0.1:{}/health", port);

    axum::serve(listener, app).await?;

    Ok(())
}
