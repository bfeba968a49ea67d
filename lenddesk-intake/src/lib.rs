//! lenddesk-intake library interface
//!
//! Document-intake service for the LendDesk back office. Uploads progress
//! through a fixed simulated processing pipeline; all storage access runs
//! through a resilience layer that switches the whole service into a
//! self-consistent degraded mode when a backing dependency keeps failing.

pub mod analytics;
pub mod api;
pub mod error;
pub mod pipeline;
pub mod resilience;
pub mod session;
pub mod store;
pub mod validation;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use lenddesk_common::config::IntakeConfig;
use lenddesk_common::events::EventBus;
use std::sync::Arc;

use crate::pipeline::DocumentPipeline;
use crate::resilience::{ResilientStore, SystemMode};
use crate::session::SessionRegistry;
use crate::store::memory::{FaultInjector, MemoryBackend};
use crate::store::{CACHE, PRIMARY_STORE};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<IntakeConfig>,
    /// Degraded-mode controller; consulted on every request path
    pub mode: Arc<SystemMode>,
    pub store: Arc<ResilientStore>,
    pub registry: Arc<SessionRegistry>,
    pub pipeline: DocumentPipeline,
    pub event_bus: EventBus,
    /// Fault switchboard for the in-memory dependencies (ops/demo surface)
    pub faults: FaultInjector,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// Wire the full component graph from a configuration
    pub fn new(config: IntakeConfig) -> Self {
        let event_bus = EventBus::new(config.event_bus_capacity);
        let mode = Arc::new(
            SystemMode::new(config.failure_threshold, &[PRIMARY_STORE, CACHE])
                .with_event_bus(event_bus.clone()),
        );
        let faults = FaultInjector::new();
        let backend = Arc::new(MemoryBackend::new(faults.clone()));
        let store = Arc::new(ResilientStore::new(backend, mode.clone(), &config));
        let registry = Arc::new(SessionRegistry::new(
            config.session_ttl(),
            event_bus.clone(),
        ));
        let pipeline = DocumentPipeline::new(store.clone(), event_bus.clone(), &config);

        Self {
            config: Arc::new(config),
            mode,
            store,
            registry,
            pipeline,
            event_bus,
            faults,
            startup_time: Utc::now(),
        }
    }

    /// Start the background expiry sweep
    pub fn spawn_background_tasks(&self) -> tokio::task::JoinHandle<()> {
        session::spawn_expiry_sweep(
            self.registry.clone(),
            self.pipeline.clone(),
            self.event_bus.clone(),
            self.config.sweep_interval(),
        )
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    // axum's default 2 MB body limit would reject uploads well under the
    // configured maximum; allow the full file plus multipart framing, and
    // let the handler's own size check produce the 413
    let body_limit = state.config.max_upload_bytes as usize + 64 * 1024;

    Router::new()
        .merge(api::session_routes())
        .merge(api::document_routes())
        .merge(api::job_routes())
        .merge(api::stream_routes())
        .merge(api::health_routes())
        .merge(api::admin_routes())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            api::degraded_mode_header,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        // Back-office UI is served from another local port
        .layer(tower_http::cors::CorsLayer::permissive())
        .with_state(state)
}
