//! Configuration loading for the intake service
//!
//! Resolution priority:
//! 1. `LENDDESK_CONFIG` environment variable (path to a TOML file)
//! 2. `./lenddesk.toml` in the working directory
//! 3. Compiled defaults
//!
//! `LENDDESK_PORT` overrides the listen port regardless of source.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Bounds for one simulated processing stage, in milliseconds
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StageDurationMs {
    pub min: u64,
    pub max: u64,
}

impl StageDurationMs {
    pub fn range(&self) -> std::ops::Range<u64> {
        // Degenerate ranges collapse to a fixed duration
        if self.max <= self.min {
            self.min..self.min + 1
        } else {
            self.min..self.max
        }
    }
}

/// Simulated stage timing configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StageTimings {
    pub ingest: StageDurationMs,
    pub threat_scan: StageDurationMs,
    pub ocr: StageDurationMs,
    pub policy: StageDurationMs,
    pub ai_review: StageDurationMs,
}

impl Default for StageTimings {
    fn default() -> Self {
        Self {
            ingest: StageDurationMs { min: 200, max: 500 },
            threat_scan: StageDurationMs { min: 300, max: 800 },
            ocr: StageDurationMs { min: 500, max: 1500 },
            policy: StageDurationMs { min: 200, max: 600 },
            ai_review: StageDurationMs { min: 400, max: 1000 },
        }
    }
}

/// Intake service configuration
///
/// Every field has a compiled default so a missing or partial TOML file is
/// never fatal.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IntakeConfig {
    /// HTTP listen port
    pub port: u16,
    /// Session time-to-live in seconds (default 30 minutes)
    pub session_ttl_secs: u64,
    /// Expiry sweep interval in seconds
    pub sweep_interval_secs: u64,
    /// Maximum concurrently-active jobs per session
    pub max_jobs_per_session: usize,
    /// Maximum accepted upload size in bytes (default 25 MB)
    pub max_upload_bytes: u64,
    /// Consecutive failures before a dependency trips degraded mode
    pub failure_threshold: u32,
    /// Retry attempts per store call before falling back
    pub max_retries: u32,
    /// Linear backoff base delay in milliseconds (waits base * attempt)
    pub retry_base_delay_ms: u64,
    /// Per-attempt store call timeout in seconds
    pub store_timeout_secs: u64,
    /// Probability of a simulated stage failure, per stage
    pub stage_failure_probability: f64,
    /// SSE heartbeat interval in seconds
    pub sse_heartbeat_secs: u64,
    /// Event bus channel capacity
    pub event_bus_capacity: usize,
    /// Simulated per-stage durations
    pub stage_timings: StageTimings,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            port: 5810,
            session_ttl_secs: 30 * 60,
            sweep_interval_secs: 60,
            max_jobs_per_session: 20,
            max_upload_bytes: 25 * 1024 * 1024,
            failure_threshold: 3,
            max_retries: 3,
            retry_base_delay_ms: 100,
            store_timeout_secs: 10,
            stage_failure_probability: 0.05,
            sse_heartbeat_secs: 4,
            event_bus_capacity: 256,
            stage_timings: StageTimings::default(),
        }
    }
}

impl IntakeConfig {
    /// Load configuration using the documented resolution priority
    pub fn load() -> Result<Self> {
        let mut config = if let Ok(path) = std::env::var("LENDDESK_CONFIG") {
            Self::from_file(Path::new(&path))?
        } else if Path::new("lenddesk.toml").exists() {
            Self::from_file(Path::new("lenddesk.toml"))?
        } else {
            Self::default()
        };

        if let Ok(port) = std::env::var("LENDDESK_PORT") {
            config.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid LENDDESK_PORT: {}", port)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: IntakeConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would break core invariants
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.stage_failure_probability) {
            return Err(Error::Config(format!(
                "stage_failure_probability must be in [0, 1], got {}",
                self.stage_failure_probability
            )));
        }
        if self.failure_threshold == 0 {
            return Err(Error::Config(
                "failure_threshold must be at least 1".to_string(),
            ));
        }
        if self.max_jobs_per_session == 0 {
            return Err(Error::Config(
                "max_jobs_per_session must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_secs(self.store_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn sse_heartbeat(&self) -> Duration {
        Duration::from_secs(self.sse_heartbeat_secs)
    }
}
