//! Dependency failure tracking and degraded-mode control
//!
//! Every store call reports its outcome here. Three consecutive failures
//! against one dependency (default threshold) trip that dependency and put
//! the whole service into degraded mode; one success against a tripped
//! dependency clears its counter, and the mode deactivates once no tracked
//! dependency remains tripped.
//!
//! State is purely in-memory and resets on restart. `SystemMode` is an
//! explicit injectable object so each test gets a fresh instance.

use chrono::{DateTime, Utc};
use lenddesk_common::events::{EventBus, IntakeEvent};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Mutex;

/// Health record for one tracked external dependency
#[derive(Debug, Clone, Serialize)]
pub struct DependencyHealth {
    pub name: String,
    pub consecutive_failures: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    pub is_tripped: bool,
}

impl DependencyHealth {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            consecutive_failures: 0,
            last_error: None,
            is_tripped: false,
        }
    }
}

/// Snapshot of the process-wide mode state, as reported by `/health`
#[derive(Debug, Clone, Serialize)]
pub struct ModeSnapshot {
    pub active: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activated_at: Option<DateTime<Utc>>,
    /// Consecutive-failure count per tracked dependency
    pub failure_counts: HashMap<String, u32>,
}

struct ModeInner {
    dependencies: HashMap<String, DependencyHealth>,
    active: bool,
    reason: String,
    activated_at: Option<DateTime<Utc>>,
    /// Manual override keeps the mode active regardless of dependency health
    override_active: bool,
}

impl ModeInner {
    /// Recompute `active` as the OR of all tripped flags plus the override.
    /// Returns the transition (old, new) when the flag changed.
    fn recompute(&mut self) -> Option<(bool, bool)> {
        let any_tripped = self.dependencies.values().any(|d| d.is_tripped);
        let new_active = any_tripped || self.override_active;
        if new_active == self.active {
            return None;
        }

        let old = self.active;
        self.active = new_active;
        if new_active {
            self.activated_at = Some(Utc::now());
        } else {
            self.reason = String::new();
            self.activated_at = None;
        }
        Some((old, new_active))
    }
}

/// Process-wide degraded-mode controller
///
/// Wraps all mutable state in one mutex; every method takes the lock briefly
/// and never suspends while holding it, so `is_active()` is safe on every
/// request path.
pub struct SystemMode {
    threshold: u32,
    inner: Mutex<ModeInner>,
    event_bus: Option<EventBus>,
}

impl SystemMode {
    /// Create a mode controller tracking the given dependencies
    pub fn new(threshold: u32, dependencies: &[&str]) -> Self {
        let dependencies = dependencies
            .iter()
            .map(|name| (name.to_string(), DependencyHealth::new(name)))
            .collect();

        Self {
            threshold,
            inner: Mutex::new(ModeInner {
                dependencies,
                active: false,
                reason: String::new(),
                activated_at: None,
                override_active: false,
            }),
            event_bus: None,
        }
    }

    /// Broadcast `DegradedModeChanged` events on transitions
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Record a failed call against a dependency
    ///
    /// Crossing the threshold trips the dependency and activates degraded
    /// mode with a human-readable reason.
    pub fn record_failure(&self, dependency: &str, error: &str) {
        let transition = {
            let mut inner = self.inner.lock().expect("mode lock poisoned");
            let threshold = self.threshold;
            let health = inner
                .dependencies
                .entry(dependency.to_string())
                .or_insert_with(|| DependencyHealth::new(dependency));

            health.consecutive_failures += 1;
            health.last_error = Some(error.to_string());

            if health.consecutive_failures >= threshold && !health.is_tripped {
                health.is_tripped = true;
                let failures = health.consecutive_failures;
                inner.reason = format!(
                    "dependency '{}' failed {} consecutive calls (last error: {})",
                    dependency, failures, error
                );
                tracing::warn!(
                    dependency = dependency,
                    consecutive_failures = failures,
                    "Dependency tripped, entering degraded mode"
                );
            }

            inner.recompute().map(|t| (t, inner.reason.clone()))
        };

        self.broadcast_transition(transition);
    }

    /// Record a successful call against a dependency
    ///
    /// Resets that dependency's counter; degraded mode deactivates once every
    /// tracked dependency is healthy again.
    pub fn record_success(&self, dependency: &str) {
        let transition = {
            let mut inner = self.inner.lock().expect("mode lock poisoned");
            let health = inner
                .dependencies
                .entry(dependency.to_string())
                .or_insert_with(|| DependencyHealth::new(dependency));

            if health.is_tripped {
                tracing::info!(dependency = dependency, "Dependency recovered");
            }
            health.consecutive_failures = 0;
            health.last_error = None;
            health.is_tripped = false;

            inner.recompute().map(|t| (t, inner.reason.clone()))
        };

        self.broadcast_transition(transition);
    }

    /// Cheap synchronous read of the degraded-mode flag
    pub fn is_active(&self) -> bool {
        self.inner.lock().expect("mode lock poisoned").active
    }

    /// True when the named dependency is currently tripped
    pub fn is_dependency_tripped(&self, dependency: &str) -> bool {
        self.inner
            .lock()
            .expect("mode lock poisoned")
            .dependencies
            .get(dependency)
            .map(|d| d.is_tripped)
            .unwrap_or(false)
    }

    /// Force degraded mode on or off regardless of dependency health
    pub fn set_override(&self, active: bool, reason: &str) {
        let transition = {
            let mut inner = self.inner.lock().expect("mode lock poisoned");
            inner.override_active = active;
            if active {
                inner.reason = reason.to_string();
            }
            inner.recompute().map(|t| (t, inner.reason.clone()))
        };

        self.broadcast_transition(transition);
    }

    /// Snapshot for the health endpoint
    pub fn snapshot(&self) -> ModeSnapshot {
        let inner = self.inner.lock().expect("mode lock poisoned");
        ModeSnapshot {
            active: inner.active,
            reason: inner.reason.clone(),
            activated_at: inner.activated_at,
            failure_counts: inner
                .dependencies
                .iter()
                .map(|(name, health)| (name.clone(), health.consecutive_failures))
                .collect(),
        }
    }

    /// Per-dependency health records, for diagnostics
    pub fn dependency_health(&self) -> Vec<DependencyHealth> {
        let inner = self.inner.lock().expect("mode lock poisoned");
        let mut health: Vec<_> = inner.dependencies.values().cloned().collect();
        health.sort_by(|a, b| a.name.cmp(&b.name));
        health
    }

    fn broadcast_transition(&self, transition: Option<((bool, bool), String)>) {
        if let (Some(((_, active), reason)), Some(bus)) = (transition, &self.event_bus) {
            bus.emit(IntakeEvent::DegradedModeChanged {
                active,
                reason,
                timestamp: Utc::now(),
            });
        }
    }
}
