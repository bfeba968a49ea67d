//! Failure tracking, retry/backoff, and degraded-mode substitution
//!
//! The mode controller (`failure_tracker`) decides when the service is
//! degraded; `store` wraps every backing-store call with timeout, retry, and
//! fallback; `fallback` is the static substitute that serves reads and
//! absorbs writes while degraded.

pub mod failure_tracker;
pub mod fallback;
pub mod store;

pub use failure_tracker::{DependencyHealth, ModeSnapshot, SystemMode};
pub use fallback::StaticFallbackProvider;
pub use store::{ResilientStore, Sourced};
