//! Shared types and utilities for LendDesk services
//!
//! Provides the common error type, the intake event bus, SSE helpers, and
//! TOML configuration loading used by the intake service.

pub mod config;
pub mod error;
pub mod events;
pub mod sse;

pub use error::{Error, Result};
