//! Common error types for LendDesk services

use thiserror::Error;

/// Common result type for LendDesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across LendDesk services
///
/// The dependency variants drive the resilience layer: `RetryableDependency`
/// consumes retry budget and can trip degraded mode; `NonRetryableDependency`
/// propagates immediately but still counts against dependency health;
/// `Validation` never touches dependency health.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid user input or request parameter (never retried)
    #[error("Invalid input: {0}")]
    Validation(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Transient dependency failure (timeout, connection refused, unavailable)
    #[error("Dependency '{dependency}' unavailable: {message}")]
    RetryableDependency { dependency: String, message: String },

    /// Permanent dependency failure (e.g. authorization rejected)
    #[error("Dependency '{dependency}' rejected call: {message}")]
    NonRetryableDependency { dependency: String, message: String },

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Transient failure against the named dependency
    pub fn retryable(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Error::RetryableDependency {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// Permanent failure against the named dependency
    pub fn non_retryable(dependency: impl Into<String>, message: impl Into<String>) -> Self {
        Error::NonRetryableDependency {
            dependency: dependency.into(),
            message: message.into(),
        }
    }

    /// True for failure classes worth retrying before falling back
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::RetryableDependency { .. })
    }

    /// True for any failure that counts against dependency health
    pub fn affects_dependency_health(&self) -> bool {
        matches!(
            self,
            Error::RetryableDependency { .. } | Error::NonRetryableDependency { .. }
        )
    }

    /// Dependency name for health accounting, if this is a dependency error
    pub fn dependency(&self) -> Option<&str> {
        match self {
            Error::RetryableDependency { dependency, .. }
            | Error::NonRetryableDependency { dependency, .. } => Some(dependency),
            _ => None,
        }
    }
}
