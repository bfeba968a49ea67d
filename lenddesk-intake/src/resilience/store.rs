//! Resilient wrapper around every backing-store call
//!
//! All storage access flows through `ResilientStore`, which applies a
//! per-attempt timeout, retry with linear backoff for transient failures,
//! and automatic substitution by the static fallback provider once (or as
//! soon as) the owning dependency is tripped. Business logic never branches
//! on storage health; it sees a `Sourced<T>` and a boolean tag.
//!
//! Error class handling:
//! - retryable (timeout, connection refused, unavailable): retried up to the
//!   budget, each failed attempt reported to the failure tracker, then the
//!   fallback satisfies the call
//! - non-retryable dependency errors (e.g. authorization): no retries, still
//!   reported to the tracker, then the fallback satisfies the call
//! - validation errors: propagate untouched, never consume retries, never
//!   affect dependency health

use crate::resilience::failure_tracker::SystemMode;
use crate::resilience::fallback::StaticFallbackProvider;
use crate::store::{
    DocumentRecord, LoanProduct, StageCheckpoint, StoreBackend, CACHE, PRIMARY_STORE,
};
use lenddesk_common::config::IntakeConfig;
use lenddesk_common::{Error, Result};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// A store result tagged with its origin
#[derive(Debug, Clone, Serialize)]
pub struct Sourced<T> {
    pub value: T,
    /// True when the static fallback produced this value
    pub fallback: bool,
}

impl<T> Sourced<T> {
    fn primary(value: T) -> Self {
        Self {
            value,
            fallback: false,
        }
    }

    fn fallback(value: T) -> Self {
        Self {
            value,
            fallback: true,
        }
    }
}

/// Retry/timeout/fallback wrapper over the store backend
pub struct ResilientStore {
    backend: Arc<dyn StoreBackend>,
    fallback: StaticFallbackProvider,
    mode: Arc<SystemMode>,
    max_retries: u32,
    base_delay: Duration,
    call_timeout: Duration,
}

impl ResilientStore {
    pub fn new(backend: Arc<dyn StoreBackend>, mode: Arc<SystemMode>, config: &IntakeConfig) -> Self {
        Self {
            backend,
            fallback: StaticFallbackProvider::new(),
            mode,
            max_retries: config.max_retries.max(1),
            base_delay: config.retry_base_delay(),
            call_timeout: config.store_timeout(),
        }
    }

    /// Run one dependency call with timeout, retry, and health reporting
    ///
    /// Returns the backend result after at most `max_retries` attempts; the
    /// caller decides whether a dependency failure is satisfied by fallback.
    async fn attempt<T, F, Fut>(&self, dependency: &str, op: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt: u32 = 1;
        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(Error::retryable(
                    dependency,
                    format!("call timed out after {:?}", self.call_timeout),
                )),
            };

            match outcome {
                Ok(value) => {
                    self.mode.record_success(dependency);
                    return Ok(value);
                }
                Err(e) if e.is_retryable() => {
                    self.mode.record_failure(dependency, &e.to_string());
                    if attempt >= self.max_retries {
                        tracing::warn!(
                            dependency = dependency,
                            attempts = attempt,
                            error = %e,
                            "Retry budget exhausted"
                        );
                        return Err(e);
                    }
                    let delay = self.base_delay * attempt;
                    tracing::debug!(
                        dependency = dependency,
                        attempt = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "Transient failure, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.affects_dependency_health() => {
                    // Non-retryable dependency failure: report and bail now
                    self.mode.record_failure(dependency, &e.to_string());
                    return Err(e);
                }
                // Validation and friends pass through without health impact
                Err(e) => return Err(e),
            }
        }
    }

    /// Look up a loan product: cache first, then primary, then fallback
    pub async fn get_loan_product(&self, loan_type: &str) -> Result<Sourced<LoanProduct>> {
        // Cache is best-effort; a degraded or failing cache only costs the hit
        if !self.mode.is_dependency_tripped(CACHE) {
            match self
                .attempt(CACHE, || self.backend.cache_get_product(loan_type))
                .await
            {
                Ok(Some(product)) => return Ok(Sourced::primary(product)),
                Ok(None) => {}
                Err(e) => {
                    tracing::debug!(loan_type = loan_type, error = %e, "Cache lookup failed");
                }
            }
        }

        if self.mode.is_dependency_tripped(PRIMARY_STORE) {
            return self
                .fallback
                .get_loan_product(loan_type)
                .map(Sourced::fallback);
        }

        match self
            .attempt(PRIMARY_STORE, || self.backend.get_loan_product(loan_type))
            .await
        {
            Ok(product) => {
                if !self.mode.is_dependency_tripped(CACHE) {
                    let cached = product.clone();
                    if let Err(e) = self
                        .attempt(CACHE, || self.backend.cache_put_product(cached.clone()))
                        .await
                    {
                        tracing::debug!(loan_type = loan_type, error = %e, "Cache fill failed");
                    }
                }
                Ok(Sourced::primary(product))
            }
            Err(e) if e.affects_dependency_health() => self
                .fallback
                .get_loan_product(loan_type)
                .map(Sourced::fallback),
            Err(e) => Err(e),
        }
    }

    /// Persist a document record; degraded writes are accepted ephemerally
    pub async fn put_document_record(&self, record: DocumentRecord) -> Result<Sourced<()>> {
        if self.mode.is_dependency_tripped(PRIMARY_STORE) {
            self.fallback.put_document_record(record);
            return Ok(Sourced::fallback(()));
        }

        let outcome = self
            .attempt(PRIMARY_STORE, || {
                self.backend.put_document_record(record.clone())
            })
            .await;
        match outcome {
            Ok(()) => Ok(Sourced::primary(())),
            Err(e) if e.affects_dependency_health() => {
                self.fallback.put_document_record(record);
                Ok(Sourced::fallback(()))
            }
            Err(e) => Err(e),
        }
    }

    /// List a session's document records
    pub async fn list_document_records(
        &self,
        session_id: Uuid,
    ) -> Result<Sourced<Vec<DocumentRecord>>> {
        if self.mode.is_dependency_tripped(PRIMARY_STORE) {
            return Ok(Sourced::fallback(
                self.fallback.list_document_records(session_id),
            ));
        }

        match self
            .attempt(PRIMARY_STORE, || {
                self.backend.list_document_records(session_id)
            })
            .await
        {
            Ok(records) => Ok(Sourced::primary(records)),
            Err(e) if e.affects_dependency_health() => Ok(Sourced::fallback(
                self.fallback.list_document_records(session_id),
            )),
            Err(e) => Err(e),
        }
    }

    /// Record the latest stage checkpoint for a job
    pub async fn put_stage_checkpoint(&self, checkpoint: StageCheckpoint) -> Result<Sourced<()>> {
        if self.mode.is_dependency_tripped(PRIMARY_STORE) {
            self.fallback.put_stage_checkpoint(checkpoint);
            return Ok(Sourced::fallback(()));
        }

        let outcome = self
            .attempt(PRIMARY_STORE, || {
                self.backend.put_stage_checkpoint(checkpoint.clone())
            })
            .await;
        match outcome {
            Ok(()) => Ok(Sourced::primary(())),
            Err(e) if e.affects_dependency_health() => {
                self.fallback.put_stage_checkpoint(checkpoint);
                Ok(Sourced::fallback(()))
            }
            Err(e) => Err(e),
        }
    }

    /// Read the latest stage checkpoint for a job
    pub async fn get_stage_checkpoint(
        &self,
        job_id: Uuid,
    ) -> Result<Sourced<Option<StageCheckpoint>>> {
        if self.mode.is_dependency_tripped(PRIMARY_STORE) {
            return Ok(Sourced::fallback(self.fallback.get_stage_checkpoint(job_id)));
        }

        match self
            .attempt(PRIMARY_STORE, || self.backend.get_stage_checkpoint(job_id))
            .await
        {
            Ok(checkpoint) => Ok(Sourced::primary(checkpoint)),
            Err(e) if e.affects_dependency_health() => {
                Ok(Sourced::fallback(self.fallback.get_stage_checkpoint(job_id)))
            }
            Err(e) => Err(e),
        }
    }

    /// Shared mode controller, for health reporting
    pub fn mode(&self) -> &Arc<SystemMode> {
        &self.mode
    }
}
