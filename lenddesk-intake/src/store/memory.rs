//! In-process primary store with controllable fault injection
//!
//! `MemoryBackend` plays the role of the real primary store and product
//! cache. The `FaultInjector` forces dependency failures on demand, which is
//! how tests and the `/admin/faults` surface exercise retry, backoff, and
//! degraded-mode behavior without real infrastructure.

use super::{
    builtin_catalog, DocumentRecord, LoanProduct, StageCheckpoint, StoreBackend, CACHE,
    PRIMARY_STORE,
};
use async_trait::async_trait;
use lenddesk_common::{Error, Result};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Failure behavior injected for one dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultMode {
    /// Serve calls normally
    #[default]
    Healthy,
    /// Every call fails with a retryable error (simulated timeout)
    Retryable,
    /// Every call fails with a non-retryable error (simulated auth rejection)
    NonRetryable,
}

/// Shared fault switchboard for the in-memory dependencies
#[derive(Clone, Default)]
pub struct FaultInjector {
    modes: Arc<Mutex<HashMap<String, FaultMode>>>,
}

impl FaultInjector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the failure behavior for a dependency
    pub fn set(&self, dependency: &str, mode: FaultMode) {
        self.modes
            .lock()
            .expect("fault injector lock poisoned")
            .insert(dependency.to_string(), mode);
        tracing::info!(dependency = dependency, mode = ?mode, "Fault mode changed");
    }

    /// Clear all injected faults
    pub fn clear(&self) {
        self.modes
            .lock()
            .expect("fault injector lock poisoned")
            .clear();
    }

    fn mode(&self, dependency: &str) -> FaultMode {
        self.modes
            .lock()
            .expect("fault injector lock poisoned")
            .get(dependency)
            .copied()
            .unwrap_or_default()
    }

    /// Error for the current fault mode, None when healthy
    fn check(&self, dependency: &str) -> Result<()> {
        match self.mode(dependency) {
            FaultMode::Healthy => Ok(()),
            FaultMode::Retryable => Err(Error::retryable(
                dependency,
                "simulated timeout: no response within deadline",
            )),
            FaultMode::NonRetryable => Err(Error::non_retryable(
                dependency,
                "simulated authorization rejection",
            )),
        }
    }
}

#[derive(Default)]
struct MemoryState {
    documents: HashMap<Uuid, Vec<DocumentRecord>>,
    checkpoints: HashMap<Uuid, StageCheckpoint>,
    cached_products: HashMap<String, LoanProduct>,
}

/// In-memory primary store and cache
pub struct MemoryBackend {
    products: HashMap<String, LoanProduct>,
    state: Mutex<MemoryState>,
    faults: FaultInjector,
}

impl MemoryBackend {
    pub fn new(faults: FaultInjector) -> Self {
        let products = builtin_catalog()
            .into_iter()
            .map(|p| (p.loan_type.clone(), p))
            .collect();

        Self {
            products,
            state: Mutex::new(MemoryState::default()),
            faults,
        }
    }
}

#[async_trait]
impl StoreBackend for MemoryBackend {
    async fn get_loan_product(&self, loan_type: &str) -> Result<LoanProduct> {
        self.faults.check(PRIMARY_STORE)?;
        self.products
            .get(loan_type)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("Unknown loan type: {}", loan_type)))
    }

    async fn put_document_record(&self, record: DocumentRecord) -> Result<()> {
        self.faults.check(PRIMARY_STORE)?;
        self.state
            .lock()
            .expect("memory store lock poisoned")
            .documents
            .entry(record.session_id)
            .or_default()
            .push(record);
        Ok(())
    }

    async fn list_document_records(&self, session_id: Uuid) -> Result<Vec<DocumentRecord>> {
        self.faults.check(PRIMARY_STORE)?;
        Ok(self
            .state
            .lock()
            .expect("memory store lock poisoned")
            .documents
            .get(&session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_stage_checkpoint(&self, checkpoint: StageCheckpoint) -> Result<()> {
        self.faults.check(PRIMARY_STORE)?;
        self.state
            .lock()
            .expect("memory store lock poisoned")
            .checkpoints
            .insert(checkpoint.job_id, checkpoint);
        Ok(())
    }

    async fn get_stage_checkpoint(&self, job_id: Uuid) -> Result<Option<StageCheckpoint>> {
        self.faults.check(PRIMARY_STORE)?;
        Ok(self
            .state
            .lock()
            .expect("memory store lock poisoned")
            .checkpoints
            .get(&job_id)
            .cloned())
    }

    async fn cache_get_product(&self, loan_type: &str) -> Result<Option<LoanProduct>> {
        self.faults.check(CACHE)?;
        Ok(self
            .state
            .lock()
            .expect("memory store lock poisoned")
            .cached_products
            .get(loan_type)
            .cloned())
    }

    async fn cache_put_product(&self, product: LoanProduct) -> Result<()> {
        self.faults.check(CACHE)?;
        self.state
            .lock()
            .expect("memory store lock poisoned")
            .cached_products
            .insert(product.loan_type.clone(), product);
        Ok(())
    }
}
