//! Static fallback provider for degraded mode
//!
//! Serves the same read shapes as the primary store from a canned, seed-free
//! dataset, and absorbs degraded-mode writes into process-lifetime maps.
//! Nothing written here survives a restart, and nothing is replayed into the
//! primary store on recovery; callers are told results are fallback-sourced
//! and must not assume durability.

use crate::store::{builtin_catalog, DocumentRecord, LoanProduct, StageCheckpoint};
use lenddesk_common::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct FallbackState {
    documents: HashMap<Uuid, Vec<DocumentRecord>>,
    checkpoints: HashMap<Uuid, StageCheckpoint>,
}

/// Deterministic substitute for the primary store and cache
pub struct StaticFallbackProvider {
    products: HashMap<String, LoanProduct>,
    state: Mutex<FallbackState>,
}

impl Default for StaticFallbackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl StaticFallbackProvider {
    pub fn new() -> Self {
        let products = builtin_catalog()
            .into_iter()
            .map(|p| (p.loan_type.clone(), p))
            .collect();

        Self {
            products,
            state: Mutex::new(FallbackState::default()),
        }
    }

    /// Canned product lookup; unknown loan types remain a validation error
    /// even while degraded
    pub fn get_loan_product(&self, loan_type: &str) -> Result<LoanProduct> {
        self.products
            .get(loan_type)
            .cloned()
            .ok_or_else(|| Error::Validation(format!("Unknown loan type: {}", loan_type)))
    }

    /// Accept a degraded-mode document write (ephemeral)
    pub fn put_document_record(&self, record: DocumentRecord) {
        self.state
            .lock()
            .expect("fallback lock poisoned")
            .documents
            .entry(record.session_id)
            .or_default()
            .push(record);
    }

    /// Documents recorded while degraded for one session
    pub fn list_document_records(&self, session_id: Uuid) -> Vec<DocumentRecord> {
        self.state
            .lock()
            .expect("fallback lock poisoned")
            .documents
            .get(&session_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Accept a degraded-mode checkpoint write (ephemeral)
    pub fn put_stage_checkpoint(&self, checkpoint: StageCheckpoint) {
        self.state
            .lock()
            .expect("fallback lock poisoned")
            .checkpoints
            .insert(checkpoint.job_id, checkpoint);
    }

    /// Latest checkpoint recorded while degraded for one job
    pub fn get_stage_checkpoint(&self, job_id: Uuid) -> Option<StageCheckpoint> {
        self.state
            .lock()
            .expect("fallback lock poisoned")
            .checkpoints
            .get(&job_id)
            .cloned()
    }
}
