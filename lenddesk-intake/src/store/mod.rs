//! Backing-store contract for intake business records
//!
//! The intake service reads loan products and required-document checklists,
//! and writes document records and stage checkpoints, through a single
//! `StoreBackend` trait. The resilience layer wraps every call and swaps in
//! the static fallback provider when a dependency is tripped, so pipeline
//! code never branches on storage health.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lenddesk_common::events::Stage;
use lenddesk_common::Result;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tracked dependency name: the primary record store
pub const PRIMARY_STORE: &str = "primary-store";
/// Tracked dependency name: the product-lookup cache
pub const CACHE: &str = "cache";

/// Document categories recognized by the intake checklist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    BankStatement,
    TaxReturn,
    FinancialStatement,
    PurchaseAgreement,
    BusinessPlan,
    DriversLicense,
    /// Anything the intake does not recognize; validated at low confidence
    Unknown,
}

impl DocumentKind {
    /// Parse a declared kind from an upload form field
    pub fn parse(raw: &str) -> DocumentKind {
        match raw.trim().to_ascii_lowercase().as_str() {
            "bank_statement" => DocumentKind::BankStatement,
            "tax_return" => DocumentKind::TaxReturn,
            "financial_statement" => DocumentKind::FinancialStatement,
            "purchase_agreement" => DocumentKind::PurchaseAgreement,
            "business_plan" => DocumentKind::BusinessPlan,
            "drivers_license" => DocumentKind::DriversLicense,
            _ => DocumentKind::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::BankStatement => "bank_statement",
            DocumentKind::TaxReturn => "tax_return",
            DocumentKind::FinancialStatement => "financial_statement",
            DocumentKind::PurchaseAgreement => "purchase_agreement",
            DocumentKind::BusinessPlan => "business_plan",
            DocumentKind::DriversLicense => "drivers_license",
            DocumentKind::Unknown => "unknown",
        }
    }
}

/// One required document on a loan product's intake checklist
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub kind: DocumentKind,
    pub label: String,
    pub required: bool,
}

/// A loan product as served by the primary store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoanProduct {
    /// Product code used in session creation (e.g. "504", "7a")
    pub loan_type: String,
    pub display_name: String,
    pub required_documents: Vec<ChecklistItem>,
}

/// Persistent record of one uploaded document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: Uuid,
    pub session_id: Uuid,
    pub job_id: Uuid,
    pub original_name: String,
    pub declared_kind: DocumentKind,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Stage checkpoint written by the pipeline as each stage completes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageCheckpoint {
    pub job_id: Uuid,
    pub stage: Stage,
    pub recorded_at: DateTime<Utc>,
}

/// Backing-store operations, split by the dependency that serves them
///
/// Product lookups are backed by two dependencies (cache, then primary);
/// everything else hits the primary store. Implementations signal transient
/// trouble with `Error::RetryableDependency` and permanent rejection with
/// `Error::NonRetryableDependency`; any other error passes through the
/// resilience layer untouched.
#[async_trait]
pub trait StoreBackend: Send + Sync {
    /// Primary store: look up one loan product by code
    async fn get_loan_product(&self, loan_type: &str) -> Result<LoanProduct>;

    /// Primary store: persist a document record
    async fn put_document_record(&self, record: DocumentRecord) -> Result<()>;

    /// Primary store: list document records for a session
    async fn list_document_records(&self, session_id: Uuid) -> Result<Vec<DocumentRecord>>;

    /// Primary store: persist the latest stage checkpoint for a job
    async fn put_stage_checkpoint(&self, checkpoint: StageCheckpoint) -> Result<()>;

    /// Primary store: read the latest stage checkpoint for a job
    async fn get_stage_checkpoint(&self, job_id: Uuid) -> Result<Option<StageCheckpoint>>;

    /// Cache: look up a loan product, None on miss
    async fn cache_get_product(&self, loan_type: &str) -> Result<Option<LoanProduct>>;

    /// Cache: store a loan product after a primary read
    async fn cache_put_product(&self, product: LoanProduct) -> Result<()>;
}

/// Built-in loan product catalog
///
/// Seeds the in-memory primary store and doubles as the fallback dataset,
/// so degraded-mode reads satisfy the same shape as primary reads.
pub fn builtin_catalog() -> Vec<LoanProduct> {
    fn item(kind: DocumentKind, label: &str, required: bool) -> ChecklistItem {
        ChecklistItem {
            kind,
            label: label.to_string(),
            required,
        }
    }

    vec![
        LoanProduct {
            loan_type: "7a".to_string(),
            display_name: "SBA 7(a) Working Capital".to_string(),
            required_documents: vec![
                item(DocumentKind::BankStatement, "Last 3 months bank statements", true),
                item(DocumentKind::TaxReturn, "Business tax returns (2 years)", true),
                item(DocumentKind::FinancialStatement, "Year-to-date financials", true),
                item(DocumentKind::DriversLicense, "Government-issued photo ID", true),
            ],
        },
        LoanProduct {
            loan_type: "504".to_string(),
            display_name: "SBA 504 Fixed Asset".to_string(),
            required_documents: vec![
                item(DocumentKind::PurchaseAgreement, "Asset purchase agreement", true),
                item(DocumentKind::TaxReturn, "Business tax returns (3 years)", true),
                item(DocumentKind::FinancialStatement, "Interim financial statement", true),
                item(DocumentKind::BusinessPlan, "Business plan with projections", false),
                item(DocumentKind::DriversLicense, "Government-issued photo ID", true),
            ],
        },
        LoanProduct {
            loan_type: "express".to_string(),
            display_name: "SBA Express Line of Credit".to_string(),
            required_documents: vec![
                item(DocumentKind::BankStatement, "Last 3 months bank statements", true),
                item(DocumentKind::DriversLicense, "Government-issued photo ID", true),
            ],
        },
        LoanProduct {
            loan_type: "microloan".to_string(),
            display_name: "Microloan Program".to_string(),
            required_documents: vec![
                item(DocumentKind::BusinessPlan, "Business plan", true),
                item(DocumentKind::DriversLicense, "Government-issued photo ID", true),
            ],
        },
    ]
}
