//! Multi-stage document processing pipeline
//!
//! `engine` owns the job map and stage advancement; `extraction` simulates
//! OCR/classification output; `types` defines the job state machine.

pub mod engine;
pub mod extraction;
pub mod types;

pub use engine::{DocumentPipeline, SubmitContext};
pub use types::{Job, JobSnapshot, JobStatus, UploadMeta};
