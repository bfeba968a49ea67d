//! Document validation heuristics
//!
//! Pure verdict function run exactly once per job, at the transition from
//! the AI review stage to completion. Each heuristic fires independently,
//! may add a reason, and contributes a sub-confidence; the final confidence
//! is the product of all sub-confidences clamped to [0, 1]. Well-formed
//! input never produces an error: unrecognized document kinds degrade to a
//! neutral low-confidence verdict instead.

use crate::pipeline::extraction::{SimulatedExtraction, SIGNATURE_REQUIRED};
use crate::store::DocumentKind;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Minimum OCR confidence before a scan is considered unreadable
pub const OCR_CONFIDENCE_FLOOR: f64 = 0.6;
/// Uploads smaller than this are treated as accidental or truncated scans
pub const MIN_PLAUSIBLE_BYTES: u64 = 10 * 1024;
/// Confidence cap applied when the document kind is unrecognized
const UNKNOWN_KIND_CONFIDENCE_CAP: f64 = 0.5;

/// Final verdict for one document, immutable once produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub accepted: bool,
    /// Human-readable reasons for every heuristic that fired
    pub reasons: Vec<String>,
    /// Overall confidence in [0, 1]
    pub confidence: f64,
    pub extracted_fields: HashMap<String, String>,
}

/// Stateless validation engine
///
/// Holds only tunable thresholds; `validate` has no side effects and no
/// dependency on storage or clock.
pub struct ValidationEngine {
    ocr_confidence_floor: f64,
    min_plausible_bytes: u64,
}

impl Default for ValidationEngine {
    fn default() -> Self {
        Self {
            ocr_confidence_floor: OCR_CONFIDENCE_FLOOR,
            min_plausible_bytes: MIN_PLAUSIBLE_BYTES,
        }
    }
}

impl ValidationEngine {
    /// Evaluate all heuristics against one simulated extraction
    pub fn validate(&self, extraction: &SimulatedExtraction) -> ValidationResult {
        let mut reasons = Vec::new();
        let mut blocking = 0usize;
        let mut confidence = extraction.ocr_confidence;

        // Missing-signature check (blocking for kinds that require one)
        if SIGNATURE_REQUIRED.contains(&extraction.detected_kind) && !extraction.has_signature {
            reasons.push(format!(
                "no signature detected on {}",
                extraction.detected_kind.as_str()
            ));
            blocking += 1;
            confidence *= 0.6;
        }

        // Low-OCR-confidence check (blocking)
        if extraction.ocr_confidence < self.ocr_confidence_floor {
            reasons.push(format!(
                "OCR confidence {:.2} below threshold {:.2}",
                extraction.ocr_confidence, self.ocr_confidence_floor
            ));
            blocking += 1;
            confidence *= 0.7;
        }

        // File-size heuristic (blocking; a few KB is not a real scan)
        if extraction.size_bytes < self.min_plausible_bytes {
            reasons.push(format!(
                "file size {} bytes too small for a readable document",
                extraction.size_bytes
            ));
            blocking += 1;
            confidence *= 0.5;
        }

        // Declared-vs-detected mismatch (blocking only when both are known)
        if extraction.declared_kind != DocumentKind::Unknown
            && extraction.detected_kind != DocumentKind::Unknown
            && extraction.declared_kind != extraction.detected_kind
        {
            reasons.push(format!(
                "declared as {} but detected as {}",
                extraction.declared_kind.as_str(),
                extraction.detected_kind.as_str()
            ));
            blocking += 1;
            confidence *= 0.55;
        }

        // Unknown kinds: neutral low-confidence result, never a rejection on
        // their own and never an error
        if extraction.declared_kind == DocumentKind::Unknown
            || extraction.detected_kind == DocumentKind::Unknown
        {
            reasons.push("document type not recognized, manual review advised".to_string());
            confidence = confidence.min(UNKNOWN_KIND_CONFIDENCE_CAP);
        }

        ValidationResult {
            accepted: blocking == 0,
            reasons,
            confidence: confidence.clamp(0.0, 1.0),
            extracted_fields: extraction.extracted_fields.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extraction() -> SimulatedExtraction {
        SimulatedExtraction {
            declared_kind: DocumentKind::BankStatement,
            detected_kind: DocumentKind::BankStatement,
            ocr_confidence: 0.9,
            has_signature: true,
            size_bytes: 200_000,
            extracted_fields: HashMap::from([(
                "amount".to_string(),
                "$120000".to_string(),
            )]),
        }
    }

    #[test]
    fn clean_document_is_accepted() {
        let result = ValidationEngine::default().validate(&extraction());
        assert!(result.accepted);
        assert!(result.reasons.is_empty());
        assert!((0.0..=1.0).contains(&result.confidence));
        assert_eq!(result.extracted_fields.get("amount").unwrap(), "$120000");
    }

    #[test]
    fn low_ocr_confidence_blocks() {
        let mut e = extraction();
        e.ocr_confidence = 0.5;
        let result = ValidationEngine::default().validate(&e);
        assert!(!result.accepted);
        assert!(result.reasons[0].contains("OCR confidence"));
        assert!(result.confidence < 0.5);
    }

    #[test]
    fn missing_signature_blocks_only_signature_required_kinds() {
        let mut e = extraction();
        e.has_signature = false;
        // Bank statements do not need a signature
        assert!(ValidationEngine::default().validate(&e).accepted);

        e.declared_kind = DocumentKind::PurchaseAgreement;
        e.detected_kind = DocumentKind::PurchaseAgreement;
        let result = ValidationEngine::default().validate(&e);
        assert!(!result.accepted);
        assert!(result.reasons[0].contains("signature"));
    }

    #[test]
    fn tiny_file_blocks() {
        let mut e = extraction();
        e.size_bytes = 512;
        let result = ValidationEngine::default().validate(&e);
        assert!(!result.accepted);
        assert!(result.reasons[0].contains("too small"));
    }

    #[test]
    fn kind_mismatch_blocks() {
        let mut e = extraction();
        e.declared_kind = DocumentKind::TaxReturn;
        let result = ValidationEngine::default().validate(&e);
        assert!(!result.accepted);
        assert!(result.reasons[0].contains("declared as tax_return"));
    }

    #[test]
    fn unknown_kind_degrades_to_neutral_low_confidence() {
        let mut e = extraction();
        e.declared_kind = DocumentKind::Unknown;
        e.detected_kind = DocumentKind::Unknown;
        let result = ValidationEngine::default().validate(&e);
        // Not a rejection, but capped confidence and an advisory reason
        assert!(result.accepted);
        assert!(result.confidence <= 0.5);
        assert_eq!(result.reasons.len(), 1);
    }

    #[test]
    fn multiple_failures_stack_reasons_and_shrink_confidence() {
        let mut e = extraction();
        e.ocr_confidence = 0.5;
        e.size_bytes = 100;
        e.declared_kind = DocumentKind::TaxReturn;
        let result = ValidationEngine::default().validate(&e);
        assert!(!result.accepted);
        assert_eq!(result.reasons.len(), 3);
        assert!(result.confidence < 0.2);
        assert!(result.confidence >= 0.0);
    }

    #[test]
    fn confidence_always_clamped() {
        let mut e = extraction();
        e.ocr_confidence = 0.98;
        let result = ValidationEngine::default().validate(&e);
        assert!(result.confidence <= 1.0);
    }
}
