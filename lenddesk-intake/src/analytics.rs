//! On-demand session analytics
//!
//! Computed from the job snapshots at request time; there is no separately
//! maintained aggregate that could drift from the job map.

use crate::pipeline::JobSnapshot;
use lenddesk_common::events::Stage;
use serde::Serialize;
use std::collections::BTreeMap;

/// Aggregate view of one session's pipeline activity
#[derive(Debug, Clone, Serialize)]
pub struct SessionAnalytics {
    pub total_documents: usize,
    /// Job counts keyed by stage label
    pub by_stage: BTreeMap<String, usize>,
    pub completed: usize,
    pub failed: usize,
    pub accepted: usize,
    /// Mean confidence across completed jobs, None before any complete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_confidence: Option<f64>,
}

impl SessionAnalytics {
    /// Compute analytics for a set of jobs
    pub fn compute(jobs: &[JobSnapshot]) -> Self {
        let mut by_stage: BTreeMap<String, usize> = BTreeMap::new();
        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut accepted = 0usize;
        let mut confidence_sum = 0.0f64;

        for job in jobs {
            *by_stage.entry(job.stage.as_str().to_string()).or_default() += 1;
            match job.stage {
                Stage::Complete => {
                    completed += 1;
                    if let Some(result) = &job.result {
                        confidence_sum += result.confidence;
                        if result.accepted {
                            accepted += 1;
                        }
                    }
                }
                Stage::Failed => failed += 1,
                _ => {}
            }
        }

        let average_confidence = if completed > 0 {
            Some(confidence_sum / completed as f64)
        } else {
            None
        };

        Self {
            total_documents: jobs.len(),
            by_stage,
            completed,
            failed,
            accepted,
            average_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::types::{Job, UploadMeta};
    use crate::store::DocumentKind;
    use crate::validation::ValidationResult;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn job_at(stage: Stage, confidence: Option<f64>, accepted: bool) -> JobSnapshot {
        let mut job = Job::new(
            Uuid::new_v4(),
            &UploadMeta {
                original_name: "doc.pdf".to_string(),
                declared_kind: DocumentKind::BankStatement,
                size_bytes: 20_000,
            },
        );
        job.advance_to(stage);
        if let Some(confidence) = confidence {
            job.result = Some(ValidationResult {
                accepted,
                reasons: vec![],
                confidence,
                extracted_fields: HashMap::new(),
            });
        }
        job.snapshot()
    }

    #[test]
    fn empty_session_has_empty_analytics() {
        let analytics = SessionAnalytics::compute(&[]);
        assert_eq!(analytics.total_documents, 0);
        assert!(analytics.by_stage.is_empty());
        assert!(analytics.average_confidence.is_none());
    }

    #[test]
    fn counts_by_stage_and_outcome() {
        let jobs = vec![
            job_at(Stage::Ocr, None, false),
            job_at(Stage::Complete, Some(0.9), true),
            job_at(Stage::Complete, Some(0.5), false),
            job_at(Stage::Failed, None, false),
        ];
        let analytics = SessionAnalytics::compute(&jobs);

        assert_eq!(analytics.total_documents, 4);
        assert_eq!(analytics.by_stage["ocr"], 1);
        assert_eq!(analytics.by_stage["complete"], 2);
        assert_eq!(analytics.by_stage["failed"], 1);
        assert_eq!(analytics.completed, 2);
        assert_eq!(analytics.failed, 1);
        assert_eq!(analytics.accepted, 1);
        let avg = analytics.average_confidence.unwrap();
        assert!((avg - 0.7).abs() < 1e-9);
    }
}
