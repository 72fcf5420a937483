//! Assertions for branch outcomes and incident reports.

use crate::core::{CaptureStage, WorkflowState};
use crate::fanout::{BranchOutcome, BranchStatus};
use crate::orchestrator::IncidentReport;

/// Asserts that the branch for `volume_id` completed.
pub fn assert_branch_completed(report: &IncidentReport, volume_id: &str) {
    let outcome = find_branch(report, volume_id);
    assert!(
        outcome.is_completed(),
        "Expected branch {volume_id} to complete, got {:?}",
        outcome.status
    );
}

/// Asserts that the branch for `volume_id` failed at `stage` with an error of `kind`.
pub fn assert_branch_failed(report: &IncidentReport, volume_id: &str, stage: CaptureStage, kind: &str) {
    let outcome = find_branch(report, volume_id);
    match &outcome.status {
        BranchStatus::Failed {
            stage: failed_stage,
            error,
        } => {
            assert_eq!(
                *failed_stage,
                Some(stage),
                "Expected branch {volume_id} to fail at {stage}, failed at {failed_stage:?}"
            );
            assert_eq!(error.kind(), kind, "Unexpected error for {volume_id}: {error}");
        }
        BranchStatus::Completed { .. } => panic!("Expected branch {volume_id} to fail"),
    }
}

/// Asserts the terminal state of a report.
pub fn assert_incident_state(report: &IncidentReport, expected: WorkflowState) {
    assert_eq!(
        report.state, expected,
        "Expected incident state {expected}, got {} (failure: {:?})",
        report.state, report.failure
    );
}

fn find_branch<'a>(report: &'a IncidentReport, volume_id: &str) -> &'a BranchOutcome {
    report
        .branches
        .iter()
        .find(|b| b.context.source_volume_id == volume_id)
        .unwrap_or_else(|| panic!("No finished branch for {volume_id}"))
}
