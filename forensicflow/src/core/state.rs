//! Incident-level workflow states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The state of one incident's capture workflow.
///
/// `CreatingSnapshots -> ConfirmingSnapshots -> FanningOut -> Completed`,
/// with `Failed` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowState {
    /// Snapshots of the compromised instance are being requested.
    #[default]
    CreatingSnapshots,
    /// Waiting for every snapshot to complete.
    ConfirmingSnapshots,
    /// Per-volume branches are running.
    FanningOut,
    /// All branches reached a terminal state.
    Completed,
    /// The incident failed before fan-out or hit the global timeout.
    Failed,
}

impl WorkflowState {
    /// Returns true if no further transitions are allowed.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    /// Returns true if the transition is part of the state machine.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::CreatingSnapshots, Self::ConfirmingSnapshots)
                | (Self::ConfirmingSnapshots, Self::FanningOut)
                | (Self::FanningOut, Self::Completed)
                | (
                    Self::CreatingSnapshots | Self::ConfirmingSnapshots | Self::FanningOut,
                    Self::Failed
                )
        )
    }
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CreatingSnapshots => write!(f, "creating_snapshots"),
            Self::ConfirmingSnapshots => write!(f, "confirming_snapshots"),
            Self::FanningOut => write!(f, "fanning_out"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        assert!(WorkflowState::CreatingSnapshots.can_transition_to(WorkflowState::ConfirmingSnapshots));
        assert!(WorkflowState::ConfirmingSnapshots.can_transition_to(WorkflowState::FanningOut));
        assert!(WorkflowState::FanningOut.can_transition_to(WorkflowState::Completed));
    }

    #[test]
    fn test_rejected_transitions() {
        assert!(!WorkflowState::CreatingSnapshots.can_transition_to(WorkflowState::FanningOut));
        assert!(!WorkflowState::Completed.can_transition_to(WorkflowState::Failed));
        assert!(!WorkflowState::Failed.can_transition_to(WorkflowState::CreatingSnapshots));
    }

    #[test]
    fn test_terminal_states() {
        assert!(WorkflowState::Completed.is_terminal());
        assert!(WorkflowState::Failed.is_terminal());
        assert!(!WorkflowState::FanningOut.is_terminal());
        assert_eq!(WorkflowState::default(), WorkflowState::CreatingSnapshots);
        assert_eq!(WorkflowState::FanningOut.to_string(), "fanning_out");
    }
}
