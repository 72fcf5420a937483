//! The catalogue of capture stages.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Every stage the capture workflow can execute.
///
/// The first two run once per incident; the rest form the per-volume branch
/// and always execute in [`CaptureStage::BRANCH_SEQUENCE`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureStage {
    /// Snapshot every volume attached to the compromised instance.
    CreateSnapshots,
    /// Wait until every captured snapshot is complete.
    ConfirmSnapshots,
    /// Copy the source snapshot under the evidence key.
    CopySnapshot,
    /// Wait for the copy to complete.
    ConfirmCopy,
    /// Grant the security account permission to use the copy.
    ShareSnapshot,
    /// Re-copy inside the security account under its own key.
    FinalCopy,
    /// Wait for the final copy to complete.
    ConfirmFinalCopy,
    /// Create a volume from the final snapshot.
    CreateVolume,
    /// Launch (or reuse) the collection instance.
    LaunchInstance,
    /// Wait for the collection instance's readiness marker.
    AwaitReadiness,
    /// Attach the volume and write the evidence manifest.
    MountVolume,
    /// Append the completed branch to the incident audit stream.
    RecordAudit,
}

impl CaptureStage {
    /// Stages executed by every branch, in order.
    pub const BRANCH_SEQUENCE: [Self; 10] = [
        Self::CopySnapshot,
        Self::ConfirmCopy,
        Self::ShareSnapshot,
        Self::FinalCopy,
        Self::ConfirmFinalCopy,
        Self::CreateVolume,
        Self::LaunchInstance,
        Self::AwaitReadiness,
        Self::MountVolume,
        Self::RecordAudit,
    ];

    /// Returns true if the stage may legally report `Pending`.
    #[must_use]
    pub fn is_asynchronous(&self) -> bool {
        matches!(
            self,
            Self::ConfirmSnapshots
                | Self::ConfirmCopy
                | Self::ConfirmFinalCopy
                | Self::AwaitReadiness
                | Self::MountVolume
        )
    }

    /// Returns true if a transient failure of this stage may be retried.
    #[must_use]
    pub fn is_retry_eligible(&self) -> bool {
        self.is_asynchronous() || matches!(self, Self::CopySnapshot | Self::FinalCopy)
    }

    /// Returns true if the stage runs inside a branch.
    #[must_use]
    pub fn is_branch_stage(&self) -> bool {
        !matches!(self, Self::CreateSnapshots | Self::ConfirmSnapshots)
    }

    /// Snake-case name used in logs, alerts and idempotency keys.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateSnapshots => "create_snapshots",
            Self::ConfirmSnapshots => "confirm_snapshots",
            Self::CopySnapshot => "copy_snapshot",
            Self::ConfirmCopy => "confirm_copy",
            Self::ShareSnapshot => "share_snapshot",
            Self::FinalCopy => "final_copy",
            Self::ConfirmFinalCopy => "confirm_final_copy",
            Self::CreateVolume => "create_volume",
            Self::LaunchInstance => "launch_instance",
            Self::AwaitReadiness => "await_readiness",
            Self::MountVolume => "mount_volume",
            Self::RecordAudit => "record_audit",
        }
    }
}

impl fmt::Display for CaptureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_sequence_order() {
        let seq = CaptureStage::BRANCH_SEQUENCE;
        assert_eq!(seq.first(), Some(&CaptureStage::CopySnapshot));
        assert_eq!(seq.last(), Some(&CaptureStage::RecordAudit));

        let await_pos = seq.iter().position(|s| *s == CaptureStage::AwaitReadiness);
        let mount_pos = seq.iter().position(|s| *s == CaptureStage::MountVolume);
        assert!(await_pos < mount_pos);
        assert!(seq.iter().all(CaptureStage::is_branch_stage));
    }

    #[test]
    fn test_asynchronous_stages() {
        assert!(CaptureStage::ConfirmCopy.is_asynchronous());
        assert!(CaptureStage::ConfirmFinalCopy.is_asynchronous());
        assert!(CaptureStage::AwaitReadiness.is_asynchronous());
        assert!(!CaptureStage::CreateVolume.is_asynchronous());
        assert!(!CaptureStage::ShareSnapshot.is_retry_eligible());
        assert!(CaptureStage::CopySnapshot.is_retry_eligible());
        assert!(CaptureStage::FinalCopy.is_retry_eligible());
    }

    #[test]
    fn test_stage_display_and_serde() {
        assert_eq!(CaptureStage::FinalCopy.to_string(), "final_copy");
        let json = serde_json::to_string(&CaptureStage::AwaitReadiness).unwrap();
        assert_eq!(json, r#""await_readiness""#);
    }
}
