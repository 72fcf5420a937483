//! Per-volume branch context.

use serde::{Deserialize, Serialize};

use super::CapturedSnapshot;
use crate::errors::CaptureError;

/// Where a branch's evidence manifest was written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceLocation {
    /// Evidence bucket.
    pub bucket: String,
    /// Object key.
    pub key: String,
}

/// Outputs of branch stages, folded into the branch context in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BranchUpdate {
    /// The member-account copy was started.
    CopyStarted(String),
    /// The member-account copy completed.
    CopyConfirmed,
    /// The copy was shared with the security account.
    Shared,
    /// The security-account copy was started.
    FinalCopyStarted(String),
    /// The security-account copy completed.
    FinalCopyConfirmed,
    /// The evidence volume was created.
    VolumeCreated {
        /// The new volume.
        volume_id: String,
        /// Its availability zone.
        availability_zone: String,
    },
    /// The collection instance was launched or reused.
    InstanceLaunched(String),
    /// The collection instance reported ready.
    Ready,
    /// The volume was attached and the manifest written.
    Mounted(EvidenceLocation),
    /// The audit record was appended.
    Audited,
}

/// An incident narrowed to exactly one captured snapshot.
///
/// Owned by a single branch task. Fields are filled in as the branch's
/// stages complete; nothing outside the branch reads it until the branch
/// reaches a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchContext {
    incident_id: String,
    /// Account of the compromised instance.
    pub source_account_id: String,
    /// Account that receives the evidence.
    pub security_account_id: String,
    /// Region of the incident.
    pub region: String,
    /// The compromised instance.
    pub instance_id: String,
    /// The volume this branch recovers.
    pub source_volume_id: String,
    /// Snapshot of that volume.
    pub source_snapshot_id: String,
    /// Copy inside the member account.
    #[serde(default)]
    pub copied_snapshot_id: Option<String>,
    /// Copy inside the security account.
    #[serde(default)]
    pub final_snapshot_id: Option<String>,
    /// Zone of the evidence volume and collection instance.
    #[serde(default)]
    pub availability_zone: Option<String>,
    /// Volume restored from the final copy.
    #[serde(default)]
    pub forensic_volume_id: Option<String>,
    /// Instance the volume is attached to.
    #[serde(default)]
    pub collection_instance_id: Option<String>,
    /// Where the manifest was written.
    #[serde(default)]
    pub evidence_location: Option<EvidenceLocation>,
}

impl BranchContext {
    pub(crate) fn new(
        incident_id: String,
        source_account_id: String,
        security_account_id: String,
        region: String,
        instance_id: String,
        snapshot: CapturedSnapshot,
    ) -> Self {
        Self {
            incident_id,
            source_account_id,
            security_account_id,
            region,
            instance_id,
            source_volume_id: snapshot.volume_id,
            source_snapshot_id: snapshot.snapshot_id,
            copied_snapshot_id: None,
            final_snapshot_id: None,
            availability_zone: None,
            forensic_volume_id: None,
            collection_instance_id: None,
            evidence_location: None,
        }
    }

    /// The incident id.
    #[must_use]
    pub fn incident_id(&self) -> &str {
        &self.incident_id
    }

    /// Object key of this branch's evidence manifest.
    #[must_use]
    pub fn manifest_key(&self) -> String {
        format!(
            "{}/disk_evidence/{}.processedResources.json",
            self.incident_id, self.source_volume_id
        )
    }

    /// Folds a stage output into the context.
    pub fn apply(&mut self, update: BranchUpdate) {
        match update {
            BranchUpdate::CopyStarted(id) => self.copied_snapshot_id = Some(id),
            BranchUpdate::FinalCopyStarted(id) => self.final_snapshot_id = Some(id),
            BranchUpdate::VolumeCreated {
                volume_id,
                availability_zone,
            } => {
                self.forensic_volume_id = Some(volume_id);
                self.availability_zone = Some(availability_zone);
            }
            BranchUpdate::InstanceLaunched(id) => self.collection_instance_id = Some(id),
            BranchUpdate::Mounted(location) => self.evidence_location = Some(location),
            BranchUpdate::CopyConfirmed
            | BranchUpdate::Shared
            | BranchUpdate::FinalCopyConfirmed
            | BranchUpdate::Ready
            | BranchUpdate::Audited => {}
        }
    }

    /// The member-account copy.
    pub fn copied_snapshot(&self) -> Result<&str, CaptureError> {
        required(self.copied_snapshot_id.as_deref(), "copied snapshot")
    }

    /// The security-account copy.
    pub fn final_snapshot(&self) -> Result<&str, CaptureError> {
        required(self.final_snapshot_id.as_deref(), "final snapshot")
    }

    /// The evidence volume.
    pub fn forensic_volume(&self) -> Result<&str, CaptureError> {
        required(self.forensic_volume_id.as_deref(), "forensic volume")
    }

    /// The evidence volume's availability zone.
    pub fn zone(&self) -> Result<&str, CaptureError> {
        required(self.availability_zone.as_deref(), "availability zone")
    }

    /// The collection instance.
    pub fn collection_instance(&self) -> Result<&str, CaptureError> {
        required(self.collection_instance_id.as_deref(), "collection instance")
    }
}

fn required<'a>(value: Option<&'a str>, what: &str) -> Result<&'a str, CaptureError> {
    value.ok_or_else(|| CaptureError::Internal(format!("{what} not recorded yet")))
}
