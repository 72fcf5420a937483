//! Evidence manifest and audit record formats.

use serde::{Deserialize, Serialize};

use super::BranchContext;
use crate::errors::CaptureError;
use crate::provider::LogEvent;

/// Lineage of one recovered volume, written once per branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceManifest {
    /// Incident the evidence belongs to.
    pub incident_id: String,
    /// The compromised instance.
    pub instance_id: String,
    /// Region of the incident.
    pub region: String,
    /// Volume of the compromised instance.
    pub source_volume_id: String,
    /// Volume attached to the collection instance.
    pub forensic_volume_id: String,
    /// Snapshot of the source volume.
    pub source_snapshot_id: String,
    /// Copy inside the member account.
    pub copied_snapshot_id: String,
    /// Copy inside the security account.
    pub final_snapshot_id: String,
    /// Instance the forensic volume is attached to.
    pub collection_instance_id: String,
}

impl EvidenceManifest {
    /// Builds the manifest of a branch that has created all its resources.
    pub fn from_branch(branch: &BranchContext) -> Result<Self, CaptureError> {
        Ok(Self {
            incident_id: branch.incident_id().to_string(),
            instance_id: branch.instance_id.clone(),
            region: branch.region.clone(),
            source_volume_id: branch.source_volume_id.clone(),
            forensic_volume_id: branch.forensic_volume()?.to_string(),
            source_snapshot_id: branch.source_snapshot_id.clone(),
            copied_snapshot_id: branch.copied_snapshot()?.to_string(),
            final_snapshot_id: branch.final_snapshot()?.to_string(),
            collection_instance_id: branch.collection_instance()?.to_string(),
        })
    }

    /// Pretty-printed JSON body.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, CaptureError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

/// One entry of the incident audit stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// The branch context at completion.
    pub branch: BranchContext,
}

impl AuditRecord {
    /// Creates a record.
    #[must_use]
    pub fn new(timestamp_ms: i64, branch: BranchContext) -> Self {
        Self {
            timestamp_ms,
            branch,
        }
    }

    /// Serializes the record as a log event.
    pub fn to_log_event(&self) -> Result<LogEvent, CaptureError> {
        Ok(LogEvent::new(
            self.timestamp_ms,
            serde_json::to_string(&self.branch)?,
        ))
    }

    /// Parses a log event back into a record.
    pub fn from_log_event(event: &LogEvent) -> Result<Self, CaptureError> {
        Ok(Self {
            timestamp_ms: event.timestamp_ms,
            branch: serde_json::from_str(&event.message)?,
        })
    }
}
