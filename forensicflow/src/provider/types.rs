//! Value types exchanged with the cloud collaborators.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Tag carrying the incident id on every resource the workflow creates.
pub const INCIDENT_TAG: &str = "ForensicIncidentId";

/// Tag carrying the source volume id on evidence copies, volumes and instances.
pub const SOURCE_VOLUME_TAG: &str = "ForensicSourceVolume";

/// Tag carrying the compromised instance id.
pub const SOURCE_INSTANCE_TAG: &str = "ForensicSourceInstance";

/// Credentials scope for a sequence of collaborator calls.
///
/// A session without a role ARN acts as the security account itself; a
/// session produced by [`super::CredentialsApi::assume_role`] acts inside
/// a member account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Account the calls are made in.
    pub account_id: String,
    /// Region the calls are made in.
    pub region: String,
    /// Role the session was assumed with, if any.
    pub role_arn: Option<String>,
    /// Session name, `<instance-id>-<purpose>` for assumed sessions.
    pub session_name: String,
}

impl Session {
    /// A session acting as the given account without assuming a role.
    #[must_use]
    pub fn local(account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            region: region.into(),
            role_arn: None,
            session_name: "local".to_string(),
        }
    }

    /// Returns true if the session was produced by assuming a role.
    #[must_use]
    pub fn is_assumed(&self) -> bool {
        self.role_arn.is_some()
    }
}

/// Lifecycle state of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotState {
    /// Still being written.
    Pending,
    /// Usable.
    Completed,
    /// Failed permanently.
    Error,
}

impl SnapshotState {
    /// Lowercase state name as reported by the compute service.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Completed => "completed",
            Self::Error => "error",
        }
    }
}

/// What the compute service reports about one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotInfo {
    /// Snapshot identifier.
    pub snapshot_id: String,
    /// The volume the snapshot was taken from.
    pub volume_id: String,
    /// Current state.
    pub state: SnapshotState,
    /// Progress as reported by the service, e.g. `"42%"`.
    #[serde(default)]
    pub progress: Option<String>,
}

/// Request to copy a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopySnapshotRequest {
    /// Snapshot to copy.
    pub source_snapshot_id: String,
    /// Region of the source snapshot.
    pub source_region: String,
    /// Key the copy is encrypted with.
    pub kms_key_id: String,
    /// Description stored on the copy.
    pub description: String,
    /// Tags stored on the copy.
    pub tags: BTreeMap<String, String>,
    /// Idempotency token.
    pub client_token: String,
}

/// Request to create a volume from a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateVolumeRequest {
    /// Snapshot the volume is restored from.
    pub snapshot_id: String,
    /// Availability zone of the volume.
    pub availability_zone: String,
    /// Key the volume is encrypted with.
    pub kms_key_id: String,
    /// Tags stored on the volume.
    pub tags: BTreeMap<String, String>,
    /// Idempotency token.
    pub client_token: String,
}

/// Request to launch a collection instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInstanceRequest {
    /// Machine image.
    pub image_id: String,
    /// Instance type.
    pub instance_type: String,
    /// Instance profile name.
    pub instance_profile: String,
    /// Security group.
    pub security_group_id: String,
    /// Subnet, if not the AZ default.
    pub subnet_id: Option<String>,
    /// Availability zone; must match the evidence volume.
    pub availability_zone: String,
    /// Tags stored on the instance.
    pub tags: BTreeMap<String, String>,
    /// Idempotency token.
    pub client_token: String,
}

/// One event of a log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: i64,
    /// Message body.
    pub message: String,
}

impl LogEvent {
    /// Creates a log event.
    #[must_use]
    pub fn new(timestamp_ms: i64, message: impl Into<String>) -> Self {
        Self {
            timestamp_ms,
            message: message.into(),
        }
    }
}
