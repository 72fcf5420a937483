//! The trigger payload and the incident-level context built from it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::BranchContext;
use crate::config::CaptureConfig;
use crate::errors::CaptureError;
use crate::utils::{validate_account_id, validate_incident_id, validate_region, validate_resource_id};

/// A normalized security finding naming a compromised instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncidentEvent {
    /// Account the instance runs in.
    pub account_id: String,
    /// Finding or incident identifier.
    #[serde(alias = "finding_id")]
    pub incident_id: String,
    /// The compromised instance.
    pub instance_id: String,
    /// Region of the instance.
    pub region: String,
    /// Finding severity.
    #[serde(default)]
    pub severity: f64,
    /// Finding title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// When the finding was first reported.
    pub created_at: DateTime<Utc>,
    /// When the finding was last updated.
    pub updated_at: DateTime<Utc>,
}

impl IncidentEvent {
    /// Creates an event stamped with the current time.
    #[must_use]
    pub fn new(
        account_id: impl Into<String>,
        incident_id: impl Into<String>,
        instance_id: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            account_id: account_id.into(),
            incident_id: incident_id.into(),
            instance_id: instance_id.into(),
            region: region.into(),
            severity: 0.0,
            title: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the severity.
    #[must_use]
    pub fn with_severity(mut self, severity: f64) -> Self {
        self.severity = severity;
        self
    }
}

/// A snapshot taken of one volume of the compromised instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedSnapshot {
    /// The snapshot.
    pub snapshot_id: String,
    /// The volume it was taken from.
    pub volume_id: String,
}

impl CapturedSnapshot {
    /// Creates a captured snapshot record.
    #[must_use]
    pub fn new(snapshot_id: impl Into<String>, volume_id: impl Into<String>) -> Self {
        Self {
            snapshot_id: snapshot_id.into(),
            volume_id: volume_id.into(),
        }
    }
}

/// State shared by every stage of one incident.
///
/// The incident id is fixed at construction; every artifact the workflow
/// writes derives its key or stream name from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncidentContext {
    incident_id: String,
    /// Account of the compromised instance.
    pub source_account_id: String,
    /// Account that receives the evidence.
    pub security_account_id: String,
    /// Region of the incident.
    pub region: String,
    /// The compromised instance.
    pub instance_id: String,
    captured_snapshots: Vec<CapturedSnapshot>,
}

impl IncidentContext {
    /// Validates a trigger payload and builds the context for it.
    pub fn from_event(event: &IncidentEvent, config: &CaptureConfig) -> Result<Self, CaptureError> {
        validate_incident_id(&event.incident_id)?;
        validate_account_id("account_id", &event.account_id)?;
        validate_region("region", &event.region)?;
        validate_resource_id("instance_id", "i", &event.instance_id)?;

        if event.region != config.region {
            return Err(CaptureError::configuration(
                "region",
                format!(
                    "incident region {} does not match configured region {}",
                    event.region, config.region
                ),
            ));
        }

        Ok(Self {
            incident_id: event.incident_id.clone(),
            source_account_id: event.account_id.clone(),
            security_account_id: config.security_account_id.clone(),
            region: event.region.clone(),
            instance_id: event.instance_id.clone(),
            captured_snapshots: Vec::new(),
        })
    }

    /// The incident id.
    #[must_use]
    pub fn incident_id(&self) -> &str {
        &self.incident_id
    }

    /// Snapshots captured by the snapshot stage.
    #[must_use]
    pub fn captured_snapshots(&self) -> &[CapturedSnapshot] {
        &self.captured_snapshots
    }

    /// Ids of the captured snapshots.
    #[must_use]
    pub fn snapshot_ids(&self) -> Vec<String> {
        self.captured_snapshots
            .iter()
            .map(|s| s.snapshot_id.clone())
            .collect()
    }

    /// Records the snapshots taken of the instance.
    pub fn set_captured_snapshots(&mut self, snapshots: Vec<CapturedSnapshot>) {
        self.captured_snapshots = snapshots;
    }

    /// Narrows the incident to one captured snapshot.
    #[must_use]
    pub fn narrow(&self, snapshot: &CapturedSnapshot) -> BranchContext {
        BranchContext::new(
            self.incident_id.clone(),
            self.source_account_id.clone(),
            self.security_account_id.clone(),
            self.region.clone(),
            self.instance_id.clone(),
            snapshot.clone(),
        )
    }

    /// One branch context per captured snapshot, in capture order.
    #[must_use]
    pub fn branches(&self) -> Vec<BranchContext> {
        self.captured_snapshots.iter().map(|s| self.narrow(s)).collect()
    }
}
