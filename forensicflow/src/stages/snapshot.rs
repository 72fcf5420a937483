//! Snapshot capture, copy and share stages.

use std::collections::BTreeMap;
use tracing::{debug, info};

use super::{branch_tags, StageAttempt, StageHandlers};
use crate::context::{BranchContext, BranchUpdate, CapturedSnapshot, IncidentContext};
use crate::core::{CaptureStage, StageResult};
use crate::errors::CaptureError;
use crate::provider::{
    CopySnapshotRequest, Session, SnapshotState, INCIDENT_TAG, SOURCE_INSTANCE_TAG,
};

impl StageHandlers {
    /// Snapshots every volume attached to the compromised instance.
    pub async fn create_snapshots(
        &self,
        incident: &IncidentContext,
    ) -> Result<StageResult<Vec<CapturedSnapshot>>, CaptureError> {
        let session = self
            .member_session(
                &incident.source_account_id,
                &incident.instance_id,
                "CreateSnapshots",
            )
            .await?;
        let tags = BTreeMap::from([
            (INCIDENT_TAG.to_string(), incident.incident_id().to_string()),
            (SOURCE_INSTANCE_TAG.to_string(), incident.instance_id.clone()),
        ]);
        let description = format!(
            "Forensic capture of {} for incident {}",
            incident.instance_id,
            incident.incident_id()
        );

        let created = self
            .providers
            .compute
            .create_snapshots(&session, &incident.instance_id, &description, tags)
            .await?;

        info!(
            incident_id = incident.incident_id(),
            instance_id = %incident.instance_id,
            count = created.len(),
            "Snapshots requested"
        );
        Ok(StageResult::Completed(
            created
                .into_iter()
                .map(|s| CapturedSnapshot::new(s.snapshot_id, s.volume_id))
                .collect(),
        ))
    }

    /// Reports whether every captured snapshot has completed.
    pub async fn confirm_snapshots(
        &self,
        incident: &IncidentContext,
    ) -> Result<StageResult<()>, CaptureError> {
        let ids = incident.snapshot_ids();
        if ids.is_empty() {
            return Ok(StageResult::Completed(()));
        }

        let session = self
            .member_session(
                &incident.source_account_id,
                &incident.instance_id,
                "ConfirmSnapshots",
            )
            .await?;
        let found = self
            .providers
            .compute
            .describe_snapshots(&session, &ids)
            .await?;

        if let Some(failed) = found.iter().find(|s| s.state == SnapshotState::Error) {
            return Err(CaptureError::state(&failed.snapshot_id, failed.state.as_str()));
        }
        let completed = found
            .iter()
            .filter(|s| s.state == SnapshotState::Completed)
            .count();
        if completed < ids.len() {
            return Ok(StageResult::pending(format!(
                "{completed} of {} snapshots completed",
                ids.len()
            )));
        }
        Ok(StageResult::Completed(()))
    }

    pub(super) async fn copy_snapshot(&self, branch: &BranchContext) -> StageAttempt {
        let (key, existing) = self.recorded(branch, CaptureStage::CopySnapshot).await;
        if let Some(copy_id) = existing {
            debug!(copy_id = %copy_id, "Copy already recorded");
            return Ok(StageResult::Completed(BranchUpdate::CopyStarted(copy_id)));
        }

        let session = self
            .member_session(&branch.source_account_id, &branch.instance_id, "CopySnapshot")
            .await?;
        let request = CopySnapshotRequest {
            source_snapshot_id: branch.source_snapshot_id.clone(),
            source_region: branch.region.clone(),
            kms_key_id: self.config.kms_key_arn.clone(),
            description: format!(
                "Evidence copy of {} for incident {}",
                branch.source_snapshot_id,
                branch.incident_id()
            ),
            tags: branch_tags(branch),
            client_token: key.clone(),
        };
        let copy_id = self.providers.compute.copy_snapshot(&session, &request).await?;
        let copy_id = self.record(&key, CaptureStage::CopySnapshot, copy_id).await;
        Ok(StageResult::Completed(BranchUpdate::CopyStarted(copy_id)))
    }

    pub(super) async fn confirm_copy(&self, branch: &BranchContext) -> StageAttempt {
        let copy_id = branch.copied_snapshot()?;
        let session = self
            .member_session(&branch.source_account_id, &branch.instance_id, "ConfirmCopy")
            .await?;
        Ok(self
            .snapshot_status(&session, copy_id)
            .await?
            .map(|()| BranchUpdate::CopyConfirmed))
    }

    pub(super) async fn share_snapshot(&self, branch: &BranchContext) -> StageAttempt {
        let copy_id = branch.copied_snapshot()?;
        let session = self
            .member_session(&branch.source_account_id, &branch.instance_id, "ShareSnapshot")
            .await?;
        self.providers
            .compute
            .share_snapshot(&session, copy_id, &branch.security_account_id)
            .await?;
        Ok(StageResult::Completed(BranchUpdate::Shared))
    }

    pub(super) async fn final_copy(&self, branch: &BranchContext) -> StageAttempt {
        let (key, existing) = self.recorded(branch, CaptureStage::FinalCopy).await;
        if let Some(final_id) = existing {
            return Ok(StageResult::Completed(BranchUpdate::FinalCopyStarted(final_id)));
        }

        let request = CopySnapshotRequest {
            source_snapshot_id: branch.copied_snapshot()?.to_string(),
            source_region: branch.region.clone(),
            kms_key_id: self.config.kms_key_arn.clone(),
            description: format!(
                "Final evidence copy of {} for incident {}",
                branch.source_snapshot_id,
                branch.incident_id()
            ),
            tags: branch_tags(branch),
            client_token: key.clone(),
        };
        let final_id = self
            .providers
            .compute
            .copy_snapshot(&self.security_session(), &request)
            .await?;
        let final_id = self.record(&key, CaptureStage::FinalCopy, final_id).await;
        Ok(StageResult::Completed(BranchUpdate::FinalCopyStarted(final_id)))
    }

    pub(super) async fn confirm_final_copy(&self, branch: &BranchContext) -> StageAttempt {
        let final_id = branch.final_snapshot()?;
        Ok(self
            .snapshot_status(&self.security_session(), final_id)
            .await?
            .map(|()| BranchUpdate::FinalCopyConfirmed))
    }

    /// Maps the described state of one snapshot onto a stage result.
    ///
    /// A snapshot that is not (yet) visible is pending, not failed.
    async fn snapshot_status(
        &self,
        session: &Session,
        snapshot_id: &str,
    ) -> Result<StageResult<()>, CaptureError> {
        let found = self
            .providers
            .compute
            .describe_snapshots(session, &[snapshot_id.to_string()])
            .await?;

        let Some(info) = found.first() else {
            return Ok(StageResult::pending(format!("{snapshot_id} not visible yet")));
        };
        match info.state {
            SnapshotState::Completed => Ok(StageResult::Completed(())),
            SnapshotState::Pending => Ok(StageResult::pending(format!(
                "{snapshot_id} pending ({})",
                info.progress.as_deref().unwrap_or("0%")
            ))),
            SnapshotState::Error => Err(CaptureError::state(snapshot_id, info.state.as_str())),
        }
    }
}
