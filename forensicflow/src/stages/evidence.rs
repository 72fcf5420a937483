//! Volume attachment, manifest and audit stages.

use tracing::{info, warn};

use super::{StageAttempt, StageHandlers};
use crate::context::{AuditRecord, BranchContext, BranchUpdate, EvidenceLocation, EvidenceManifest};
use crate::core::StageResult;
use crate::errors::ProviderError;
use crate::readiness::Readiness;
use crate::utils::now_millis;

impl StageHandlers {
    /// Attaches the evidence volume and writes the branch manifest.
    ///
    /// The readiness marker is checked again right before attaching; without
    /// it the stage stays pending and nothing is attached.
    pub(super) async fn mount_volume(&self, branch: &BranchContext) -> StageAttempt {
        let instance_id = branch.collection_instance()?;
        let volume_id = branch.forensic_volume()?;

        let readiness = self.readiness.check(instance_id).await?;
        if readiness != Readiness::Ready {
            warn!(
                incident_id = branch.incident_id(),
                collection_instance_id = instance_id,
                "Refusing to attach before readiness marker"
            );
            return Ok(readiness
                .into_stage_result(instance_id)
                .map(|()| BranchUpdate::Ready));
        }

        self.providers
            .compute
            .attach_volume(
                &self.security_session(),
                volume_id,
                instance_id,
                &self.config.attach_device,
            )
            .await?;

        let manifest = EvidenceManifest::from_branch(branch)?;
        let location = EvidenceLocation {
            bucket: self.config.evidence_bucket.clone(),
            key: branch.manifest_key(),
        };
        self.providers
            .objects
            .put_object(&location.bucket, &location.key, manifest.to_json_bytes()?)
            .await?;

        info!(
            incident_id = branch.incident_id(),
            source_volume_id = %branch.source_volume_id,
            volume_id,
            collection_instance_id = instance_id,
            manifest_key = %location.key,
            "Evidence volume mounted"
        );
        Ok(StageResult::Completed(BranchUpdate::Mounted(location)))
    }

    /// Appends the completed branch to the incident's audit stream.
    pub(super) async fn record_audit(&self, branch: &BranchContext) -> StageAttempt {
        let group = &self.config.audit_log_group;
        let stream = branch.incident_id();

        match self.providers.logs.create_log_stream(group, stream).await {
            Ok(()) | Err(ProviderError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }

        let event = AuditRecord::new(now_millis(), branch.clone()).to_log_event()?;
        self.providers
            .logs
            .put_log_events(group, stream, vec![event])
            .await?;
        Ok(StageResult::Completed(BranchUpdate::Audited))
    }
}
