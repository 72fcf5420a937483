//! Collection instance launch and readiness.

use tracing::info;

use super::{branch_tags, StageAttempt, StageHandlers};
use crate::context::{BranchContext, BranchUpdate};
use crate::core::{CaptureStage, StageResult};
use crate::provider::RunInstanceRequest;

impl StageHandlers {
    pub(super) async fn launch_instance(&self, branch: &BranchContext) -> StageAttempt {
        let (key, existing) = self.recorded(branch, CaptureStage::LaunchInstance).await;
        if let Some(instance_id) = existing {
            return Ok(StageResult::Completed(BranchUpdate::InstanceLaunched(instance_id)));
        }

        let collection = &self.config.collection;
        let mut tags = branch_tags(branch);
        tags.insert(
            "Name".to_string(),
            format!("forensic-{}-{}", branch.incident_id(), branch.source_volume_id),
        );
        let request = RunInstanceRequest {
            image_id: collection.image_id.clone(),
            instance_type: collection.instance_type.clone(),
            instance_profile: collection.instance_profile.clone(),
            security_group_id: collection.security_group_id.clone(),
            subnet_id: collection.subnet_id.clone(),
            availability_zone: branch.zone()?.to_string(),
            tags,
            client_token: key.clone(),
        };
        let instance_id = self
            .providers
            .compute
            .run_instance(&self.security_session(), &request)
            .await?;
        let instance_id = self
            .record(&key, CaptureStage::LaunchInstance, instance_id)
            .await;

        info!(
            incident_id = branch.incident_id(),
            source_volume_id = %branch.source_volume_id,
            collection_instance_id = %instance_id,
            "Collection instance launched"
        );
        Ok(StageResult::Completed(BranchUpdate::InstanceLaunched(instance_id)))
    }

    pub(super) async fn await_readiness(&self, branch: &BranchContext) -> StageAttempt {
        let instance_id = branch.collection_instance()?;
        let readiness = self.readiness.check(instance_id).await?;
        Ok(readiness
            .into_stage_result(instance_id)
            .map(|()| BranchUpdate::Ready))
    }
}
