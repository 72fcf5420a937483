//! Evidence volume creation.

use tracing::info;

use super::{branch_tags, StageAttempt, StageHandlers};
use crate::context::{BranchContext, BranchUpdate};
use crate::core::{CaptureStage, StageResult};
use crate::errors::CaptureError;
use crate::provider::CreateVolumeRequest;

impl StageHandlers {
    /// Availability zone evidence volumes and collection instances are placed in.
    pub(super) fn placement_zone(&self) -> Result<&str, CaptureError> {
        self.config
            .supported_azs
            .first()
            .map(String::as_str)
            .ok_or_else(|| {
                CaptureError::configuration("supported_azs", "no availability zone configured")
            })
    }

    pub(super) async fn create_volume(&self, branch: &BranchContext) -> StageAttempt {
        let availability_zone = self.placement_zone()?.to_string();
        let (key, existing) = self.recorded(branch, CaptureStage::CreateVolume).await;
        if let Some(volume_id) = existing {
            return Ok(StageResult::Completed(BranchUpdate::VolumeCreated {
                volume_id,
                availability_zone,
            }));
        }

        let request = CreateVolumeRequest {
            snapshot_id: branch.final_snapshot()?.to_string(),
            availability_zone: availability_zone.clone(),
            kms_key_id: self.config.kms_key_arn.clone(),
            tags: branch_tags(branch),
            client_token: key.clone(),
        };
        let volume_id = self
            .providers
            .compute
            .create_volume(&self.security_session(), &request)
            .await?;
        let volume_id = self.record(&key, CaptureStage::CreateVolume, volume_id).await;

        info!(
            incident_id = branch.incident_id(),
            source_volume_id = %branch.source_volume_id,
            volume_id = %volume_id,
            availability_zone = %availability_zone,
            "Evidence volume created"
        );
        Ok(StageResult::Completed(BranchUpdate::VolumeCreated {
            volume_id,
            availability_zone,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryCloud;
    use crate::testing::TestHarness;

    #[tokio::test]
    async fn test_volume_requires_final_snapshot() {
        let harness = TestHarness::new(InMemoryCloud::new());
        let branch = harness.branch("vol-001");
        let err = harness.handlers().create_volume(&branch).await.unwrap_err();
        assert_eq!(err.kind(), "internal_error");
    }

    #[tokio::test]
    async fn test_volume_is_placed_in_first_zone() {
        let harness = TestHarness::new(InMemoryCloud::new());
        let branch = harness.branch_ready_for_volume("i-001", "vol-001").await;

        match harness.handlers().create_volume(&branch).await.unwrap() {
            StageResult::Completed(BranchUpdate::VolumeCreated {
                availability_zone, ..
            }) => assert_eq!(availability_zone, "us-east-1a"),
            other => panic!("unexpected result: {}", other.label()),
        }
    }

    #[tokio::test]
    async fn test_volume_replay_creates_one_volume() {
        let harness = TestHarness::new(InMemoryCloud::new());
        let branch = harness.branch_ready_for_volume("i-001", "vol-001").await;
        let handlers = harness.handlers();

        let first = handlers.create_volume(&branch).await.unwrap();
        let second = handlers.create_volume(&branch).await.unwrap();
        match (first, second) {
            (StageResult::Completed(a), StageResult::Completed(b)) => assert_eq!(a, b),
            _ => panic!("volume not created"),
        }
        assert_eq!(harness.cloud.calls("create_volume"), 1);
    }
}
