//! Test fixtures for capture workflow testing.

use std::sync::Arc;

use crate::config::{CaptureConfig, CollectionInstanceConfig};
use crate::context::{BranchContext, CapturedSnapshot, IncidentContext, IncidentEvent};
use crate::core::{CaptureStage, StageResult};
use crate::pipeline::InMemoryStageLedger;
use crate::provider::{CloudProviders, ComputeApi, InMemoryCloud};
use crate::stages::{StageExecutor, StageHandlers};

/// Security account used by every fixture.
pub const SECURITY_ACCOUNT: &str = "111122223333";
/// Member account the compromised instances live in.
pub const MEMBER_ACCOUNT: &str = "444455556666";
/// Region used by every fixture.
pub const REGION: &str = "us-east-1";
/// Incident id used by every fixture.
pub const INCIDENT_ID: &str = "inc-42";
/// Evidence bucket used by every fixture.
pub const EVIDENCE_BUCKET: &str = "forensic-evidence";

/// A valid configuration with default poll policies.
#[must_use]
pub fn sample_config() -> CaptureConfig {
    CaptureConfig::new(SECURITY_ACCOUNT, REGION)
        .with_supported_azs(["us-east-1a", "us-east-1b"])
        .with_evidence_bucket(EVIDENCE_BUCKET)
        .with_kms_key_arn(format!("arn:aws:kms:{REGION}:{SECURITY_ACCOUNT}:key/evidence"))
        .with_collection(CollectionInstanceConfig {
            image_id: "ami-0forensic".into(),
            security_group_id: "sg-0forensic".into(),
            ..CollectionInstanceConfig::default()
        })
}

/// A trigger naming `instance_id` in the member account.
#[must_use]
pub fn sample_event(instance_id: &str) -> IncidentEvent {
    IncidentEvent::new(MEMBER_ACCOUNT, INCIDENT_ID, instance_id, REGION).with_severity(8.0)
}

/// An in-memory cloud plus the configuration and ledger to drive it.
pub struct TestHarness {
    /// The fake cloud.
    pub cloud: Arc<InMemoryCloud>,
    /// The configuration handlers run with.
    pub config: CaptureConfig,
    /// The ledger shared by every handler set this harness creates.
    pub ledger: Arc<InMemoryStageLedger>,
}

impl TestHarness {
    /// Wraps a cloud with the sample configuration.
    #[must_use]
    pub fn new(cloud: InMemoryCloud) -> Self {
        Self::with_config(cloud, sample_config())
    }

    /// Wraps a cloud with a custom configuration.
    #[must_use]
    pub fn with_config(cloud: InMemoryCloud, config: CaptureConfig) -> Self {
        let cloud = cloud.with_readiness_log_group(config.readiness_log_group.clone());
        Self {
            cloud: Arc::new(cloud),
            config,
            ledger: Arc::new(InMemoryStageLedger::new()),
        }
    }

    /// Every collaborator backed by the fake cloud.
    #[must_use]
    pub fn providers(&self) -> CloudProviders {
        CloudProviders::in_memory(&self.cloud)
    }

    /// Stage handlers over the fake cloud.
    #[must_use]
    pub fn handlers(&self) -> StageHandlers {
        StageHandlers::new(
            Arc::new(self.config.clone()),
            self.providers(),
            self.ledger.clone(),
        )
    }

    /// Stage handlers with a replaced compute collaborator.
    #[must_use]
    pub fn handlers_with_compute(&self, compute: Arc<dyn ComputeApi>) -> StageHandlers {
        StageHandlers::new(
            Arc::new(self.config.clone()),
            self.providers().with_compute(compute),
            self.ledger.clone(),
        )
    }

    /// Registers a compromised instance and returns its incident context.
    #[must_use]
    pub fn incident(&self, instance_id: &str, volumes: &[&str]) -> IncidentContext {
        self.cloud
            .add_instance(MEMBER_ACCOUNT, instance_id, volumes.iter().copied());
        IncidentContext::from_event(&sample_event(instance_id), &self.config)
            .expect("sample event is valid")
    }

    /// A branch context for a volume of `i-001` whose snapshot is `snap-<suffix>`.
    ///
    /// Nothing is registered in the cloud.
    #[must_use]
    pub fn branch(&self, volume_id: &str) -> BranchContext {
        let incident = IncidentContext::from_event(&sample_event("i-001"), &self.config)
            .expect("sample event is valid");
        let snapshot_id = volume_id.replacen("vol-", "snap-", 1);
        incident.narrow(&CapturedSnapshot::new(snapshot_id, volume_id))
    }

    /// A branch whose source snapshot exists and has completed.
    pub async fn captured_branch(&self, instance_id: &str, volume_id: &str) -> BranchContext {
        let mut incident = self.incident(instance_id, &[volume_id]);
        let handlers = self.handlers();
        let captured = match handlers.create_snapshots(&incident).await {
            Ok(StageResult::Completed(captured)) => captured,
            _ => panic!("snapshot creation failed"),
        };
        incident.set_captured_snapshots(captured);
        for _ in 0..10 {
            if matches!(
                handlers.confirm_snapshots(&incident).await,
                Ok(StageResult::Completed(()))
            ) {
                return incident.branches().remove(0);
            }
        }
        panic!("snapshots never completed");
    }

    /// A branch advanced through the copy, share and final copy stages.
    pub async fn branch_ready_for_volume(&self, instance_id: &str, volume_id: &str) -> BranchContext {
        let mut branch = self.captured_branch(instance_id, volume_id).await;
        self.advance(
            &mut branch,
            &[
                CaptureStage::CopySnapshot,
                CaptureStage::ConfirmCopy,
                CaptureStage::ShareSnapshot,
                CaptureStage::FinalCopy,
                CaptureStage::ConfirmFinalCopy,
            ],
        )
        .await;
        branch
    }

    /// A branch advanced through volume creation and instance launch.
    pub async fn launched_branch(&self, instance_id: &str, volume_id: &str) -> BranchContext {
        let mut branch = self.branch_ready_for_volume(instance_id, volume_id).await;
        self.advance(
            &mut branch,
            &[CaptureStage::CreateVolume, CaptureStage::LaunchInstance],
        )
        .await;
        branch
    }

    /// Runs each stage until it completes, without poll delays.
    pub async fn advance(&self, branch: &mut BranchContext, stages: &[CaptureStage]) {
        let handlers = self.handlers();
        for stage in stages {
            let mut completed = false;
            for _ in 0..10 {
                match handlers.execute(*stage, branch).await {
                    StageResult::Completed(update) => {
                        branch.apply(update);
                        completed = true;
                        break;
                    }
                    StageResult::Pending(_) => {}
                    StageResult::Failed(e) => panic!("{stage} failed: {e}"),
                }
            }
            assert!(completed, "{stage} never completed");
        }
    }
}
