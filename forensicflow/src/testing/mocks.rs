//! Scripted stage executor for branch and fan-out tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::Duration;

use crate::context::{BranchContext, BranchUpdate, EvidenceLocation};
use crate::core::{CaptureStage, StageResult};
use crate::errors::CaptureError;
use crate::stages::StageExecutor;

/// A stage executor that succeeds unless told otherwise for a volume.
///
/// Resource ids are derived from the source volume id so outcomes are easy
/// to assert on.
#[derive(Debug, Default)]
pub struct ScriptedExecutor {
    failures: HashMap<(String, CaptureStage), CaptureError>,
    pending: Vec<(String, CaptureStage)>,
    stalls: HashMap<(String, CaptureStage), Duration>,
    calls: Mutex<Vec<(String, CaptureStage)>>,
    completed: Mutex<Vec<(String, CaptureStage)>>,
}

impl ScriptedExecutor {
    /// An executor where every stage completes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails `stage` of the branch for `volume_id` with `error`.
    #[must_use]
    pub fn fail_at(mut self, volume_id: &str, stage: CaptureStage, error: CaptureError) -> Self {
        self.failures.insert((volume_id.to_string(), stage), error);
        self
    }

    /// Keeps `stage` of the branch for `volume_id` pending forever.
    #[must_use]
    pub fn pending_at(mut self, volume_id: &str, stage: CaptureStage) -> Self {
        self.pending.push((volume_id.to_string(), stage));
        self
    }

    /// Makes `stage` of the branch for `volume_id` take `duration` before it
    /// completes, ignoring cancellation like an in-flight cloud call.
    #[must_use]
    pub fn stall_at(mut self, volume_id: &str, stage: CaptureStage, duration: Duration) -> Self {
        self.stalls.insert((volume_id.to_string(), stage), duration);
        self
    }

    /// Number of times `stage` returned a completed update for a volume.
    #[must_use]
    pub fn completions(&self, volume_id: &str, stage: CaptureStage) -> usize {
        self.completed
            .lock()
            .iter()
            .filter(|(v, s)| v == volume_id && *s == stage)
            .count()
    }

    /// Distinct stages executed for a volume, in first-execution order.
    #[must_use]
    pub fn stages_for(&self, volume_id: &str) -> Vec<CaptureStage> {
        let mut stages = Vec::new();
        for (volume, stage) in self.calls.lock().iter() {
            if volume == volume_id && !stages.contains(stage) {
                stages.push(*stage);
            }
        }
        stages
    }

    /// Number of attempts of one stage for a volume.
    #[must_use]
    pub fn attempts(&self, volume_id: &str, stage: CaptureStage) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|(v, s)| v == volume_id && *s == stage)
            .count()
    }

    /// Total number of attempts across every branch.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    fn update_for(stage: CaptureStage, branch: &BranchContext) -> BranchUpdate {
        let suffix = branch
            .source_volume_id
            .strip_prefix("vol-")
            .unwrap_or(&branch.source_volume_id);
        match stage {
            CaptureStage::CopySnapshot => BranchUpdate::CopyStarted(format!("snap-copy{suffix}")),
            CaptureStage::ConfirmCopy => BranchUpdate::CopyConfirmed,
            CaptureStage::ShareSnapshot => BranchUpdate::Shared,
            CaptureStage::FinalCopy => BranchUpdate::FinalCopyStarted(format!("snap-final{suffix}")),
            CaptureStage::ConfirmFinalCopy => BranchUpdate::FinalCopyConfirmed,
            CaptureStage::CreateVolume => BranchUpdate::VolumeCreated {
                volume_id: format!("vol-forensic{suffix}"),
                availability_zone: "us-east-1a".to_string(),
            },
            CaptureStage::LaunchInstance => {
                BranchUpdate::InstanceLaunched(format!("i-collect{suffix}"))
            }
            CaptureStage::AwaitReadiness => BranchUpdate::Ready,
            CaptureStage::MountVolume => BranchUpdate::Mounted(EvidenceLocation {
                bucket: "forensic-evidence".to_string(),
                key: branch.manifest_key(),
            }),
            CaptureStage::RecordAudit
            | CaptureStage::CreateSnapshots
            | CaptureStage::ConfirmSnapshots => BranchUpdate::Audited,
        }
    }
}

#[async_trait]
impl StageExecutor for ScriptedExecutor {
    async fn execute(&self, stage: CaptureStage, branch: &BranchContext) -> StageResult<BranchUpdate> {
        let key = (branch.source_volume_id.clone(), stage);
        self.calls.lock().push(key.clone());

        if let Some(error) = self.failures.get(&key) {
            return StageResult::Failed(error.clone());
        }
        if self.pending.contains(&key) {
            return StageResult::pending(format!("{stage} scripted pending"));
        }
        if let Some(duration) = self.stalls.get(&key) {
            tokio::time::sleep(*duration).await;
        }
        self.completed.lock().push(key);
        StageResult::Completed(Self::update_for(stage, branch))
    }
}
