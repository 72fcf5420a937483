//! Sequential execution of one volume's branch.

use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cancellation::CancellationToken;
use crate::config::CaptureConfig;
use crate::context::BranchContext;
use crate::core::CaptureStage;
use crate::errors::CaptureError;
use crate::events::{event_types, EventSink};
use crate::pipeline::{run_stage, sleep_or_cancel};
use crate::stages::StageExecutor;

/// How a branch ended.
#[derive(Debug, Clone)]
pub enum BranchStatus {
    /// Every stage completed and the manifest was written.
    Completed {
        /// Object key of the evidence manifest.
        manifest_key: String,
    },
    /// The branch stopped.
    Failed {
        /// Stage that failed; `None` if the branch task itself died.
        stage: Option<CaptureStage>,
        /// The terminal error.
        error: CaptureError,
    },
}

/// Terminal result of one branch, with the context as it was when it ended.
#[derive(Debug, Clone)]
pub struct BranchOutcome {
    /// Branch state including every resource it created.
    pub context: BranchContext,
    /// How the branch ended.
    pub status: BranchStatus,
}

impl BranchOutcome {
    /// Returns true if the branch completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.status, BranchStatus::Completed { .. })
    }

    /// The terminal error of a failed branch.
    #[must_use]
    pub fn error(&self) -> Option<&CaptureError> {
        match &self.status {
            BranchStatus::Failed { error, .. } => Some(error),
            BranchStatus::Completed { .. } => None,
        }
    }

    /// Manifest key of a completed branch.
    #[must_use]
    pub fn manifest_key(&self) -> Option<&str> {
        match &self.status {
            BranchStatus::Completed { manifest_key } => Some(manifest_key),
            BranchStatus::Failed { .. } => None,
        }
    }

    /// JSON summary used by incident reports.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        match &self.status {
            BranchStatus::Completed { manifest_key } => json!({
                "source_volume_id": self.context.source_volume_id,
                "status": "completed",
                "manifest_key": manifest_key,
            }),
            BranchStatus::Failed { stage, error } => json!({
                "source_volume_id": self.context.source_volume_id,
                "status": "failed",
                "stage": stage,
                "error": error.to_dict(),
            }),
        }
    }

    fn failed(context: BranchContext, stage: Option<CaptureStage>, error: CaptureError) -> Self {
        Self {
            context,
            status: BranchStatus::Failed { stage, error },
        }
    }
}

/// Drives a branch through [`CaptureStage::BRANCH_SEQUENCE`].
///
/// Each stage runs under the poll policy configured for it. The settle delay
/// is waited once, right before the first readiness check.
pub struct BranchRunner {
    executor: Arc<dyn StageExecutor>,
    config: Arc<CaptureConfig>,
    events: Arc<dyn EventSink>,
    cancel: Arc<CancellationToken>,
}

impl BranchRunner {
    /// Creates a runner sharing the incident's cancellation token.
    #[must_use]
    pub fn new(
        executor: Arc<dyn StageExecutor>,
        config: Arc<CaptureConfig>,
        events: Arc<dyn EventSink>,
        cancel: Arc<CancellationToken>,
    ) -> Self {
        Self {
            executor,
            config,
            events,
            cancel,
        }
    }

    /// Runs every branch stage in order and returns the outcome.
    pub async fn run(&self, mut branch: BranchContext) -> BranchOutcome {
        for stage in CaptureStage::BRANCH_SEQUENCE {
            if self.cancel.is_cancelled() {
                let reason = self.cancel.reason().unwrap_or_else(|| "cancelled".into());
                return BranchOutcome::failed(branch, Some(stage), CaptureError::cancelled(reason));
            }

            if stage == CaptureStage::AwaitReadiness {
                debug!(
                    incident_id = branch.incident_id(),
                    source_volume_id = %branch.source_volume_id,
                    delay_seconds = self.config.settle_delay_seconds,
                    "Waiting for collection instance to settle"
                );
                if let Err(e) = sleep_or_cancel(self.config.settle_delay(), &self.cancel).await {
                    return BranchOutcome::failed(branch, Some(stage), e);
                }
            }

            self.events
                .try_emit(event_types::STAGE_STARTED, Some(self.stage_data(&branch, stage)));

            let executor = &self.executor;
            let context = &branch;
            let result = run_stage(stage, self.config.policy_for(stage), &self.cancel, |attempt| {
                debug!(
                    incident_id = context.incident_id(),
                    source_volume_id = %context.source_volume_id,
                    stage = %stage,
                    attempt,
                    "Executing stage"
                );
                executor.execute(stage, context)
            })
            .await;

            match result {
                Ok(update) => {
                    branch.apply(update);
                    info!(
                        incident_id = branch.incident_id(),
                        source_volume_id = %branch.source_volume_id,
                        stage = %stage,
                        "Stage completed"
                    );
                    self.events
                        .try_emit(event_types::STAGE_COMPLETED, Some(self.stage_data(&branch, stage)));
                }
                Err(error) => {
                    warn!(
                        incident_id = branch.incident_id(),
                        source_volume_id = %branch.source_volume_id,
                        stage = %stage,
                        error_kind = error.kind(),
                        error = %error,
                        "Stage failed"
                    );
                    let mut data = self.stage_data(&branch, stage);
                    data["error"] = json!(error.to_dict());
                    self.events.try_emit(event_types::STAGE_FAILED, Some(data));
                    return BranchOutcome::failed(branch, Some(stage), error);
                }
            }
        }

        match branch.evidence_location.as_ref().map(|l| l.key.clone()) {
            Some(manifest_key) => BranchOutcome {
                context: branch,
                status: BranchStatus::Completed { manifest_key },
            },
            None => BranchOutcome::failed(
                branch,
                None,
                CaptureError::Internal("branch finished without an evidence location".into()),
            ),
        }
    }

    fn stage_data(&self, branch: &BranchContext, stage: CaptureStage) -> serde_json::Value {
        json!({
            "incident_id": branch.incident_id(),
            "instance_id": branch.instance_id,
            "source_volume_id": branch.source_volume_id,
            "stage": stage,
        })
    }
}

impl std::fmt::Debug for BranchRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchRunner")
            .field("executor", &self.executor)
            .field("cancelled", &self.cancel.is_cancelled())
            .finish_non_exhaustive()
    }
}
