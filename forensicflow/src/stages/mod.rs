//! Stage handlers of the capture workflow.
//!
//! Every handler performs one externally visible action and reports a
//! [`StageResult`]. Handlers never retry; the poll executor in
//! [`crate::pipeline`] decides whether a `Pending` or failed attempt is
//! tried again. Resource-creating handlers consult the idempotency ledger
//! first and pass the ledger key to the collaborator as a client token, so a
//! replayed stage collapses onto the resource the first run created.

mod evidence;
mod instance;
mod snapshot;
mod volume;

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::sync::Arc;

use crate::config::CaptureConfig;
use crate::context::{BranchContext, BranchUpdate};
use crate::core::{CaptureStage, StageResult};
use crate::errors::CaptureError;
use crate::pipeline::{idempotency_key, LedgerEntry, StageLedger};
use crate::provider::{CloudProviders, Session, INCIDENT_TAG, SOURCE_INSTANCE_TAG, SOURCE_VOLUME_TAG};
use crate::readiness::ReadinessSignalStore;

/// Outcome of one handler attempt before errors are folded into the result.
pub(crate) type StageAttempt = Result<StageResult<BranchUpdate>, CaptureError>;

/// Executes one branch stage against a branch context.
#[async_trait]
pub trait StageExecutor: Send + Sync + Debug {
    /// Runs a single attempt of `stage`.
    async fn execute(&self, stage: CaptureStage, branch: &BranchContext) -> StageResult<BranchUpdate>;
}

/// The production stage handlers.
#[derive(Clone)]
pub struct StageHandlers {
    config: Arc<CaptureConfig>,
    providers: CloudProviders,
    ledger: Arc<dyn StageLedger>,
    readiness: ReadinessSignalStore,
}

impl StageHandlers {
    /// Creates the handlers.
    #[must_use]
    pub fn new(
        config: Arc<CaptureConfig>,
        providers: CloudProviders,
        ledger: Arc<dyn StageLedger>,
    ) -> Self {
        let readiness =
            ReadinessSignalStore::new(providers.logs.clone(), config.readiness_log_group.clone());
        Self {
            config,
            providers,
            ledger,
            readiness,
        }
    }

    /// The configuration the handlers run with.
    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Assumes the member role in a source account.
    async fn member_session(
        &self,
        account_id: &str,
        instance_id: &str,
        purpose: &str,
    ) -> Result<Session, CaptureError> {
        let role_arn = self.config.member_role_arn(account_id);
        let session_name = format!("{instance_id}-{purpose}");
        self.providers
            .credentials
            .assume_role(&role_arn, &session_name, &self.config.region)
            .await
            .map_err(Into::into)
    }

    /// Session acting as the security account itself.
    fn security_session(&self) -> Session {
        Session::local(&self.config.security_account_id, &self.config.region)
    }

    /// Returns the ledger key of a branch stage and the resource it already produced.
    async fn recorded(&self, branch: &BranchContext, stage: CaptureStage) -> (String, Option<String>) {
        let key = idempotency_key(branch.incident_id(), &branch.source_snapshot_id, stage);
        let existing = self.ledger.get(&key).await.map(|e| e.resource_id);
        (key, existing)
    }

    /// Records a produced resource; the first recorded resource wins.
    async fn record(&self, key: &str, stage: CaptureStage, resource_id: String) -> String {
        self.ledger
            .record(key, LedgerEntry::new(stage, resource_id))
            .await
            .resource_id
    }
}

impl Debug for StageHandlers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StageHandlers")
            .field("region", &self.config.region)
            .field("security_account_id", &self.config.security_account_id)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl StageExecutor for StageHandlers {
    async fn execute(&self, stage: CaptureStage, branch: &BranchContext) -> StageResult<BranchUpdate> {
        let attempt = match stage {
            CaptureStage::CopySnapshot => self.copy_snapshot(branch).await,
            CaptureStage::ConfirmCopy => self.confirm_copy(branch).await,
            CaptureStage::ShareSnapshot => self.share_snapshot(branch).await,
            CaptureStage::FinalCopy => self.final_copy(branch).await,
            CaptureStage::ConfirmFinalCopy => self.confirm_final_copy(branch).await,
            CaptureStage::CreateVolume => self.create_volume(branch).await,
            CaptureStage::LaunchInstance => self.launch_instance(branch).await,
            CaptureStage::AwaitReadiness => self.await_readiness(branch).await,
            CaptureStage::MountVolume => self.mount_volume(branch).await,
            CaptureStage::RecordAudit => self.record_audit(branch).await,
            CaptureStage::CreateSnapshots | CaptureStage::ConfirmSnapshots => Err(
                CaptureError::Internal(format!("{stage} is not a branch stage")),
            ),
        };
        StageResult::flatten(attempt)
    }
}

/// Tags attached to every resource a branch creates.
fn branch_tags(branch: &BranchContext) -> BTreeMap<String, String> {
    BTreeMap::from([
        (INCIDENT_TAG.to_string(), branch.incident_id().to_string()),
        (SOURCE_INSTANCE_TAG.to_string(), branch.instance_id.clone()),
        (SOURCE_VOLUME_TAG.to_string(), branch.source_volume_id.clone()),
    ])
}
