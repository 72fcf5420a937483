//! Task group running one branch per captured snapshot.

use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::task::{AbortHandle, JoinHandle};
use tracing::{error, info};

use super::{BranchOutcome, BranchRunner, BranchStatus};
use crate::context::BranchContext;
use crate::errors::CaptureError;
use crate::events::{event_types, Alert, AlertSink, EventSink};

/// Outcomes of branches that already finished, shared with the orchestrator.
pub type FinishedBranches = Arc<Mutex<Vec<BranchOutcome>>>;

/// A group of independent branch tasks.
///
/// A branch failure is published to the alert sink once, from inside the
/// branch task, and never cancels siblings. Only the incident's cancellation
/// token, shared through the [`BranchRunner`], stops running branches.
pub struct BranchTaskGroup {
    runner: Arc<BranchRunner>,
    alerts: Arc<dyn AlertSink>,
    events: Arc<dyn EventSink>,
    finished: FinishedBranches,
    handles: Vec<(BranchContext, JoinHandle<BranchOutcome>)>,
}

impl BranchTaskGroup {
    /// Creates an empty group.
    #[must_use]
    pub fn new(
        runner: Arc<BranchRunner>,
        alerts: Arc<dyn AlertSink>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            runner,
            alerts,
            events,
            finished: Arc::new(Mutex::new(Vec::new())),
            handles: Vec::new(),
        }
    }

    /// Handle to the outcomes of branches as they finish.
    #[must_use]
    pub fn finished(&self) -> FinishedBranches {
        self.finished.clone()
    }

    /// Number of spawned branches.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no branch was spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Handles that stop the spawned branch tasks without waiting for them.
    #[must_use]
    pub fn abort_handles(&self) -> Vec<AbortHandle> {
        self.handles
            .iter()
            .map(|(_, handle)| handle.abort_handle())
            .collect()
    }

    /// Spawns the branch for one captured snapshot.
    pub fn spawn(&mut self, branch: BranchContext) {
        let runner = self.runner.clone();
        let alerts = self.alerts.clone();
        let events = self.events.clone();
        let finished = self.finished.clone();
        let context = branch.clone();

        let handle = tokio::spawn(async move {
            let outcome = runner.run(branch).await;
            report(&outcome, alerts.as_ref(), events.as_ref()).await;
            finished.lock().push(outcome.clone());
            outcome
        });
        self.handles.push((context, handle));
    }

    /// Waits for every branch and returns one outcome per spawned branch, in
    /// spawn order.
    pub async fn wait(self) -> Vec<BranchOutcome> {
        let (contexts, handles): (Vec<_>, Vec<_>) = self.handles.into_iter().unzip();
        let results = join_all(handles).await;

        let mut outcomes = Vec::with_capacity(results.len());
        for (context, result) in contexts.into_iter().zip(results) {
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(join_error) => {
                    error!(
                        incident_id = context.incident_id(),
                        source_volume_id = %context.source_volume_id,
                        error = %join_error,
                        "Branch task died"
                    );
                    let outcome = BranchOutcome {
                        context,
                        status: BranchStatus::Failed {
                            stage: None,
                            error: CaptureError::Internal(format!(
                                "branch task join error: {join_error}"
                            )),
                        },
                    };
                    report(&outcome, self.alerts.as_ref(), self.events.as_ref()).await;
                    self.finished.lock().push(outcome.clone());
                    outcomes.push(outcome);
                }
            }
        }
        outcomes
    }
}

/// Emits the branch event and, for failures other than cancellation, one alert.
async fn report(outcome: &BranchOutcome, alerts: &dyn AlertSink, events: &dyn EventSink) {
    match &outcome.status {
        BranchStatus::Completed { manifest_key } => {
            info!(
                incident_id = outcome.context.incident_id(),
                source_volume_id = %outcome.context.source_volume_id,
                manifest_key = %manifest_key,
                "Branch completed"
            );
            events.try_emit(event_types::BRANCH_COMPLETED, Some(outcome.summary()));
        }
        BranchStatus::Failed { stage, error } => {
            events.try_emit(event_types::BRANCH_FAILED, Some(outcome.summary()));
            if matches!(error, CaptureError::Cancelled { .. }) {
                return;
            }
            alerts
                .publish(&Alert::branch_failure(&outcome.context, *stage, error))
                .await;
        }
    }
}

impl std::fmt::Debug for BranchTaskGroup {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchTaskGroup")
            .field("branches", &self.handles.len())
            .field("finished", &self.finished.lock().len())
            .finish_non_exhaustive()
    }
}
