//! Incident-level orchestration.
//!
//! The orchestrator runs the two pre-fan-out stages once per incident, fans
//! out one branch per captured snapshot and owns the global timeout. A
//! failure before fan-out fails the incident; a branch failure does not.


use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tokio::task::AbortHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::config::CaptureConfig;
use crate::context::{BranchContext, CapturedSnapshot, IncidentContext, IncidentEvent};
use crate::core::{CaptureStage, StageResult, WorkflowState};
use crate::errors::CaptureError;
use crate::events::{
    event_types, Alert, AlertSink, EventSink, LoggingEventSink, TopicAlertSink,
};
use crate::fanout::{BranchOutcome, BranchRunner, BranchTaskGroup, FinishedBranches};
use crate::pipeline::{run_stage, InMemoryStageLedger, StageLedger};
use crate::provider::CloudProviders;
use crate::stages::{StageExecutor, StageHandlers};

/// Terminal summary of one incident run.
#[derive(Debug, Clone)]
pub struct IncidentReport {
    /// Id of this run.
    pub run_id: Uuid,
    /// Incident id from the trigger.
    pub incident_id: String,
    /// Compromised instance from the trigger.
    pub instance_id: String,
    /// Terminal workflow state.
    pub state: WorkflowState,
    /// Snapshots taken of the instance.
    pub captured_snapshots: Vec<CapturedSnapshot>,
    /// Outcomes of the branches that finished, in fan-out order when all did.
    pub branches: Vec<BranchOutcome>,
    /// Source volumes whose branch had not finished when the run ended.
    pub unfinished: Vec<String>,
    /// Why the incident failed.
    pub failure: Option<CaptureError>,
}

impl IncidentReport {
    /// Returns true if the incident completed; individual branches may still have failed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        self.state == WorkflowState::Completed
    }

    /// Branches that completed.
    pub fn completed_branches(&self) -> impl Iterator<Item = &BranchOutcome> {
        self.branches.iter().filter(|b| b.is_completed())
    }

    /// Branches that failed.
    pub fn failed_branches(&self) -> impl Iterator<Item = &BranchOutcome> {
        self.branches.iter().filter(|b| !b.is_completed())
    }

    /// JSON summary suitable for logs and notifications.
    #[must_use]
    pub fn summary(&self) -> serde_json::Value {
        json!({
            "run_id": self.run_id.to_string(),
            "incident_id": self.incident_id,
            "instance_id": self.instance_id,
            "state": self.state,
            "captured_snapshots": self.captured_snapshots,
            "branches": self.branches.iter().map(BranchOutcome::summary).collect::<Vec<_>>(),
            "unfinished": self.unfinished,
            "failure": self.failure.as_ref().map(CaptureError::to_dict),
        })
    }
}

/// Progress of a run, readable after the global timeout drops the run future.
#[derive(Debug, Default)]
struct RunProgress {
    state: WorkflowState,
    captured_snapshots: Vec<CapturedSnapshot>,
    planned: Vec<BranchContext>,
    finished: Option<FinishedBranches>,
    running: Vec<AbortHandle>,
}

/// A pre-fan-out failure and the stage it happened in.
type StageFailure = (CaptureStage, CaptureError);

/// Runs the capture workflow for incidents.
pub struct Orchestrator {
    config: Arc<CaptureConfig>,
    providers: CloudProviders,
    ledger: Arc<dyn StageLedger>,
    executor: Option<Arc<dyn StageExecutor>>,
    events: Arc<dyn EventSink>,
    alerts: Arc<dyn AlertSink>,
}

impl Orchestrator {
    /// Creates an orchestrator that alerts to the configured topic.
    #[must_use]
    pub fn new(config: CaptureConfig, providers: CloudProviders) -> Self {
        let alerts = Arc::new(TopicAlertSink::new(
            providers.notifications.clone(),
            config.alert_topic.clone(),
        ));
        Self {
            config: Arc::new(config),
            providers,
            ledger: Arc::new(InMemoryStageLedger::new()),
            executor: None,
            events: Arc::new(LoggingEventSink::debug()),
            alerts,
        }
    }

    /// Sets the lifecycle event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// Sets the alert sink.
    #[must_use]
    pub fn with_alert_sink(mut self, alerts: Arc<dyn AlertSink>) -> Self {
        self.alerts = alerts;
        self
    }

    /// Sets the idempotency ledger.
    #[must_use]
    pub fn with_ledger(mut self, ledger: Arc<dyn StageLedger>) -> Self {
        self.ledger = ledger;
        self
    }

    /// Replaces the executor of branch stages.
    #[must_use]
    pub fn with_executor(mut self, executor: Arc<dyn StageExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// The configuration the orchestrator runs with.
    #[must_use]
    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    /// Runs the capture workflow for one incident to a terminal state.
    pub async fn run(&self, event: &IncidentEvent) -> IncidentReport {
        let run_id = Uuid::new_v4();
        info!(
            run_id = %run_id,
            incident_id = %event.incident_id,
            instance_id = %event.instance_id,
            severity = event.severity,
            "Starting forensic capture"
        );
        self.events.try_emit(
            event_types::INCIDENT_STARTED,
            Some(json!({
                "run_id": run_id.to_string(),
                "incident_id": event.incident_id,
                "instance_id": event.instance_id,
            })),
        );

        let mut report = IncidentReport {
            run_id,
            incident_id: event.incident_id.clone(),
            instance_id: event.instance_id.clone(),
            state: WorkflowState::CreatingSnapshots,
            captured_snapshots: Vec::new(),
            branches: Vec::new(),
            unfinished: Vec::new(),
            failure: None,
        };

        let incident = match self
            .config
            .validate()
            .and_then(|()| IncidentContext::from_event(event, &self.config))
        {
            Ok(incident) => incident,
            Err(e) => {
                error!(incident_id = %event.incident_id, error = %e, "Incident rejected");
                return self.fail(report, None, e).await;
            }
        };

        let progress = Mutex::new(RunProgress::default());
        let cancel = Arc::new(CancellationToken::new());
        let timeout = self.config.global_timeout();

        let outcome =
            tokio::time::timeout(timeout, self.drive(incident, &progress, cancel.clone())).await;

        let RunProgress {
            state,
            captured_snapshots,
            planned,
            finished,
            running,
        } = progress.into_inner();
        report.state = state;
        report.captured_snapshots = captured_snapshots;

        match outcome {
            Ok(Ok(branches)) => {
                report.branches = branches;
                self.transition(&mut report, WorkflowState::Completed);
                info!(
                    run_id = %run_id,
                    incident_id = %report.incident_id,
                    completed = report.completed_branches().count(),
                    failed = report.failed_branches().count(),
                    "Forensic capture finished"
                );
                self.events
                    .try_emit(event_types::INCIDENT_FINISHED, Some(report.summary()));
                report
            }
            Ok(Err((stage, e))) => {
                error!(
                    run_id = %run_id,
                    incident_id = %report.incident_id,
                    stage = %stage,
                    error = %e,
                    "Capture failed before fan-out"
                );
                self.fail(report, Some(stage), e).await
            }
            Err(_) => {
                cancel.cancel(format!("global timeout of {}s elapsed", timeout.as_secs()));
                for task in &running {
                    task.abort();
                }
                report.branches = finished.map(|f| f.lock().clone()).unwrap_or_default();
                report.unfinished = planned
                    .into_iter()
                    .map(|b| b.source_volume_id)
                    .filter(|v| {
                        !report
                            .branches
                            .iter()
                            .any(|b| &b.context.source_volume_id == v)
                    })
                    .collect();
                warn!(
                    run_id = %run_id,
                    incident_id = %report.incident_id,
                    unfinished = ?report.unfinished,
                    "Global timeout reached"
                );
                let error = CaptureError::Timeout {
                    timeout_seconds: timeout.as_secs(),
                };
                self.fail(report, None, error).await
            }
        }
    }

    /// Runs the pre-fan-out stages, then every branch.
    async fn drive(
        &self,
        mut incident: IncidentContext,
        progress: &Mutex<RunProgress>,
        cancel: Arc<CancellationToken>,
    ) -> Result<Vec<BranchOutcome>, StageFailure> {
        let handlers = StageHandlers::new(
            self.config.clone(),
            self.providers.clone(),
            self.ledger.clone(),
        );
        let handlers_ref = &handlers;

        let captured = {
            let incident_ref = &incident;
            run_stage(
                CaptureStage::CreateSnapshots,
                self.config.policy_for(CaptureStage::CreateSnapshots),
                &cancel,
                |_| async move {
                    StageResult::flatten(handlers_ref.create_snapshots(incident_ref).await)
                },
            )
            .await
            .map_err(|e| (CaptureStage::CreateSnapshots, e))?
        };
        incident.set_captured_snapshots(captured.clone());
        self.advance(progress, WorkflowState::ConfirmingSnapshots, &incident);
        progress.lock().captured_snapshots = captured;

        {
            let incident_ref = &incident;
            run_stage(
                CaptureStage::ConfirmSnapshots,
                self.config.policy_for(CaptureStage::ConfirmSnapshots),
                &cancel,
                |_| async move {
                    StageResult::flatten(handlers_ref.confirm_snapshots(incident_ref).await)
                },
            )
            .await
            .map_err(|e| (CaptureStage::ConfirmSnapshots, e))?;
        }
        self.advance(progress, WorkflowState::FanningOut, &incident);

        let executor: Arc<dyn StageExecutor> = match &self.executor {
            Some(executor) => executor.clone(),
            None => Arc::new(handlers.clone()),
        };
        let runner = BranchRunner::new(executor, self.config.clone(), self.events.clone(), cancel);
        let mut group = BranchTaskGroup::new(Arc::new(runner), self.alerts.clone(), self.events.clone());

        let branches = incident.branches();
        {
            let mut progress = progress.lock();
            progress.planned = branches.clone();
            progress.finished = Some(group.finished());
        }
        info!(
            incident_id = incident.incident_id(),
            branches = branches.len(),
            "Fanning out over captured snapshots"
        );
        for branch in branches {
            group.spawn(branch);
        }
        progress.lock().running = group.abort_handles();
        Ok(group.wait().await)
    }

    fn advance(&self, progress: &Mutex<RunProgress>, next: WorkflowState, incident: &IncidentContext) {
        let mut progress = progress.lock();
        if !progress.state.can_transition_to(next) {
            warn!(from = %progress.state, to = %next, "Unexpected workflow transition");
        }
        progress.state = next;
        self.events.try_emit(
            event_types::INCIDENT_STATE,
            Some(json!({ "incident_id": incident.incident_id(), "state": next })),
        );
    }

    fn transition(&self, report: &mut IncidentReport, next: WorkflowState) {
        if !report.state.can_transition_to(next) {
            warn!(from = %report.state, to = %next, "Unexpected workflow transition");
        }
        report.state = next;
    }

    async fn fail(
        &self,
        mut report: IncidentReport,
        stage: Option<CaptureStage>,
        error: CaptureError,
    ) -> IncidentReport {
        self.alerts
            .publish(&Alert::incident_failure(
                &report.incident_id,
                &report.instance_id,
                stage,
                &error,
            ))
            .await;
        self.transition(&mut report, WorkflowState::Failed);
        report.failure = Some(error);
        self.events
            .try_emit(event_types::INCIDENT_FINISHED, Some(report.summary()));
        report
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("region", &self.config.region)
            .field("global_timeout_seconds", &self.config.global_timeout_seconds)
            .field("providers", &self.providers)
            .finish_non_exhaustive()
    }
}
