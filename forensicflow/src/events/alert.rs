//! Operator alerts for failed branches and failed incidents.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::context::BranchContext;
use crate::core::CaptureStage;
use crate::errors::CaptureError;
use crate::provider::NotificationApi;
use crate::utils::now_millis;

/// One operator-facing failure report.
///
/// Branch alerts carry the whole branch context so an operator can resume
/// from the last created resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    /// Incident the failure belongs to.
    pub incident_id: String,
    /// Compromised instance.
    pub instance_id: String,
    /// Stage that failed, if the failure is tied to one.
    pub stage: Option<CaptureStage>,
    /// Stable error kind, see [`CaptureError::kind`].
    pub error_kind: String,
    /// Human-readable error.
    pub message: String,
    /// Branch state at the time of failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub branch: Option<BranchContext>,
    /// Millisecond timestamp.
    pub raised_at_ms: i64,
}

impl Alert {
    /// Alert for a branch that stopped at `stage`, or died outside any stage.
    #[must_use]
    pub fn branch_failure(
        branch: &BranchContext,
        stage: Option<CaptureStage>,
        error: &CaptureError,
    ) -> Self {
        Self {
            incident_id: branch.incident_id().to_string(),
            instance_id: branch.instance_id.clone(),
            stage,
            error_kind: error.kind().to_string(),
            message: error.to_string(),
            branch: Some(branch.clone()),
            raised_at_ms: now_millis(),
        }
    }

    /// Alert for a failure of the incident as a whole.
    #[must_use]
    pub fn incident_failure(
        incident_id: &str,
        instance_id: &str,
        stage: Option<CaptureStage>,
        error: &CaptureError,
    ) -> Self {
        Self {
            incident_id: incident_id.to_string(),
            instance_id: instance_id.to_string(),
            stage,
            error_kind: error.kind().to_string(),
            message: error.to_string(),
            branch: None,
            raised_at_ms: now_millis(),
        }
    }

    /// Subject line for notification topics.
    #[must_use]
    pub fn subject(&self) -> String {
        match (&self.branch, self.stage) {
            (Some(branch), Some(stage)) => format!(
                "Forensic capture failed: {} {} at {stage}",
                self.incident_id, branch.source_volume_id
            ),
            (Some(branch), None) => format!(
                "Forensic capture failed: {} {}",
                self.incident_id, branch.source_volume_id
            ),
            (None, _) => format!("Forensic capture failed: {}", self.incident_id),
        }
    }
}

/// Receives operator alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    /// Publishes one alert. Delivery failures are logged, never returned.
    async fn publish(&self, alert: &Alert);
}

/// Logs alerts at error level.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingAlertSink;

#[async_trait]
impl AlertSink for LoggingAlertSink {
    async fn publish(&self, alert: &Alert) {
        error!(
            incident_id = %alert.incident_id,
            instance_id = %alert.instance_id,
            stage = ?alert.stage,
            error_kind = %alert.error_kind,
            source_volume_id = ?alert.branch.as_ref().map(|b| b.source_volume_id.as_str()),
            "{}",
            alert.message
        );
    }
}

/// Keeps alerts in memory.
#[derive(Debug, Default)]
pub struct CollectingAlertSink {
    alerts: RwLock<Vec<Alert>>,
}

impl CollectingAlertSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Alerts in publication order.
    #[must_use]
    pub fn alerts(&self) -> Vec<Alert> {
        self.alerts.read().clone()
    }

    /// Number of alerts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.alerts.read().len()
    }

    /// Returns true if nothing was published.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.alerts.read().is_empty()
    }
}

#[async_trait]
impl AlertSink for CollectingAlertSink {
    async fn publish(&self, alert: &Alert) {
        self.alerts.write().push(alert.clone());
    }
}

/// Publishes alerts as JSON to a notification topic.
#[derive(Clone)]
pub struct TopicAlertSink {
    notifications: Arc<dyn NotificationApi>,
    topic: String,
}

impl TopicAlertSink {
    /// Creates a sink publishing to `topic`.
    #[must_use]
    pub fn new(notifications: Arc<dyn NotificationApi>, topic: impl Into<String>) -> Self {
        Self {
            notifications,
            topic: topic.into(),
        }
    }
}

impl std::fmt::Debug for TopicAlertSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicAlertSink")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AlertSink for TopicAlertSink {
    async fn publish(&self, alert: &Alert) {
        let body = match serde_json::to_string(alert) {
            Ok(body) => body,
            Err(e) => {
                warn!(incident_id = %alert.incident_id, error = %e, "Alert not serializable");
                return;
            }
        };
        if let Err(e) = self
            .notifications
            .publish(&self.topic, &alert.subject(), &body)
            .await
        {
            warn!(
                incident_id = %alert.incident_id,
                topic = %self.topic,
                error = %e,
                "Alert delivery failed"
            );
            LoggingAlertSink.publish(alert).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryCloud;
    use crate::testing::TestHarness;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_branch_alert_carries_context() {
        let harness = TestHarness::new(InMemoryCloud::new());
        let branch = harness.branch("vol-001");
        let error = CaptureError::state("snap-001", "error");

        let alert = Alert::branch_failure(&branch, Some(CaptureStage::ConfirmCopy), &error);
        assert_eq!(alert.error_kind, "state_error");
        assert_eq!(alert.instance_id, "i-001");
        assert_eq!(alert.branch.as_ref().unwrap().source_snapshot_id, "snap-001");
        assert!(alert.subject().contains("vol-001"));
    }

    #[tokio::test]
    async fn test_topic_sink_publishes_json() {
        let cloud = Arc::new(InMemoryCloud::new());
        let sink = TopicAlertSink::new(cloud.clone(), "DiskForensicsErrorTopic");
        let alert = Alert::incident_failure(
            "inc-42",
            "i-001",
            None,
            &CaptureError::Timeout { timeout_seconds: 1200 },
        );

        sink.publish(&alert).await;

        let published = cloud.notifications();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].topic, "DiskForensicsErrorTopic");
        let decoded: Alert = serde_json::from_str(&published[0].message).unwrap();
        assert_eq!(decoded, alert);
    }

    #[tokio::test]
    async fn test_topic_sink_swallows_delivery_errors() {
        let cloud = Arc::new(InMemoryCloud::new().with_failing_operation("publish"));
        let sink = TopicAlertSink::new(cloud.clone(), "DiskForensicsErrorTopic");
        let alert = Alert::incident_failure("inc-42", "i-001", None, &CaptureError::transient("x"));

        sink.publish(&alert).await;
        assert!(cloud.notifications().is_empty());
    }
}
