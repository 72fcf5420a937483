//! Readiness signal of collection instances.
//!
//! The evidence agent on each collection instance writes to a log stream
//! named after the instance id. The instance is ready once that stream
//! contains an event whose message is exactly [`READY_MARKER`].

use std::sync::Arc;
use tracing::debug;

use crate::core::StageResult;
use crate::errors::{CaptureError, ProviderError};
use crate::provider::{LogApi, LogEvent};
use crate::utils::now_millis;

/// Message the evidence agent writes once it can process an attached volume.
pub const READY_MARKER: &str = "incron is running";

/// What the readiness stream of an instance shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    /// The marker is present.
    Ready,
    /// The stream exists but holds no marker yet.
    NotReady {
        /// The most recent message, if any.
        observed: Option<String>,
    },
    /// The agent has not created its stream yet.
    StreamMissing,
}

impl Readiness {
    /// Converts to a stage result; anything but `Ready` is pending.
    #[must_use]
    pub fn into_stage_result(self, instance_id: &str) -> StageResult<()> {
        match self {
            Self::Ready => StageResult::Completed(()),
            Self::NotReady { observed } => StageResult::pending(format!(
                "{instance_id} not ready (last message: {})",
                observed.as_deref().unwrap_or("none")
            )),
            Self::StreamMissing => {
                StageResult::pending(format!("{instance_id} has no readiness stream yet"))
            }
        }
    }
}

/// Reads and writes per-instance readiness streams in one log group.
#[derive(Clone)]
pub struct ReadinessSignalStore {
    logs: Arc<dyn LogApi>,
    log_group: String,
}

impl ReadinessSignalStore {
    /// Creates a store over a log group.
    #[must_use]
    pub fn new(logs: Arc<dyn LogApi>, log_group: impl Into<String>) -> Self {
        Self {
            logs,
            log_group: log_group.into(),
        }
    }

    /// The log group this store reads.
    #[must_use]
    pub fn log_group(&self) -> &str {
        &self.log_group
    }

    /// Reads the readiness stream of an instance.
    pub async fn check(&self, instance_id: &str) -> Result<Readiness, CaptureError> {
        let events = match self
            .logs
            .get_log_events(&self.log_group, instance_id, true)
            .await
        {
            Ok(events) => events,
            Err(ProviderError::NotFound { .. }) => return Ok(Readiness::StreamMissing),
            Err(e) => return Err(e.into()),
        };

        if events.iter().any(|e| e.message == READY_MARKER) {
            debug!(instance_id, "Collection instance ready");
            return Ok(Readiness::Ready);
        }
        Ok(Readiness::NotReady {
            observed: events.last().map(|e| e.message.clone()),
        })
    }

    /// Appends a message to an instance's readiness stream, creating it if needed.
    pub async fn record(&self, instance_id: &str, message: &str) -> Result<(), CaptureError> {
        match self.logs.create_log_stream(&self.log_group, instance_id).await {
            Ok(()) | Err(ProviderError::AlreadyExists { .. }) => {}
            Err(e) => return Err(e.into()),
        }
        self.logs
            .put_log_events(
                &self.log_group,
                instance_id,
                vec![LogEvent::new(now_millis(), message)],
            )
            .await?;
        Ok(())
    }
}

impl std::fmt::Debug for ReadinessSignalStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessSignalStore")
            .field("log_group", &self.log_group)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryCloud;

    fn store() -> (Arc<InMemoryCloud>, ReadinessSignalStore) {
        let cloud = Arc::new(InMemoryCloud::new());
        let store = ReadinessSignalStore::new(cloud.clone(), "ForensicDiskReadiness");
        (cloud, store)
    }

    #[tokio::test]
    async fn test_missing_stream_is_pending() {
        let (_, store) = store();
        let readiness = store.check("i-002").await.unwrap();
        assert_eq!(readiness, Readiness::StreamMissing);
        assert!(readiness.into_stage_result("i-002").is_pending());
    }

    #[tokio::test]
    async fn test_booting_is_not_ready() {
        let (_, store) = store();
        store.record("i-002", "booting").await.unwrap();
        assert_eq!(
            store.check("i-002").await.unwrap(),
            Readiness::NotReady {
                observed: Some("booting".to_string())
            }
        );
    }

    #[tokio::test]
    async fn test_marker_after_other_messages_is_ready() {
        let (_, store) = store();
        store.record("i-002", "booting").await.unwrap();
        store.record("i-002", READY_MARKER).await.unwrap();
        store.record("i-002", "processing /dev/sdf").await.unwrap();
        assert_eq!(store.check("i-002").await.unwrap(), Readiness::Ready);
    }

    #[tokio::test]
    async fn test_marker_must_match_exactly() {
        let (cloud, store) = store();
        cloud.emit_log("ForensicDiskReadiness", "i-003", "incron is running?");
        assert!(matches!(
            store.check("i-003").await.unwrap(),
            Readiness::NotReady { .. }
        ));
    }

    #[tokio::test]
    async fn test_other_provider_errors_propagate() {
        let cloud = Arc::new(InMemoryCloud::new().with_failing_operation("get_log_events"));
        let store = ReadinessSignalStore::new(cloud, "ForensicDiskReadiness");
        assert_eq!(
            store.check("i-001").await.unwrap_err().kind(),
            "provider_error"
        );
    }
}
