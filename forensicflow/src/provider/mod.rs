//! Seams to the external cloud services.
//!
//! The workflow never talks to a cloud SDK directly. Every side effect goes
//! through one of these traits so the orchestrator can be driven against
//! [`InMemoryCloud`] in tests and a real adapter in production.

mod memory;
mod types;

pub use memory::{InMemoryCloud, PublishedMessage, ReadinessMode};
pub use types::{
    CopySnapshotRequest, CreateVolumeRequest, LogEvent, RunInstanceRequest, Session,
    SnapshotInfo, SnapshotState, INCIDENT_TAG, SOURCE_INSTANCE_TAG, SOURCE_VOLUME_TAG,
};

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::errors::ProviderError;

/// Result alias for collaborator calls.
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Block storage and compute operations.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ComputeApi: Send + Sync {
    /// Snapshots every volume attached to an instance.
    async fn create_snapshots(
        &self,
        session: &Session,
        instance_id: &str,
        description: &str,
        tags: BTreeMap<String, String>,
    ) -> ProviderResult<Vec<SnapshotInfo>>;

    /// Describes snapshots by id.
    ///
    /// Snapshots unknown to the caller's account are omitted from the result.
    async fn describe_snapshots(
        &self,
        session: &Session,
        snapshot_ids: &[String],
    ) -> ProviderResult<Vec<SnapshotInfo>>;

    /// Copies a snapshot and returns the id of the copy.
    ///
    /// A repeated request with the same client token returns the same id.
    async fn copy_snapshot(
        &self,
        session: &Session,
        request: &CopySnapshotRequest,
    ) -> ProviderResult<String>;

    /// Grants another account permission to create volumes from a snapshot.
    async fn share_snapshot(
        &self,
        session: &Session,
        snapshot_id: &str,
        account_id: &str,
    ) -> ProviderResult<()>;

    /// Creates a volume and returns its id.
    async fn create_volume(
        &self,
        session: &Session,
        request: &CreateVolumeRequest,
    ) -> ProviderResult<String>;

    /// Launches an instance and returns its id.
    async fn run_instance(
        &self,
        session: &Session,
        request: &RunInstanceRequest,
    ) -> ProviderResult<String>;

    /// Attaches a volume to an instance.
    ///
    /// Attaching a volume to the instance it is already attached to succeeds.
    async fn attach_volume(
        &self,
        session: &Session,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> ProviderResult<()>;
}

/// Temporary credentials for member accounts.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CredentialsApi: Send + Sync {
    /// Assumes a role and returns a session scoped to its account.
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        region: &str,
    ) -> ProviderResult<Session>;
}

/// Append-only log streams.
#[async_trait]
pub trait LogApi: Send + Sync {
    /// Creates a stream; fails with `AlreadyExists` if it exists.
    async fn create_log_stream(&self, group: &str, stream: &str) -> ProviderResult<()>;

    /// Reads the events of a stream; fails with `NotFound` if it is missing.
    async fn get_log_events(
        &self,
        group: &str,
        stream: &str,
        start_from_head: bool,
    ) -> ProviderResult<Vec<LogEvent>>;

    /// Appends events to an existing stream.
    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: Vec<LogEvent>,
    ) -> ProviderResult<()>;
}

/// Object storage for evidence manifests.
#[async_trait]
pub trait ObjectStoreApi: Send + Sync {
    /// Writes an object, replacing any previous content.
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> ProviderResult<()>;

    /// Reads an object; fails with `NotFound` if it is missing.
    async fn get_object(&self, bucket: &str, key: &str) -> ProviderResult<Vec<u8>>;
}

/// Operator notifications.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Publishes a message to a topic.
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> ProviderResult<()>;
}

/// The full set of collaborators one orchestrator uses.
#[derive(Clone)]
pub struct CloudProviders {
    /// Compute and block storage.
    pub compute: Arc<dyn ComputeApi>,
    /// Role assumption.
    pub credentials: Arc<dyn CredentialsApi>,
    /// Log streams.
    pub logs: Arc<dyn LogApi>,
    /// Object storage.
    pub objects: Arc<dyn ObjectStoreApi>,
    /// Notifications.
    pub notifications: Arc<dyn NotificationApi>,
}

impl CloudProviders {
    /// Uses one in-memory cloud for every collaborator.
    #[must_use]
    pub fn in_memory(cloud: &Arc<InMemoryCloud>) -> Self {
        Self {
            compute: cloud.clone(),
            credentials: cloud.clone(),
            logs: cloud.clone(),
            objects: cloud.clone(),
            notifications: cloud.clone(),
        }
    }

    /// Replaces the compute collaborator.
    #[must_use]
    pub fn with_compute(mut self, compute: Arc<dyn ComputeApi>) -> Self {
        self.compute = compute;
        self
    }

    /// Replaces the credentials collaborator.
    #[must_use]
    pub fn with_credentials(mut self, credentials: Arc<dyn CredentialsApi>) -> Self {
        self.credentials = credentials;
        self
    }
}

impl std::fmt::Debug for CloudProviders {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudProviders").finish_non_exhaustive()
    }
}
