//! In-memory implementation of every cloud collaborator.
//!
//! Behaves like the real services closely enough to drive the whole
//! workflow: snapshots are scoped to accounts and only visible elsewhere once
//! shared, copies stay `pending` for a scripted number of polls, client
//! tokens deduplicate creates, and launched collection instances write to
//! their readiness stream according to a [`ReadinessMode`].

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::debug;

use super::{
    ComputeApi, CopySnapshotRequest, CreateVolumeRequest, CredentialsApi, LogApi, LogEvent,
    NotificationApi, ObjectStoreApi, ProviderResult, RunInstanceRequest, Session, SnapshotInfo,
    SnapshotState, SOURCE_VOLUME_TAG,
};
use crate::errors::ProviderError;
use crate::readiness::READY_MARKER;
use crate::utils::now_millis;

/// How the evidence agent on a launched collection instance behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReadinessMode {
    /// Writes the readiness marker as soon as the instance launches.
    #[default]
    Ready,
    /// Never creates its readiness stream.
    Silent,
    /// Writes `booting` and never becomes ready.
    Booting,
    /// Writes `booting`, then the marker once the stream was read this many times.
    ReadyAfterChecks(u32),
}

/// A notification recorded by [`InMemoryCloud::publish`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    /// Target topic.
    pub topic: String,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub message: String,
}

#[derive(Debug, Clone)]
struct SimSnapshot {
    info: SnapshotInfo,
    owner: String,
    shared_with: HashSet<String>,
    pending_polls: u32,
    fails: bool,
    tags: BTreeMap<String, String>,
}

#[derive(Debug, Clone)]
struct SimVolume {
    availability_zone: String,
    attachment: Option<(String, String)>,
}

#[derive(Debug, Clone)]
struct Agent {
    mode: ReadinessMode,
    reads: u32,
    marker_written: bool,
}

#[derive(Debug, Default)]
struct CloudState {
    source_instances: HashMap<(String, String), Vec<String>>,
    snapshots: HashMap<String, SimSnapshot>,
    volumes: HashMap<String, SimVolume>,
    instances: HashMap<String, RunInstanceRequest>,
    agents: HashMap<String, Agent>,
    client_tokens: HashMap<String, String>,
    copy_visibility_lag: HashMap<String, u32>,
    logs: HashMap<(String, String), Vec<LogEvent>>,
    objects: HashMap<(String, String), Vec<u8>>,
    notifications: Vec<PublishedMessage>,
    calls: HashMap<&'static str, u32>,
    sequence: u64,
}

impl CloudState {
    fn next_id(&mut self, prefix: &str) -> String {
        self.sequence += 1;
        format!("{prefix}-{:017x}", self.sequence)
    }

    fn count(&mut self, operation: &'static str) {
        *self.calls.entry(operation).or_insert(0) += 1;
    }

    fn visible_to(&self, snapshot_id: &str, account_id: &str) -> Option<&SimSnapshot> {
        self.snapshots
            .get(snapshot_id)
            .filter(|s| s.owner == account_id || s.shared_with.contains(account_id))
    }

    fn append_log(&mut self, group: &str, stream: &str, message: &str) {
        self.logs
            .entry((group.to_string(), stream.to_string()))
            .or_default()
            .push(LogEvent::new(now_millis(), message));
    }
}

/// A fake cloud that implements every provider trait.
#[derive(Debug)]
pub struct InMemoryCloud {
    state: Mutex<CloudState>,
    readiness_log_group: String,
    pending_polls: u32,
    cross_account_lag: u32,
    default_readiness: ReadinessMode,
    readiness_overrides: HashMap<String, ReadinessMode>,
    failing_volumes: HashSet<String>,
    failing_operations: HashSet<String>,
}

impl Default for InMemoryCloud {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCloud {
    /// Creates an empty cloud where everything completes on the first poll.
    #[must_use]
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CloudState::default()),
            readiness_log_group: "ForensicDiskReadiness".to_string(),
            pending_polls: 0,
            cross_account_lag: 0,
            default_readiness: ReadinessMode::Ready,
            readiness_overrides: HashMap::new(),
            failing_volumes: HashSet::new(),
            failing_operations: HashSet::new(),
        }
    }

    /// Sets the log group collection instances write their readiness to.
    #[must_use]
    pub fn with_readiness_log_group(mut self, group: impl Into<String>) -> Self {
        self.readiness_log_group = group.into();
        self
    }

    /// Number of `describe_snapshots` polls a new snapshot stays `pending` for.
    #[must_use]
    pub fn with_pending_polls(mut self, polls: u32) -> Self {
        self.pending_polls = polls;
        self
    }

    /// Number of cross-account copy attempts rejected as not yet visible.
    #[must_use]
    pub fn with_cross_account_lag(mut self, attempts: u32) -> Self {
        self.cross_account_lag = attempts;
        self
    }

    /// Readiness behavior of every collection instance.
    #[must_use]
    pub fn with_readiness(mut self, mode: ReadinessMode) -> Self {
        self.default_readiness = mode;
        self
    }

    /// Readiness behavior of the instance collecting one source volume.
    #[must_use]
    pub fn with_volume_readiness(mut self, volume_id: impl Into<String>, mode: ReadinessMode) -> Self {
        self.readiness_overrides.insert(volume_id.into(), mode);
        self
    }

    /// Makes every copy of snapshots taken from this volume end in `error`.
    #[must_use]
    pub fn with_failing_copies(mut self, volume_id: impl Into<String>) -> Self {
        self.failing_volumes.insert(volume_id.into());
        self
    }

    /// Makes every call of an operation fail with a service error.
    #[must_use]
    pub fn with_failing_operation(mut self, operation: impl Into<String>) -> Self {
        self.failing_operations.insert(operation.into());
        self
    }

    /// Registers a compromised instance and its attached volumes.
    pub fn add_instance<I, S>(&self, account_id: &str, instance_id: &str, volumes: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.state.lock().source_instances.insert(
            (account_id.to_string(), instance_id.to_string()),
            volumes.into_iter().map(Into::into).collect(),
        );
    }

    /// Appends a message to any log stream, creating it if needed.
    pub fn emit_log(&self, group: &str, stream: &str, message: &str) {
        self.state.lock().append_log(group, stream, message);
    }

    /// Events of a log stream, oldest first.
    #[must_use]
    pub fn log_events(&self, group: &str, stream: &str) -> Vec<LogEvent> {
        self.state
            .lock()
            .logs
            .get(&(group.to_string(), stream.to_string()))
            .cloned()
            .unwrap_or_default()
    }

    /// Content of a stored object.
    #[must_use]
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .objects
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Every published notification, in order.
    #[must_use]
    pub fn notifications(&self) -> Vec<PublishedMessage> {
        self.state.lock().notifications.clone()
    }

    /// How often an operation was called.
    #[must_use]
    pub fn calls(&self, operation: &str) -> u32 {
        self.state.lock().calls.get(operation).copied().unwrap_or(0)
    }

    /// Current state of a snapshot, regardless of account.
    #[must_use]
    pub fn snapshot_state(&self, snapshot_id: &str) -> Option<SnapshotState> {
        self.state
            .lock()
            .snapshots
            .get(snapshot_id)
            .map(|s| s.info.state)
    }

    /// Tags of a snapshot, regardless of account.
    #[must_use]
    pub fn snapshot_tags(&self, snapshot_id: &str) -> Option<BTreeMap<String, String>> {
        self.state
            .lock()
            .snapshots
            .get(snapshot_id)
            .map(|s| s.tags.clone())
    }

    /// Ids of every launched collection instance.
    #[must_use]
    pub fn launched_instances(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.state.lock().instances.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Instance and device a volume is attached to.
    #[must_use]
    pub fn attachment(&self, volume_id: &str) -> Option<(String, String)> {
        self.state
            .lock()
            .volumes
            .get(volume_id)
            .and_then(|v| v.attachment.clone())
    }

    fn check_failure(&self, operation: &str) -> ProviderResult<()> {
        if self.failing_operations.contains(operation) {
            return Err(ProviderError::service(operation, "injected failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl ComputeApi for InMemoryCloud {
    async fn create_snapshots(
        &self,
        session: &Session,
        instance_id: &str,
        _description: &str,
        tags: BTreeMap<String, String>,
    ) -> ProviderResult<Vec<SnapshotInfo>> {
        self.check_failure("create_snapshots")?;
        let mut state = self.state.lock();
        state.count("create_snapshots");

        let volumes = state
            .source_instances
            .get(&(session.account_id.clone(), instance_id.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::not_found(instance_id))?;

        let mut created = Vec::with_capacity(volumes.len());
        for volume_id in volumes {
            // first snapshot of vol-X is snap-X
            let preferred = volume_id.replacen("vol-", "snap-", 1);
            let snapshot_id = if state.snapshots.contains_key(&preferred) {
                state.next_id("snap")
            } else {
                preferred
            };
            let info = SnapshotInfo {
                snapshot_id: snapshot_id.clone(),
                volume_id,
                state: SnapshotState::Pending,
                progress: Some("0%".to_string()),
            };
            state.snapshots.insert(
                snapshot_id,
                SimSnapshot {
                    info: info.clone(),
                    owner: session.account_id.clone(),
                    shared_with: HashSet::new(),
                    pending_polls: self.pending_polls,
                    fails: false,
                    tags: tags.clone(),
                },
            );
            created.push(info);
        }
        Ok(created)
    }

    async fn describe_snapshots(
        &self,
        session: &Session,
        snapshot_ids: &[String],
    ) -> ProviderResult<Vec<SnapshotInfo>> {
        self.check_failure("describe_snapshots")?;
        let mut state = self.state.lock();
        state.count("describe_snapshots");

        let mut found = Vec::new();
        for id in snapshot_ids {
            if state.visible_to(id, &session.account_id).is_none() {
                continue;
            }
            if let Some(snapshot) = state.snapshots.get_mut(id) {
                if snapshot.info.state == SnapshotState::Pending {
                    if snapshot.fails {
                        snapshot.info.state = SnapshotState::Error;
                        snapshot.info.progress = None;
                    } else if snapshot.pending_polls == 0 {
                        snapshot.info.state = SnapshotState::Completed;
                        snapshot.info.progress = Some("100%".to_string());
                    } else {
                        snapshot.pending_polls -= 1;
                    }
                }
                found.push(snapshot.info.clone());
            }
        }
        Ok(found)
    }

    async fn copy_snapshot(
        &self,
        session: &Session,
        request: &CopySnapshotRequest,
    ) -> ProviderResult<String> {
        self.check_failure("copy_snapshot")?;
        let mut state = self.state.lock();
        state.count("copy_snapshot");

        if let Some(existing) = state.client_tokens.get(&request.client_token) {
            return Ok(existing.clone());
        }

        let source = state
            .snapshots
            .get(&request.source_snapshot_id)
            .cloned()
            .ok_or_else(|| ProviderError::not_found(&request.source_snapshot_id))?;

        if source.owner != session.account_id {
            if !source.shared_with.contains(&session.account_id) {
                return Err(ProviderError::not_visible(&request.source_snapshot_id));
            }
            let rejected = state
                .copy_visibility_lag
                .entry(request.client_token.clone())
                .or_insert(0);
            if *rejected < self.cross_account_lag {
                *rejected += 1;
                return Err(ProviderError::not_visible(&request.source_snapshot_id));
            }
        }
        if source.info.state != SnapshotState::Completed {
            return Err(ProviderError::service(
                "copy_snapshot",
                format!("{} is {}", request.source_snapshot_id, source.info.state.as_str()),
            ));
        }

        let copy_id = state.next_id("snap");
        let fails = self.failing_volumes.contains(&source.info.volume_id);
        state.snapshots.insert(
            copy_id.clone(),
            SimSnapshot {
                info: SnapshotInfo {
                    snapshot_id: copy_id.clone(),
                    volume_id: source.info.volume_id.clone(),
                    state: SnapshotState::Pending,
                    progress: Some("0%".to_string()),
                },
                owner: session.account_id.clone(),
                shared_with: HashSet::new(),
                pending_polls: self.pending_polls,
                fails,
                tags: request.tags.clone(),
            },
        );
        state
            .client_tokens
            .insert(request.client_token.clone(), copy_id.clone());
        debug!(source = %request.source_snapshot_id, copy = %copy_id, "Snapshot copy started");
        Ok(copy_id)
    }

    async fn share_snapshot(
        &self,
        session: &Session,
        snapshot_id: &str,
        account_id: &str,
    ) -> ProviderResult<()> {
        self.check_failure("share_snapshot")?;
        let mut state = self.state.lock();
        state.count("share_snapshot");

        match state.snapshots.get_mut(snapshot_id) {
            Some(snapshot) if snapshot.owner == session.account_id => {
                snapshot.shared_with.insert(account_id.to_string());
                Ok(())
            }
            _ => Err(ProviderError::not_found(snapshot_id)),
        }
    }

    async fn create_volume(
        &self,
        session: &Session,
        request: &CreateVolumeRequest,
    ) -> ProviderResult<String> {
        self.check_failure("create_volume")?;
        let mut state = self.state.lock();
        state.count("create_volume");

        if let Some(existing) = state.client_tokens.get(&request.client_token) {
            return Ok(existing.clone());
        }

        let snapshot_state = state
            .visible_to(&request.snapshot_id, &session.account_id)
            .map(|s| s.info.state)
            .ok_or_else(|| ProviderError::not_found(&request.snapshot_id))?;
        if snapshot_state != SnapshotState::Completed {
            return Err(ProviderError::service(
                "create_volume",
                format!("{} is {}", request.snapshot_id, snapshot_state.as_str()),
            ));
        }

        let volume_id = state.next_id("vol");
        state.volumes.insert(
            volume_id.clone(),
            SimVolume {
                availability_zone: request.availability_zone.clone(),
                attachment: None,
            },
        );
        state
            .client_tokens
            .insert(request.client_token.clone(), volume_id.clone());
        Ok(volume_id)
    }

    async fn run_instance(
        &self,
        _session: &Session,
        request: &RunInstanceRequest,
    ) -> ProviderResult<String> {
        self.check_failure("run_instance")?;
        let mut state = self.state.lock();
        state.count("run_instance");

        if let Some(existing) = state.client_tokens.get(&request.client_token) {
            return Ok(existing.clone());
        }

        let instance_id = state.next_id("i");
        let mode = request
            .tags
            .get(SOURCE_VOLUME_TAG)
            .and_then(|v| self.readiness_overrides.get(v))
            .copied()
            .unwrap_or(self.default_readiness);

        match mode {
            ReadinessMode::Ready => {
                state.append_log(&self.readiness_log_group, &instance_id, READY_MARKER);
            }
            ReadinessMode::Booting | ReadinessMode::ReadyAfterChecks(_) => {
                state.append_log(&self.readiness_log_group, &instance_id, "booting");
            }
            ReadinessMode::Silent => {}
        }
        state.agents.insert(
            instance_id.clone(),
            Agent {
                mode,
                reads: 0,
                marker_written: mode == ReadinessMode::Ready,
            },
        );
        state.instances.insert(instance_id.clone(), request.clone());
        state
            .client_tokens
            .insert(request.client_token.clone(), instance_id.clone());
        Ok(instance_id)
    }

    async fn attach_volume(
        &self,
        _session: &Session,
        volume_id: &str,
        instance_id: &str,
        device: &str,
    ) -> ProviderResult<()> {
        self.check_failure("attach_volume")?;
        let mut state = self.state.lock();
        state.count("attach_volume");

        let instance_az = state
            .instances
            .get(instance_id)
            .map(|i| i.availability_zone.clone())
            .ok_or_else(|| ProviderError::not_found(instance_id))?;
        let volume = state
            .volumes
            .get_mut(volume_id)
            .ok_or_else(|| ProviderError::not_found(volume_id))?;

        if volume.availability_zone != instance_az {
            return Err(ProviderError::service(
                "attach_volume",
                format!("{volume_id} is in {}", volume.availability_zone),
            ));
        }
        match &volume.attachment {
            Some((attached_to, _)) if attached_to == instance_id => Ok(()),
            Some((attached_to, _)) => Err(ProviderError::service(
                "attach_volume",
                format!("{volume_id} is in use by {attached_to}"),
            )),
            None => {
                volume.attachment = Some((instance_id.to_string(), device.to_string()));
                Ok(())
            }
        }
    }
}

#[async_trait]
impl CredentialsApi for InMemoryCloud {
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
        region: &str,
    ) -> ProviderResult<Session> {
        self.check_failure("assume_role")?;
        self.state.lock().count("assume_role");

        // arn:<partition>:iam::<account>:role/<name>
        let account_id = role_arn
            .split(':')
            .nth(4)
            .filter(|a| !a.is_empty())
            .ok_or_else(|| ProviderError::service("assume_role", format!("invalid role {role_arn}")))?;

        Ok(Session {
            account_id: account_id.to_string(),
            region: region.to_string(),
            role_arn: Some(role_arn.to_string()),
            session_name: session_name.to_string(),
        })
    }
}

#[async_trait]
impl LogApi for InMemoryCloud {
    async fn create_log_stream(&self, group: &str, stream: &str) -> ProviderResult<()> {
        self.check_failure("create_log_stream")?;
        let mut state = self.state.lock();
        state.count("create_log_stream");

        let key = (group.to_string(), stream.to_string());
        if state.logs.contains_key(&key) {
            return Err(ProviderError::already_exists(format!("{group}/{stream}")));
        }
        state.logs.insert(key, Vec::new());
        Ok(())
    }

    async fn get_log_events(
        &self,
        group: &str,
        stream: &str,
        start_from_head: bool,
    ) -> ProviderResult<Vec<LogEvent>> {
        self.check_failure("get_log_events")?;
        let mut state = self.state.lock();
        state.count("get_log_events");

        if group == self.readiness_log_group {
            let write_marker = state.agents.get_mut(stream).is_some_and(|agent| {
                agent.reads += 1;
                match agent.mode {
                    ReadinessMode::ReadyAfterChecks(n) if !agent.marker_written && agent.reads > n => {
                        agent.marker_written = true;
                        true
                    }
                    _ => false,
                }
            });
            if write_marker {
                state.append_log(group, stream, READY_MARKER);
            }
        }

        let mut events = state
            .logs
            .get(&(group.to_string(), stream.to_string()))
            .cloned()
            .ok_or_else(|| ProviderError::not_found(format!("{group}/{stream}")))?;
        if !start_from_head {
            events.reverse();
        }
        Ok(events)
    }

    async fn put_log_events(
        &self,
        group: &str,
        stream: &str,
        events: Vec<LogEvent>,
    ) -> ProviderResult<()> {
        self.check_failure("put_log_events")?;
        let mut state = self.state.lock();
        state.count("put_log_events");

        state
            .logs
            .get_mut(&(group.to_string(), stream.to_string()))
            .ok_or_else(|| ProviderError::not_found(format!("{group}/{stream}")))?
            .extend(events);
        Ok(())
    }
}

#[async_trait]
impl ObjectStoreApi for InMemoryCloud {
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> ProviderResult<()> {
        self.check_failure("put_object")?;
        let mut state = self.state.lock();
        state.count("put_object");
        state
            .objects
            .insert((bucket.to_string(), key.to_string()), body);
        Ok(())
    }

    async fn get_object(&self, bucket: &str, key: &str) -> ProviderResult<Vec<u8>> {
        self.object(bucket, key)
            .ok_or_else(|| ProviderError::not_found(format!("{bucket}/{key}")))
    }
}

#[async_trait]
impl NotificationApi for InMemoryCloud {
    async fn publish(&self, topic: &str, subject: &str, message: &str) -> ProviderResult<()> {
        self.check_failure("publish")?;
        let mut state = self.state.lock();
        state.count("publish");
        state.notifications.push(PublishedMessage {
            topic: topic.to_string(),
            subject: subject.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MEMBER: &str = "444455556666";
    const SECURITY: &str = "111122223333";

    fn member() -> Session {
        Session::local(MEMBER, "us-east-1")
    }

    fn security() -> Session {
        Session::local(SECURITY, "us-east-1")
    }

    fn copy_request(source: &str, token: &str) -> CopySnapshotRequest {
        CopySnapshotRequest {
            source_snapshot_id: source.to_string(),
            source_region: "us-east-1".to_string(),
            kms_key_id: "key".to_string(),
            description: "evidence".to_string(),
            tags: BTreeMap::new(),
            client_token: token.to_string(),
        }
    }

    #[tokio::test]
    async fn test_snapshot_lifecycle() {
        let cloud = InMemoryCloud::new().with_pending_polls(1);
        cloud.add_instance(MEMBER, "i-001", ["vol-001"]);

        let created = cloud
            .create_snapshots(&member(), "i-001", "capture", BTreeMap::new())
            .await
            .unwrap();
        assert_eq!(created[0].snapshot_id, "snap-001");

        let ids = vec!["snap-001".to_string()];
        let first = cloud.describe_snapshots(&member(), &ids).await.unwrap();
        assert_eq!(first[0].state, SnapshotState::Pending);
        let second = cloud.describe_snapshots(&member(), &ids).await.unwrap();
        assert_eq!(second[0].state, SnapshotState::Completed);
    }

    #[tokio::test]
    async fn test_unknown_instance_is_not_found() {
        let cloud = InMemoryCloud::new();
        let err = cloud
            .create_snapshots(&member(), "i-missing", "capture", BTreeMap::new())
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::not_found("i-missing"));
    }

    #[tokio::test]
    async fn test_cross_account_copy_requires_share() {
        let cloud = InMemoryCloud::new();
        cloud.add_instance(MEMBER, "i-001", ["vol-001"]);
        cloud
            .create_snapshots(&member(), "i-001", "capture", BTreeMap::new())
            .await
            .unwrap();
        cloud
            .describe_snapshots(&member(), &["snap-001".to_string()])
            .await
            .unwrap();

        let err = cloud
            .copy_snapshot(&security(), &copy_request("snap-001", "t1"))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::not_visible("snap-001"));

        cloud
            .share_snapshot(&member(), "snap-001", SECURITY)
            .await
            .unwrap();
        let copy = cloud
            .copy_snapshot(&security(), &copy_request("snap-001", "t1"))
            .await
            .unwrap();
        let replay = cloud
            .copy_snapshot(&security(), &copy_request("snap-001", "t1"))
            .await
            .unwrap();
        assert_eq!(copy, replay);
    }

    #[tokio::test]
    async fn test_readiness_after_checks() {
        let cloud = InMemoryCloud::new().with_readiness(ReadinessMode::ReadyAfterChecks(1));
        let request = RunInstanceRequest {
            image_id: "ami-1".into(),
            instance_type: "m5a.large".into(),
            instance_profile: "EC2ForensicProfile".into(),
            security_group_id: "sg-1".into(),
            subnet_id: None,
            availability_zone: "us-east-1a".into(),
            tags: BTreeMap::new(),
            client_token: "run".into(),
        };
        let instance = cloud.run_instance(&security(), &request).await.unwrap();

        let first = cloud
            .get_log_events("ForensicDiskReadiness", &instance, true)
            .await
            .unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].message, "booting");

        let second = cloud
            .get_log_events("ForensicDiskReadiness", &instance, true)
            .await
            .unwrap();
        assert_eq!(second.last().unwrap().message, READY_MARKER);
    }

    #[tokio::test]
    async fn test_log_stream_already_exists() {
        let cloud = InMemoryCloud::new();
        cloud.create_log_stream("audit", "inc-1").await.unwrap();
        let err = cloud.create_log_stream("audit", "inc-1").await.unwrap_err();
        assert!(matches!(err, ProviderError::AlreadyExists { .. }));
        assert!(cloud.get_log_events("audit", "other", true).await.is_err());
    }
}
