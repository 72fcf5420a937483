//! Configuration for the capture workflow.
//!
//! Everything the orchestrator needs to know about the security account's
//! pre-provisioned resources (bucket, key, log groups, collection image,
//! network placement) plus the per-stage poll policies and the global
//! timeout. The orchestrator never creates these resources; see
//! [`crate::resources`] for how they are wired.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::core::CaptureStage;
use crate::errors::CaptureError;
use crate::pipeline::PollPolicy;
use crate::utils::{validate_account_id, validate_region};

/// Prefix of the environment variables read by [`CaptureConfig::from_env`].
pub const ENV_PREFIX: &str = "FORENSICFLOW_";

/// Settings for the collection instance launched per branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionInstanceConfig {
    /// The sanitized machine image.
    #[serde(default)]
    pub image_id: String,
    /// Instance type.
    #[serde(default = "default_instance_type")]
    pub instance_type: String,
    /// Instance profile granting the evidence agent its permissions.
    #[serde(default = "default_instance_profile")]
    pub instance_profile: String,
    /// Forensic security group.
    #[serde(default)]
    pub security_group_id: String,
    /// Optional subnet; the default subnet of the AZ is used otherwise.
    #[serde(default)]
    pub subnet_id: Option<String>,
}

fn default_instance_type() -> String {
    "m5a.large".to_string()
}

fn default_instance_profile() -> String {
    "EC2ForensicProfile".to_string()
}

impl Default for CollectionInstanceConfig {
    fn default() -> Self {
        Self {
            image_id: String::new(),
            instance_type: default_instance_type(),
            instance_profile: default_instance_profile(),
            security_group_id: String::new(),
            subnet_id: None,
        }
    }
}

/// Configuration for one deployment of the capture workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Account that owns the evidence resources and collection instances.
    #[serde(default)]
    pub security_account_id: String,
    /// Region the workflow operates in.
    #[serde(default)]
    pub region: String,
    /// ARN partition.
    #[serde(default = "default_partition")]
    pub partition: String,
    /// Role assumed in the source account.
    #[serde(default = "default_member_role_name")]
    pub member_role_name: String,
    /// Availability zones volumes and instances may be placed in.
    #[serde(default)]
    pub supported_azs: Vec<String>,
    /// Evidence bucket receiving manifests.
    #[serde(default)]
    pub evidence_bucket: String,
    /// Key used to encrypt copied snapshots and volumes.
    #[serde(default)]
    pub kms_key_arn: String,
    /// Log group receiving one audit stream per incident.
    #[serde(default = "default_audit_log_group")]
    pub audit_log_group: String,
    /// Log group receiving one readiness stream per collection instance.
    #[serde(default = "default_readiness_log_group")]
    pub readiness_log_group: String,
    /// Notification topic for operator alerts.
    #[serde(default = "default_alert_topic")]
    pub alert_topic: String,
    /// Collection instance settings.
    #[serde(default)]
    pub collection: CollectionInstanceConfig,
    /// Device name the recovered volume is attached as.
    #[serde(default = "default_attach_device")]
    pub attach_device: String,
    /// Settle delay before the first readiness check, in seconds.
    #[serde(default = "default_settle_delay")]
    pub settle_delay_seconds: u64,
    /// Global timeout of one incident, in seconds.
    #[serde(default = "default_global_timeout")]
    pub global_timeout_seconds: u64,
    /// Policy for confirming source snapshots.
    #[serde(default)]
    pub snapshot_poll: PollPolicy,
    /// Policy for confirming the cross-account and final copies.
    #[serde(default)]
    pub copy_poll: PollPolicy,
    /// Policy for readiness checks and the guarded mount.
    #[serde(default)]
    pub readiness_poll: PollPolicy,
    /// Policy for a copy whose source is not yet visible cross-account.
    #[serde(default = "default_visibility_retry")]
    pub visibility_retry: PollPolicy,
}

fn default_partition() -> String {
    "aws".to_string()
}

fn default_member_role_name() -> String {
    "ForensicMemberAutomationRole".to_string()
}

fn default_audit_log_group() -> String {
    "ForensicAuditLogGroup".to_string()
}

fn default_readiness_log_group() -> String {
    "ForensicDiskReadiness".to_string()
}

fn default_alert_topic() -> String {
    "DiskForensicsErrorTopic".to_string()
}

fn default_attach_device() -> String {
    "/dev/sdf".to_string()
}

fn default_settle_delay() -> u64 {
    120
}

fn default_global_timeout() -> u64 {
    20 * 60
}

fn default_visibility_retry() -> PollPolicy {
    PollPolicy::new()
        .with_interval(Duration::from_secs(10))
        .with_max_attempts(10)
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            security_account_id: String::new(),
            region: String::new(),
            partition: default_partition(),
            member_role_name: default_member_role_name(),
            supported_azs: Vec::new(),
            evidence_bucket: String::new(),
            kms_key_arn: String::new(),
            audit_log_group: default_audit_log_group(),
            readiness_log_group: default_readiness_log_group(),
            alert_topic: default_alert_topic(),
            collection: CollectionInstanceConfig::default(),
            attach_device: default_attach_device(),
            settle_delay_seconds: default_settle_delay(),
            global_timeout_seconds: default_global_timeout(),
            snapshot_poll: PollPolicy::default(),
            copy_poll: PollPolicy::default(),
            readiness_poll: PollPolicy::default(),
            visibility_retry: default_visibility_retry(),
        }
    }
}

impl CaptureConfig {
    /// Creates a configuration for a security account and region.
    #[must_use]
    pub fn new(security_account_id: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            security_account_id: security_account_id.into(),
            region: region.into(),
            ..Self::default()
        }
    }

    /// Sets the supported availability zones.
    #[must_use]
    pub fn with_supported_azs<I, S>(mut self, azs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_azs = azs.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the evidence bucket.
    #[must_use]
    pub fn with_evidence_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.evidence_bucket = bucket.into();
        self
    }

    /// Sets the evidence key.
    #[must_use]
    pub fn with_kms_key_arn(mut self, arn: impl Into<String>) -> Self {
        self.kms_key_arn = arn.into();
        self
    }

    /// Sets the collection instance settings.
    #[must_use]
    pub fn with_collection(mut self, collection: CollectionInstanceConfig) -> Self {
        self.collection = collection;
        self
    }

    /// Sets the global timeout.
    #[must_use]
    pub fn with_global_timeout(mut self, timeout: Duration) -> Self {
        self.global_timeout_seconds = timeout.as_secs();
        self
    }

    /// Sets the readiness settle delay.
    #[must_use]
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_seconds = delay.as_secs();
        self
    }

    /// Replaces every poll policy with the same one.
    #[must_use]
    pub fn with_uniform_policy(mut self, policy: PollPolicy) -> Self {
        self.snapshot_poll = policy.clone();
        self.copy_poll = policy.clone();
        self.readiness_poll = policy.clone();
        self.visibility_retry = policy;
        self
    }

    /// Returns the global timeout.
    #[must_use]
    pub fn global_timeout(&self) -> Duration {
        Duration::from_secs(self.global_timeout_seconds)
    }

    /// Returns the readiness settle delay.
    #[must_use]
    pub fn settle_delay(&self) -> Duration {
        Duration::from_secs(self.settle_delay_seconds)
    }

    /// The poll policy that governs a stage, if it has one.
    #[must_use]
    pub fn policy_for(&self, stage: CaptureStage) -> Option<&PollPolicy> {
        match stage {
            CaptureStage::ConfirmSnapshots => Some(&self.snapshot_poll),
            CaptureStage::ConfirmCopy | CaptureStage::ConfirmFinalCopy => Some(&self.copy_poll),
            CaptureStage::AwaitReadiness | CaptureStage::MountVolume => Some(&self.readiness_poll),
            CaptureStage::CopySnapshot | CaptureStage::FinalCopy => Some(&self.visibility_retry),
            _ => None,
        }
    }

    /// ARN of the member role in a source account.
    #[must_use]
    pub fn member_role_arn(&self, account_id: &str) -> String {
        format!(
            "arn:{}:iam::{}:role/{}",
            self.partition, account_id, self.member_role_name
        )
    }

    /// Checks that every required value is present and well formed.
    pub fn validate(&self) -> Result<(), CaptureError> {
        validate_account_id("security_account_id", &self.security_account_id)?;
        validate_region("region", &self.region)?;

        let required = [
            ("evidence_bucket", &self.evidence_bucket),
            ("kms_key_arn", &self.kms_key_arn),
            ("member_role_name", &self.member_role_name),
            ("audit_log_group", &self.audit_log_group),
            ("readiness_log_group", &self.readiness_log_group),
            ("collection.image_id", &self.collection.image_id),
            ("collection.security_group_id", &self.collection.security_group_id),
            ("attach_device", &self.attach_device),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CaptureError::configuration(field, "is required"));
            }
        }

        if self.supported_azs.is_empty() {
            return Err(CaptureError::configuration(
                "supported_azs",
                "at least one availability zone is required",
            ));
        }
        if let Some(az) = self
            .supported_azs
            .iter()
            .find(|az| !az.starts_with(self.region.as_str()))
        {
            return Err(CaptureError::configuration(
                "supported_azs",
                format!("'{az}' is not in region {}", self.region),
            ));
        }
        if self.global_timeout_seconds == 0 {
            return Err(CaptureError::configuration(
                "global_timeout_seconds",
                "must be positive",
            ));
        }

        let timeout = self.global_timeout();
        let budgets = [
            ("snapshot_poll", self.snapshot_poll.total_budget()),
            ("copy_poll", self.copy_poll.total_budget()),
            (
                "readiness_poll",
                self.readiness_poll.total_budget() + self.settle_delay(),
            ),
            ("visibility_retry", self.visibility_retry.total_budget()),
        ];
        for (field, budget) in budgets {
            if budget > timeout {
                return Err(CaptureError::configuration(
                    field,
                    format!(
                        "waits up to {}s, longer than the global timeout of {}s",
                        budget.as_secs(),
                        timeout.as_secs()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// Parses a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self, CaptureError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a JSON configuration file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&raw)
            .map_err(|e| anyhow::anyhow!("{}: {e}", path.display()))?;
        Ok(config)
    }

    /// Builds a configuration from `FORENSICFLOW_*` environment variables.
    pub fn from_env() -> Result<Self, CaptureError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a configuration from an arbitrary variable lookup.
    ///
    /// Unset variables keep their defaults; malformed numbers are
    /// configuration errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CaptureError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));
        let mut config = Self::default();

        if let Some(v) = var("SECURITY_ACCOUNT_ID") {
            config.security_account_id = v;
        }
        if let Some(v) = var("REGION") {
            config.region = v;
        }
        if let Some(v) = var("PARTITION") {
            config.partition = v;
        }
        if let Some(v) = var("MEMBER_ROLE_NAME") {
            config.member_role_name = v;
        }
        if let Some(v) = var("SUPPORTED_AZS") {
            config.supported_azs = v
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(v) = var("EVIDENCE_BUCKET") {
            config.evidence_bucket = v;
        }
        if let Some(v) = var("KMS_KEY_ARN") {
            config.kms_key_arn = v;
        }
        if let Some(v) = var("AUDIT_LOG_GROUP") {
            config.audit_log_group = v;
        }
        if let Some(v) = var("READINESS_LOG_GROUP") {
            config.readiness_log_group = v;
        }
        if let Some(v) = var("ALERT_TOPIC") {
            config.alert_topic = v;
        }
        if let Some(v) = var("IMAGE_ID") {
            config.collection.image_id = v;
        }
        if let Some(v) = var("INSTANCE_TYPE") {
            config.collection.instance_type = v;
        }
        if let Some(v) = var("INSTANCE_PROFILE") {
            config.collection.instance_profile = v;
        }
        if let Some(v) = var("SECURITY_GROUP_ID") {
            config.collection.security_group_id = v;
        }
        if let Some(v) = var("SUBNET_ID") {
            config.collection.subnet_id = Some(v);
        }
        if let Some(v) = var("SETTLE_DELAY_SECONDS") {
            config.settle_delay_seconds = parse_seconds("SETTLE_DELAY_SECONDS", &v)?;
        }
        if let Some(v) = var("GLOBAL_TIMEOUT_SECONDS") {
            config.global_timeout_seconds = parse_seconds("GLOBAL_TIMEOUT_SECONDS", &v)?;
        }

        Ok(config)
    }
}

fn parse_seconds(name: &str, value: &str) -> Result<u64, CaptureError> {
    value.trim().parse().map_err(|_| {
        CaptureError::configuration(
            format!("{ENV_PREFIX}{name}"),
            format!("'{value}' is not a number of seconds"),
        )
    })
}
