//! Handles to the pre-provisioned forensic resources.
//!
//! The capture workflow never creates its bucket, key, log groups, roles or
//! network placement. A deployment describes them once with
//! [`ForensicResourcesBuilder`], which validates them, wires the cross-account
//! role pair in dependency order, and hands the result to the orchestrator
//! as configuration via [`ForensicResources::apply_to`].

use serde::{Deserialize, Serialize};

use crate::config::{CaptureConfig, CollectionInstanceConfig};
use crate::errors::CaptureError;
use crate::utils::{validate_account_id, validate_region};

/// One allow statement of a role policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyStatement {
    /// Allowed actions.
    pub actions: Vec<String>,
    /// Resources the actions apply to.
    pub resources: Vec<String>,
}

impl PolicyStatement {
    /// Creates a statement.
    #[must_use]
    pub fn allow(actions: &[&str], resources: &[&str]) -> Self {
        Self {
            actions: actions.iter().map(|a| (*a).to_string()).collect(),
            resources: resources.iter().map(|r| (*r).to_string()).collect(),
        }
    }
}

/// An IAM role as the workflow needs to know it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDescriptor {
    /// Role name.
    pub name: String,
    /// Role ARN; may contain a `*` account for roles deployed to every member.
    pub arn: String,
    /// Principals allowed to assume the role.
    pub trusted_principals: Vec<String>,
    /// Inline policy.
    pub statements: Vec<PolicyStatement>,
}

impl RoleDescriptor {
    fn new(partition: &str, account: &str, name: &str) -> Self {
        Self {
            name: name.to_string(),
            arn: format!("arn:{partition}:iam::{account}:role/{name}"),
            trusted_principals: Vec::new(),
            statements: Vec::new(),
        }
    }

    /// Returns true if the role may assume `target`.
    #[must_use]
    pub fn can_assume(&self, target: &RoleDescriptor) -> bool {
        self.statements.iter().any(|s| {
            s.actions.iter().any(|a| a == "sts:AssumeRole") && s.resources.contains(&target.arn)
        }) && target.trusted_principals.contains(&self.arn)
    }
}

/// Immutable handles to everything the workflow consumes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForensicResources {
    /// Security account id.
    pub security_account_id: String,
    /// Region.
    pub region: String,
    /// ARN partition.
    pub partition: String,
    /// Role the orchestrator runs as.
    pub automation_role: RoleDescriptor,
    /// Role assumed in member accounts.
    pub member_role: RoleDescriptor,
    /// Evidence encryption key.
    pub kms_key_arn: String,
    /// Evidence bucket.
    pub evidence_bucket: String,
    /// Audit log group.
    pub audit_log_group: String,
    /// Readiness log group.
    pub readiness_log_group: String,
    /// Alert topic.
    pub alert_topic: String,
    /// Collection instance settings.
    pub collection: CollectionInstanceConfig,
    /// Supported availability zones.
    pub supported_azs: Vec<String>,
}

impl ForensicResources {
    /// Copies the handles into a configuration, keeping its poll policies.
    #[must_use]
    pub fn apply_to(&self, mut config: CaptureConfig) -> CaptureConfig {
        config.security_account_id.clone_from(&self.security_account_id);
        config.region.clone_from(&self.region);
        config.partition.clone_from(&self.partition);
        config.member_role_name.clone_from(&self.member_role.name);
        config.kms_key_arn.clone_from(&self.kms_key_arn);
        config.evidence_bucket.clone_from(&self.evidence_bucket);
        config.audit_log_group.clone_from(&self.audit_log_group);
        config.readiness_log_group.clone_from(&self.readiness_log_group);
        config.alert_topic.clone_from(&self.alert_topic);
        config.collection = self.collection.clone();
        config.supported_azs.clone_from(&self.supported_azs);
        config
    }

    /// A configuration with default poll policies.
    #[must_use]
    pub fn to_config(&self) -> CaptureConfig {
        self.apply_to(CaptureConfig::default())
    }
}

/// Builder for [`ForensicResources`].
#[derive(Debug, Clone)]
pub struct ForensicResourcesBuilder {
    security_account_id: String,
    region: String,
    partition: String,
    automation_role_name: String,
    member_role_name: String,
    kms_key_arn: Option<String>,
    evidence_bucket: Option<String>,
    audit_log_group: String,
    readiness_log_group: String,
    alert_topic: String,
    collection: CollectionInstanceConfig,
    supported_azs: Vec<String>,
}

impl ForensicResourcesBuilder {
    /// Starts a builder for a security account and region.
    #[must_use]
    pub fn new(security_account_id: impl Into<String>, region: impl Into<String>) -> Self {
        let defaults = CaptureConfig::default();
        Self {
            security_account_id: security_account_id.into(),
            region: region.into(),
            partition: defaults.partition,
            automation_role_name: "ForensicAutomationRole".to_string(),
            member_role_name: defaults.member_role_name,
            kms_key_arn: None,
            evidence_bucket: None,
            audit_log_group: defaults.audit_log_group,
            readiness_log_group: defaults.readiness_log_group,
            alert_topic: defaults.alert_topic,
            collection: defaults.collection,
            supported_azs: Vec::new(),
        }
    }

    /// Sets the ARN partition.
    #[must_use]
    pub fn partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = partition.into();
        self
    }

    /// Sets the role names.
    #[must_use]
    pub fn roles(mut self, automation: impl Into<String>, member: impl Into<String>) -> Self {
        self.automation_role_name = automation.into();
        self.member_role_name = member.into();
        self
    }

    /// Sets the evidence key.
    #[must_use]
    pub fn kms_key(mut self, arn: impl Into<String>) -> Self {
        self.kms_key_arn = Some(arn.into());
        self
    }

    /// Sets the evidence bucket.
    #[must_use]
    pub fn evidence_bucket(mut self, bucket: impl Into<String>) -> Self {
        self.evidence_bucket = Some(bucket.into());
        self
    }

    /// Sets the log groups.
    #[must_use]
    pub fn log_groups(mut self, audit: impl Into<String>, readiness: impl Into<String>) -> Self {
        self.audit_log_group = audit.into();
        self.readiness_log_group = readiness.into();
        self
    }

    /// Sets the alert topic.
    #[must_use]
    pub fn alert_topic(mut self, topic: impl Into<String>) -> Self {
        self.alert_topic = topic.into();
        self
    }

    /// Sets the collection instance settings.
    #[must_use]
    pub fn collection(mut self, collection: CollectionInstanceConfig) -> Self {
        self.collection = collection;
        self
    }

    /// Adds a supported availability zone.
    #[must_use]
    pub fn availability_zone(mut self, az: impl Into<String>) -> Self {
        self.supported_azs.push(az.into());
        self
    }

    /// Validates the handles and wires the role pair.
    ///
    /// # Errors
    ///
    /// Returns a configuration error naming the first missing or malformed value.
    pub fn build(self) -> Result<ForensicResources, CaptureError> {
        validate_account_id("security_account_id", &self.security_account_id)?;
        validate_region("region", &self.region)?;
        let kms_key_arn = self
            .kms_key_arn
            .ok_or_else(|| CaptureError::configuration("kms_key_arn", "is required"))?;
        let evidence_bucket = self
            .evidence_bucket
            .ok_or_else(|| CaptureError::configuration("evidence_bucket", "is required"))?;
        if self.collection.image_id.is_empty() {
            return Err(CaptureError::configuration("collection.image_id", "is required"));
        }
        if self.collection.security_group_id.is_empty() {
            return Err(CaptureError::configuration(
                "collection.security_group_id",
                "is required",
            ));
        }
        if self.supported_azs.is_empty() {
            return Err(CaptureError::configuration(
                "supported_azs",
                "at least one availability zone is required",
            ));
        }

        // The two roles reference each other; build them without a cycle.
        let mut automation_role = RoleDescriptor::new(
            &self.partition,
            &self.security_account_id,
            &self.automation_role_name,
        );
        automation_role.trusted_principals.push("states.amazonaws.com".to_string());
        automation_role.statements.push(PolicyStatement::allow(
            &[
                "ec2:CopySnapshot",
                "ec2:CreateVolume",
                "ec2:RunInstances",
                "ec2:AttachVolume",
                "ec2:DescribeSnapshots",
            ],
            &["*"],
        ));

        let mut member_role = RoleDescriptor::new(&self.partition, "*", &self.member_role_name);
        member_role.trusted_principals.push(automation_role.arn.clone());
        member_role.statements.push(PolicyStatement::allow(
            &[
                "ec2:CreateSnapshots",
                "ec2:DescribeSnapshots",
                "ec2:CopySnapshot",
                "ec2:ModifySnapshotAttribute",
            ],
            &["*"],
        ));
        member_role
            .statements
            .push(PolicyStatement::allow(&["kms:CreateGrant", "kms:ReEncrypt*"], &[kms_key_arn.as_str()]));

        automation_role
            .statements
            .push(PolicyStatement::allow(&["sts:AssumeRole"], &[member_role.arn.as_str()]));

        Ok(ForensicResources {
            security_account_id: self.security_account_id,
            region: self.region,
            partition: self.partition,
            automation_role,
            member_role,
            kms_key_arn,
            evidence_bucket,
            audit_log_group: self.audit_log_group,
            readiness_log_group: self.readiness_log_group,
            alert_topic: self.alert_topic,
            collection: self.collection,
            supported_azs: self.supported_azs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder() -> ForensicResourcesBuilder {
        ForensicResourcesBuilder::new("111122223333", "us-east-1")
            .kms_key("arn:aws:kms:us-east-1:111122223333:key/abc")
            .evidence_bucket("forensic-evidence")
            .collection(CollectionInstanceConfig {
                image_id: "ami-0forensic".into(),
                security_group_id: "sg-0forensic".into(),
                ..CollectionInstanceConfig::default()
            })
            .availability_zone("us-east-1a")
    }

    #[test]
    fn test_roles_reference_each_other() {
        let resources = builder().build().unwrap();
        let automation = &resources.automation_role;
        let member = &resources.member_role;

        assert_eq!(
            automation.arn,
            "arn:aws:iam::111122223333:role/ForensicAutomationRole"
        );
        assert_eq!(member.arn, "arn:aws:iam::*:role/ForensicMemberAutomationRole");
        assert!(automation.can_assume(member));
        assert!(!member.can_assume(automation));
    }

    #[test]
    fn test_missing_key_is_configuration_error() {
        let result = ForensicResourcesBuilder::new("111122223333", "us-east-1")
            .evidence_bucket("forensic-evidence")
            .build();
        match result.unwrap_err() {
            CaptureError::Configuration { field, .. } => assert_eq!(field, "kms_key_arn"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_zone_is_rejected() {
        let mut b = builder();
        b.supported_azs.clear();
        assert!(b.build().is_err());
    }

    #[test]
    fn test_apply_to_produces_valid_config() {
        let config = builder().build().unwrap().to_config();
        assert!(config.validate().is_ok());
        assert_eq!(config.member_role_name, "ForensicMemberAutomationRole");
        assert_eq!(config.evidence_bucket, "forensic-evidence");
    }
}
