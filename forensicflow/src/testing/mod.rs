//! Testing utilities for capture workflows.
//!
//! This module provides:
//! - Sample configuration and trigger fixtures
//! - A harness that drives stage handlers against the in-memory cloud
//! - A scripted stage executor for branch and fan-out tests
//! - Assertions on incident reports

mod assertions;
mod fixtures;
mod mocks;

pub use assertions::{assert_branch_completed, assert_branch_failed, assert_incident_state};
pub use fixtures::{
    sample_config, sample_event, TestHarness, EVIDENCE_BUCKET, INCIDENT_ID, MEMBER_ACCOUNT,
    REGION, SECURITY_ACCOUNT,
};
pub use mocks::ScriptedExecutor;
