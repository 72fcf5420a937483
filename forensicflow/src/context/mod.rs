//! Context threaded through the capture workflow.
//!
//! This module provides:
//! - The trigger payload and the incident-level context built from it
//! - Branch contexts narrowed to one captured snapshot
//! - The evidence manifest and audit record written by each branch

mod branch;
mod evidence;
mod incident;

pub use branch::{BranchContext, BranchUpdate, EvidenceLocation};
pub use evidence::{AuditRecord, EvidenceManifest};
pub use incident::{CapturedSnapshot, IncidentContext, IncidentEvent};
