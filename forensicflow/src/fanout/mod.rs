//! Fan-out over captured snapshots.
//!
//! Every captured snapshot gets its own branch task. Branches share nothing
//! but the incident's cancellation token; a branch failure is recorded and
//! alerted, never escalated.

mod branch;
mod task_group;

pub use branch::{BranchOutcome, BranchRunner, BranchStatus};
pub use task_group::{BranchTaskGroup, FinishedBranches};
