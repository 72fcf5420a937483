//! Core domain model types for forensicflow.
//!
//! This module contains the fundamental types used throughout the workflow:
//! - The tagged stage result (`Completed` / `Pending` / `Failed`)
//! - The catalogue of capture stages and their retry traits
//! - The incident-level workflow state machine

mod result;
mod stage;
mod state;

pub use result::StageResult;
pub use stage::CaptureStage;
pub use state::WorkflowState;
