//! # Forensicflow
//!
//! Automated disk evidence capture for compromised cloud instances.
//!
//! Given an incident naming a compromised instance, forensicflow snapshots
//! every attached volume, moves each snapshot into the security account,
//! builds an evidence volume from it and attaches that volume to a freshly
//! launched collection instance once the instance reports ready. It offers:
//!
//! - **Per-stage poll policies**: asynchronous completions are polled under
//!   an explicit, testable [`pipeline::PollPolicy`]
//! - **Failure isolation**: every volume runs in its own branch; a failing
//!   branch raises one alert and never aborts its siblings
//! - **Replay safety**: resource-creating stages go through an idempotency
//!   ledger and pass its key to the cloud as a client token
//! - **Global timeout**: the incident ends after a bounded time, keeping any
//!   evidence that was already captured
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use forensicflow::prelude::*;
//!
//! let config = CaptureConfig::from_env()?;
//! let orchestrator = Orchestrator::new(config, providers);
//!
//! let report = orchestrator.run(&event).await;
//! for branch in report.completed_branches() {
//!     println!("{:?}", branch.manifest_key());
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod cancellation;
pub mod config;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod fanout;
pub mod logging;
pub mod orchestrator;
pub mod pipeline;
pub mod provider;
pub mod readiness;
pub mod resources;
pub mod stages;
pub mod utils;

#[cfg(test)]
mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::cancellation::CancellationToken;
    pub use crate::config::{CaptureConfig, CollectionInstanceConfig};
    pub use crate::context::{
        BranchContext, CapturedSnapshot, EvidenceManifest, IncidentContext, IncidentEvent,
    };
    pub use crate::core::{CaptureStage, StageResult, WorkflowState};
    pub use crate::errors::{CaptureError, ProviderError};
    pub use crate::events::{Alert, AlertSink, EventSink, LoggingEventSink, TopicAlertSink};
    pub use crate::fanout::{BranchOutcome, BranchStatus};
    pub use crate::logging::{init_logging, LogFormat};
    pub use crate::orchestrator::{IncidentReport, Orchestrator};
    pub use crate::pipeline::{PollPolicy, StageLedger};
    pub use crate::provider::{CloudProviders, InMemoryCloud};
    pub use crate::resources::{ForensicResources, ForensicResourcesBuilder};
    pub use crate::stages::{StageExecutor, StageHandlers};
}
