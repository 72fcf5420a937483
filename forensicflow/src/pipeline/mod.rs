//! Stage execution plumbing.
//!
//! This module provides:
//! - The poll/retry executor applied to asynchronous stages
//! - The idempotency ledger that collapses replays of resource-creating stages

mod idempotency;
mod poll;

pub use idempotency::{idempotency_key, InMemoryStageLedger, LedgerEntry, StageLedger};
pub use poll::{poll_until, run_stage, sleep_or_cancel, JitterStrategy, PollPolicy};
