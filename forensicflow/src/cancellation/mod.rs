//! Cooperative cancellation shared by an incident's orchestrator, branches
//! and poll waits.

mod token;

pub use token::CancellationToken;
