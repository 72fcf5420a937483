//! Idempotency ledger for resource-creating stages.
//!
//! Copying a snapshot, creating a volume or launching an instance are billable
//! side effects. Each such stage derives a key from the full branch identifier
//! tuple and records the resource it produced; a replay of the same stage with
//! the same identifiers returns the recorded resource instead of creating a
//! second one. The same key is handed to the collaborator as a client token.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::core::CaptureStage;
use crate::utils::now_millis;

/// A resource recorded for a completed stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// The stage that produced the resource.
    pub stage: CaptureStage,
    /// The produced resource identifier.
    pub resource_id: String,
    /// When the entry was recorded, in milliseconds since the epoch.
    pub recorded_at_ms: i64,
}

impl LedgerEntry {
    /// Creates a new entry stamped with the current time.
    #[must_use]
    pub fn new(stage: CaptureStage, resource_id: impl Into<String>) -> Self {
        Self {
            stage,
            resource_id: resource_id.into(),
            recorded_at_ms: now_millis(),
        }
    }
}

/// Storage backend for the idempotency ledger.
#[async_trait]
pub trait StageLedger: Send + Sync {
    /// Gets a recorded entry by key.
    async fn get(&self, key: &str) -> Option<LedgerEntry>;

    /// Records an entry.
    ///
    /// If the key is already present the existing entry wins and is returned.
    async fn record(&self, key: &str, entry: LedgerEntry) -> LedgerEntry;
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct InMemoryStageLedger {
    entries: DashMap<String, LedgerEntry>,
}

impl InMemoryStageLedger {
    /// Creates a new in-memory ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if the ledger is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl StageLedger for InMemoryStageLedger {
    async fn get(&self, key: &str) -> Option<LedgerEntry> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    async fn record(&self, key: &str, entry: LedgerEntry) -> LedgerEntry {
        self.entries
            .entry(key.to_string())
            .or_insert(entry)
            .value()
            .clone()
    }
}

/// Derives the idempotency key of a branch stage.
///
/// The key covers the incident, the source snapshot and the stage, so two
/// branches can never share a key and a replay of one branch always does.
#[must_use]
pub fn idempotency_key(incident_id: &str, source_snapshot_id: &str, stage: CaptureStage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(incident_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(source_snapshot_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(stage.as_str().as_bytes());
    hex::encode(hasher.finalize())
}
