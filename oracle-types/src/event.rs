use serde::{Deserialize, Serialize};

/// Uniqueness key for an on-chain log: `(txHash, logIndex)` (glossary). Once
/// marked processed, no handler may run for the same `EventId` again — the
/// reorg-safety invariant (§3).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId {
    pub tx_hash: String,
    pub log_index: u64,
}

impl EventId {
    pub fn new(tx_hash: impl Into<String>, log_index: u64) -> Self {
        Self {
            tx_hash: tx_hash.into(),
            log_index,
        }
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.tx_hash, self.log_index)
    }
}
