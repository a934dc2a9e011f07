//! Reputation Registry (§4.2): node-ID -> scalar in [0, 100]. Snapshotting
//! to the store is optional and best-effort, matching the Persistent
//! Store's own "reads degrade to not found" failure posture (§4.1).

use crate::constants::{
    DEFAULT_REPUTATION, REPUTATION_MAX, REPUTATION_MIN, REPUTATION_SLASH_THRESHOLD,
    REPUTATION_TRUSTED_THRESHOLD,
};
use oracle_store::{keys::reputation_key, PersistentStore};
use oracle_types::StoreError;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone)]
pub struct ReputationRegistry {
    scores: Arc<RwLock<HashMap<String, u8>>>,
    store: Option<PersistentStore>,
}

impl ReputationRegistry {
    pub fn new() -> Self {
        Self {
            scores: Arc::new(RwLock::new(HashMap::new())),
            store: None,
        }
    }

    pub fn with_store(store: PersistentStore) -> Self {
        Self {
            scores: Arc::new(RwLock::new(HashMap::new())),
            store: Some(store),
        }
    }

    pub fn score(&self, node_id: &str) -> u8 {
        self.scores
            .read()
            .expect("reputation lock poisoned")
            .get(node_id)
            .copied()
            .unwrap_or(DEFAULT_REPUTATION)
    }

    /// Clamps to [0, 100] and snapshots to the store if attached.
    pub async fn adjust(&self, node_id: &str, delta: i16) -> Result<u8, StoreError> {
        let new_score = {
            let mut guard = self.scores.write().expect("reputation lock poisoned");
            let current = *guard.get(node_id).unwrap_or(&DEFAULT_REPUTATION) as i16;
            let clamped =
                (current + delta).clamp(REPUTATION_MIN as i16, REPUTATION_MAX as i16) as u8;
            guard.insert(node_id.to_string(), clamped);
            clamped
        };
        if let Some(store) = &self.store {
            store.put_json(reputation_key(node_id), &new_score).await?;
        }
        Ok(new_score)
    }

    pub fn trusted(&self, node_id: &str) -> bool {
        self.score(node_id) > REPUTATION_TRUSTED_THRESHOLD
    }

    pub fn slash_candidate(&self, node_id: &str) -> bool {
        self.score(node_id) < REPUTATION_SLASH_THRESHOLD
    }
}

impl Default for ReputationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_node_defaults_to_fifty() {
        let registry = ReputationRegistry::new();
        assert_eq!(registry.score("node-x"), 50);
        assert!(!registry.trusted("node-x"));
        assert!(!registry.slash_candidate("node-x"));
    }

    #[tokio::test]
    async fn adjust_clamps_to_bounds() {
        let registry = ReputationRegistry::new();
        for _ in 0..20 {
            registry.adjust("node-a", -10).await.unwrap();
        }
        assert_eq!(registry.score("node-a"), 0);
        assert!(registry.slash_candidate("node-a"));

        for _ in 0..20 {
            registry.adjust("node-a", 10).await.unwrap();
        }
        assert_eq!(registry.score("node-a"), 100);
        assert!(registry.trusted("node-a"));
    }
}
