//! Reorg Protector (§4.6): confirmation-depth gating plus an Event-ID
//! dedup set with high-water-mark eviction.

use oracle_store::{keys::LAST_PROCESSED_BLOCK_KEY, PersistentStore};
use oracle_types::{EventId, StoreError};
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;
use tracing::{debug, warn};

const DEFAULT_HIGH_WATER_MARK: usize = 10_000;

struct State {
    last_processed_block: u64,
    processed: HashSet<EventId>,
    /// Insertion order of `processed`, oldest first, so eviction can drop
    /// the genuinely oldest half rather than whatever `HashSet` iteration
    /// happens to yield.
    processed_order: VecDeque<EventId>,
}

pub struct ReorgProtector {
    store: PersistentStore,
    confirmation_depth: u64,
    high_water_mark: usize,
    state: Mutex<State>,
}

impl ReorgProtector {
    pub fn new(store: PersistentStore, confirmation_depth: u64) -> Self {
        Self {
            store,
            confirmation_depth,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
            state: Mutex::new(State {
                last_processed_block: 0,
                processed: HashSet::new(),
                processed_order: VecDeque::new(),
            }),
        }
    }

    /// Reads `last-processed-block` from the store and resumes from there
    /// (§4.6 "Recovery").
    pub async fn recover(&self) -> Result<(), StoreError> {
        if let Some(height) = self.store.get_json::<u64>(LAST_PROCESSED_BLOCK_KEY).await? {
            self.state.lock().expect("reorg protector lock poisoned").last_processed_block = height;
            debug!(height, "resumed reorg protector from persisted height");
        }
        Ok(())
    }

    pub fn last_processed_block(&self) -> u64 {
        self.state.lock().expect("reorg protector lock poisoned").last_processed_block
    }

    /// `true` if the event should be processed now: not a dedup duplicate,
    /// and the head is at least `confirmation_depth` blocks past it.
    pub fn should_process(&self, block_number: u64, event_id: &EventId, head_height: u64) -> bool {
        let guard = self.state.lock().expect("reorg protector lock poisoned");
        if guard.processed.contains(event_id) {
            return false;
        }
        head_height >= block_number + self.confirmation_depth
    }

    pub async fn mark_processed(&self, block_number: u64, event_id: EventId) -> Result<(), StoreError> {
        {
            let mut guard = self.state.lock().expect("reorg protector lock poisoned");
            if guard.processed.insert(event_id.clone()) {
                guard.processed_order.push_back(event_id);
            }
            if block_number > guard.last_processed_block {
                guard.last_processed_block = block_number;
            }
            if guard.processed.len() > self.high_water_mark {
                let evict_count = guard.processed.len() / 2;
                for _ in 0..evict_count {
                    let Some(id) = guard.processed_order.pop_front() else {
                        break;
                    };
                    guard.processed.remove(&id);
                }
                warn!(evicted = evict_count, "reorg dedup set exceeded high-water mark, evicted oldest half");
            }
        }
        let height = self.last_processed_block();
        self.store.put_json(LAST_PROCESSED_BLOCK_KEY, &height).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_store::{PersistentStore, SledBackend};
    use std::sync::Arc;

    async fn protector(depth: u64) -> ReorgProtector {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path().join("db")).unwrap();
        std::mem::forget(dir);
        ReorgProtector::new(PersistentStore::new(Arc::new(backend)), depth)
    }

    #[tokio::test]
    async fn rejects_events_not_yet_confirmed() {
        let protector = protector(5).await;
        let id = EventId::new("0xabc", 0);
        assert!(!protector.should_process(100, &id, 102));
        assert!(protector.should_process(100, &id, 105));
    }

    #[tokio::test]
    async fn rejects_duplicate_event_ids() {
        let protector = protector(0).await;
        let id = EventId::new("0xabc", 0);
        assert!(protector.should_process(100, &id, 100));
        protector.mark_processed(100, id.clone()).await.unwrap();
        assert!(!protector.should_process(100, &id, 100));
    }

    #[tokio::test]
    async fn persists_last_processed_block_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path().join("db")).unwrap();
        let store = PersistentStore::new(Arc::new(backend));

        let protector = ReorgProtector::new(store.clone(), 0);
        protector.mark_processed(42, EventId::new("0xabc", 0)).await.unwrap();

        let resumed = ReorgProtector::new(store, 0);
        resumed.recover().await.unwrap();
        assert_eq!(resumed.last_processed_block(), 42);
    }
}
