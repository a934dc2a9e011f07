//! Durable keyed record store (§4.1), job persistence, and the retry/
//! dead-letter queue (§4.7).

pub mod backend;
pub mod job_persistence;
pub mod keys;
pub mod retry_queue;
pub mod store;

pub use backend::{FileBackend, SledBackend, StoreBackend};
pub use job_persistence::JobPersistence;
pub use retry_queue::{RetryOutcome, RetryQueue, RetryRecord};
pub use store::PersistentStore;

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_types::{Job, JobKind};
    use std::sync::Arc;

    async fn temp_store() -> PersistentStore {
        let dir = tempfile::tempdir().unwrap();
        let backend = SledBackend::open(dir.path().join("db")).unwrap();
        // Keep the tempdir alive for the process (tests are short-lived).
        std::mem::forget(dir);
        PersistentStore::new(Arc::new(backend))
    }

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let store = temp_store().await;
        let job = Job::new("42", JobKind::DataFeed, "0xabc");
        store.put_json("pending/42", &job).await.unwrap();

        let loaded: Job = store.get_json("pending/42").await.unwrap().unwrap();
        assert_eq!(loaded.id, "42");

        store.delete("pending/42").await.unwrap();
        let after: Option<Job> = store.get_json("pending/42").await.unwrap();
        assert!(after.is_none());
    }

    #[tokio::test]
    async fn scan_prefix_returns_only_matching_keys() {
        let store = temp_store().await;
        let job = Job::new("1", JobKind::Vrf, "0xabc");
        store.put_json("pending/1", &job).await.unwrap();
        store.put_json("dead/1", &job).await.unwrap();

        let pending: Vec<(String, Job)> = store.scan_json("pending/").await.unwrap();
        assert_eq!(pending.len(), 1);
    }

    #[tokio::test]
    async fn job_persistence_tracks_pending_lifecycle() {
        let store = temp_store().await;
        let persistence = JobPersistence::new(store);
        let job = Job::new("7", JobKind::DataFeed, "0xabc");

        persistence.save_pending(&job).await.unwrap();
        let pending = persistence.load_all_pending().await.unwrap();
        assert_eq!(pending.len(), 1);

        persistence.mark_completed("7").await.unwrap();
        let pending_after = persistence.load_all_pending().await.unwrap();
        assert!(pending_after.is_empty());
    }

    #[tokio::test]
    async fn retry_queue_moves_to_dead_after_max_retries() {
        let store = temp_store().await;
        let persistence = JobPersistence::new(store.clone());
        let queue = RetryQueue::new(store, persistence.clone(), 2);
        let job = Job::new("9", JobKind::DataFeed, "0xabc");
        persistence.save_pending(&job).await.unwrap();

        queue.enqueue(&job, "first failure").await.unwrap();
        queue.enqueue(&job, "second failure").await.unwrap();
        queue.enqueue(&job, "third failure").await.unwrap();

        let dead = persistence.dead_letters().await.unwrap();
        assert_eq!(dead.len(), 1);
    }

    #[tokio::test]
    async fn file_backend_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = FileBackend::open(dir.path()).unwrap();
        let store = PersistentStore::new(Arc::new(backend));
        let job = Job::new("3", JobKind::Compute, "0xabc");
        store.put_json("pending/3", &job).await.unwrap();
        let loaded: Job = store.get_json("pending/3").await.unwrap().unwrap();
        assert_eq!(loaded.id, "3");
    }
}
