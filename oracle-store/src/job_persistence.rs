use crate::keys::{dead_key, job_record_key, pending_key, retry_key, DEAD_PREFIX, PENDING_PREFIX};
use crate::store::PersistentStore;
use oracle_types::{Job, JobRecord, StoreError};

/// Pending-job persistence for crash recovery (§4.7). Jobs are saved under
/// `pending/<id>` as soon as they're dispatched and removed the moment a
/// handler completes — whether the outcome was success or permanent
/// failure, so a restart never replays a terminally-failed job.
#[derive(Clone)]
pub struct JobPersistence {
    store: PersistentStore,
}

impl JobPersistence {
    pub fn new(store: PersistentStore) -> Self {
        Self { store }
    }

    pub async fn save_pending(&self, job: &Job) -> Result<(), StoreError> {
        self.store.put_json(pending_key(&job.id), job).await
    }

    pub async fn mark_completed(&self, id: &str) -> Result<(), StoreError> {
        self.store.delete(pending_key(id)).await?;
        self.store.delete(retry_key(id)).await
    }

    pub async fn load_all_pending(&self) -> Result<Vec<Job>, StoreError> {
        let rows = self.store.scan_json::<Job>(PENDING_PREFIX).await?;
        Ok(rows.into_iter().map(|(_, job)| job).collect())
    }

    pub async fn record(&self, record: &JobRecord) -> Result<(), StoreError> {
        self.store.put_json(job_record_key(&record.id), record).await
    }

    /// Most-recent-first, capped at 50 (§6 `/api/jobs`).
    pub async fn recent_records(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut rows = self
            .store
            .scan_json::<JobRecord>(crate::keys::JOB_RECORD_PREFIX)
            .await?;
        rows.sort_by(|a, b| b.1.updated_at.cmp(&a.1.updated_at));
        Ok(rows.into_iter().take(50).map(|(_, r)| r).collect())
    }

    pub async fn dead_letters(&self) -> Result<Vec<Job>, StoreError> {
        let rows = self.store.scan_json::<Job>(DEAD_PREFIX).await?;
        Ok(rows.into_iter().map(|(_, job)| job).collect())
    }

    pub async fn move_to_dead(&self, job: &Job) -> Result<(), StoreError> {
        self.store.put_json(dead_key(&job.id), job).await?;
        self.store.delete(pending_key(&job.id)).await?;
        self.store.delete(retry_key(&job.id)).await
    }

    /// Resolve the authoritative status of a job ID across all three
    /// prefixes: `dead` wins over `retry` wins over `pending` (§4.7).
    pub async fn resolve_status(&self, id: &str) -> Result<Option<Job>, StoreError> {
        if let Some(job) = self.store.get_json::<Job>(dead_key(id)).await? {
            return Ok(Some(job));
        }
        if let Some(job) = self.store.get_json::<Job>(retry_key(id)).await? {
            return Ok(Some(job));
        }
        self.store.get_json::<Job>(pending_key(id)).await
    }
}
