use crate::job_persistence::JobPersistence;
use crate::keys::{pending_key, retry_key};
use crate::store::PersistentStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use oracle_types::{Job, StoreError};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRecord {
    pub job: Job,
    pub attempt: u32,
    pub reason: String,
    pub next_retry: DateTime<Utc>,
}

/// What `RetryQueue::enqueue` actually did with the job, so callers can
/// react (log, bump a metric) without re-querying the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
    Retried { attempt: u32 },
    DeadLettered,
}

/// pending -> retry -> {retry, dead} -> absent (§4.7). Backoff is linear by
/// attempt index: attempt `i` waits `i` seconds.
#[derive(Clone)]
pub struct RetryQueue {
    store: PersistentStore,
    persistence: JobPersistence,
    max_retries: u32,
}

impl RetryQueue {
    pub fn new(store: PersistentStore, persistence: JobPersistence, max_retries: u32) -> Self {
        Self {
            store,
            persistence,
            max_retries,
        }
    }

    /// Enqueue `job` for retry after `reason`. Moves to dead-letter once
    /// `max_retries` attempts have been recorded.
    pub async fn enqueue(&self, job: &Job, reason: impl Into<String>) -> Result<RetryOutcome, StoreError> {
        let reason = reason.into();
        let existing = self
            .store
            .get_json::<RetryRecord>(retry_key(&job.id))
            .await?;
        let attempt = existing.map(|r| r.attempt).unwrap_or(0) + 1;

        if attempt > self.max_retries {
            tracing::warn!(job_id = %job.id, attempt, "max retries exceeded, moving to dead-letter");
            self.persistence.move_to_dead(job).await?;
            return Ok(RetryOutcome::DeadLettered);
        }

        let record = RetryRecord {
            job: job.clone(),
            attempt,
            reason,
            next_retry: Utc::now() + ChronoDuration::seconds(attempt as i64),
        };
        self.store.put_json(retry_key(&job.id), &record).await?;
        // Leaving `pending/<id>` in place would let a job sit in both
        // `pending` and `retry` at once, violating the disjointness
        // invariant (§3/§4.7) until it's redispatched.
        self.store.delete(pending_key(&job.id)).await?;
        Ok(RetryOutcome::Retried { attempt })
    }

    pub async fn due(&self) -> Result<Vec<RetryRecord>, StoreError> {
        let now = Utc::now();
        let rows = self
            .store
            .scan_json::<RetryRecord>(crate::keys::RETRY_PREFIX)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(_, r)| r)
            .filter(|r| r.next_retry <= now)
            .collect())
    }

    /// Clears a matured retry record once its job has been handed back to
    /// the scheduler, so the next poll doesn't redispatch it again. If the
    /// redispatched job fails again, `enqueue` simply recreates the record.
    pub async fn reclaim(&self, job_id: &str) -> Result<(), StoreError> {
        self.store.delete(retry_key(job_id)).await
    }
}
