//! Scheduler / Job Manager (§4.8): a bounded FIFO dispatch queue in front of
//! per-kind handlers, with pending-job persistence and retry/dead-letter
//! wiring around every handler invocation.

pub mod handlers;

use crate::logger::{PipelineLogger, PipelineStep};
use crate::metrics::Metrics;
use async_trait::async_trait;
use eyre::Result;
use oracle_store::{JobPersistence, RetryOutcome, RetryQueue};
use oracle_types::{Job, JobKind};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// One handler per [`JobKind`] (§4.8 a-c). Handlers own whatever chain or
/// external clients they need; the scheduler only knows how to route to
/// them and what to do with the `Result`.
#[async_trait]
pub trait JobHandler: Send + Sync {
    async fn handle(&self, job: &Job) -> Result<()>;
}

pub struct Scheduler {
    handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
    queue_tx: mpsc::Sender<Job>,
    queue_rx: tokio::sync::Mutex<Option<mpsc::Receiver<Job>>>,
    persistence: JobPersistence,
    retry_queue: RetryQueue,
    metrics: Arc<Metrics>,
    logger: PipelineLogger,
}

impl Scheduler {
    pub fn new(
        handlers: HashMap<JobKind, Arc<dyn JobHandler>>,
        persistence: JobPersistence,
        retry_queue: RetryQueue,
        metrics: Arc<Metrics>,
        logger: PipelineLogger,
    ) -> Arc<Self> {
        let (queue_tx, queue_rx) = mpsc::channel(DEFAULT_QUEUE_CAPACITY);
        Arc::new(Self {
            handlers,
            queue_tx,
            queue_rx: tokio::sync::Mutex::new(Some(queue_rx)),
            persistence,
            retry_queue,
            metrics,
            logger,
        })
    }

    /// Persists the job best-effort, then enqueues it. A full queue drops
    /// the job and bumps `jobs_dropped` rather than blocking the caller
    /// (§4.8 step 2).
    pub async fn dispatch(&self, job: Job) {
        if let Err(e) = self.persistence.save_pending(&job).await {
            warn!(job_id = %job.id, error = %e, "failed to persist pending job, dispatching anyway");
        }

        let kind = format!("{:?}", job.kind);
        let _ = self
            .logger
            .log_step(&job.id, PipelineStep::JobDispatched { kind: kind.clone(), subject: job.id.clone() })
            .await;

        match self.queue_tx.try_send(job) {
            Ok(()) => {
                self.metrics.jobs_dispatched.with_label_values(&[&kind]).inc();
            }
            Err(_) => {
                warn!(kind, "scheduler queue full, dropping job");
                self.metrics.jobs_dropped.inc();
            }
        }
    }

    /// Drains any jobs left pending from a previous process (§4.8 step 1),
    /// then runs the consumer loop until `shutdown` resolves.
    pub async fn start(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        match self.persistence.load_all_pending().await {
            Ok(pending) => {
                info!(count = pending.len(), "draining pending jobs from persistence at boot");
                for job in pending {
                    if self.queue_tx.try_send(job).is_err() {
                        warn!("boot-time pending drain hit a full queue, remaining jobs stay persisted");
                        break;
                    }
                }
            }
            Err(e) => warn!(error = %e, "failed to load pending jobs at boot"),
        }

        let mut queue_rx = self
            .queue_rx
            .lock()
            .await
            .take()
            .expect("scheduler consumer loop started more than once");

        loop {
            tokio::select! {
                maybe_job = queue_rx.recv() => {
                    let Some(job) = maybe_job else { break };
                    let scheduler = Arc::clone(&self);
                    tokio::spawn(async move { scheduler.run_job(job).await });
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("scheduler consumer loop stopped");
    }

    /// Polls the retry queue for matured records and redispatches each job
    /// through the normal `dispatch` path, clearing the retry record so it
    /// isn't picked up again on the next tick (§4.7, §5).
    pub async fn run_retry_consumer(self: Arc<Self>, poll_interval: std::time::Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(poll_interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    match self.retry_queue.due().await {
                        Ok(due) => {
                            for record in due {
                                if let Err(e) = self.retry_queue.reclaim(&record.job.id).await {
                                    warn!(job_id = %record.job.id, error = %e, "failed to clear matured retry record");
                                    continue;
                                }
                                info!(job_id = %record.job.id, attempt = record.attempt, "redispatching matured retry");
                                self.dispatch(record.job).await;
                            }
                        }
                        Err(e) => warn!(error = %e, "failed to scan retry queue for due records"),
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("retry consumer loop stopped");
    }

    async fn run_job(self: Arc<Self>, job: Job) {
        let Some(handler) = self.handlers.get(&job.kind).cloned() else {
            warn!(job_id = %job.id, kind = ?job.kind, "no handler registered for job kind");
            return;
        };

        let kind = format!("{:?}", job.kind);
        match handler.handle(&job).await {
            Ok(()) => {
                if let Err(e) = self.persistence.mark_completed(&job.id).await {
                    warn!(job_id = %job.id, error = %e, "failed to clear completed job from persistence");
                }
                self.metrics.jobs_completed.with_label_values(&[&kind]).inc();
            }
            Err(e) => {
                warn!(job_id = %job.id, error = %e, "job handler failed, enqueueing for retry");
                match self.retry_queue.enqueue(&job, e.to_string()).await {
                    Ok(RetryOutcome::DeadLettered) => {
                        self.metrics.jobs_dead_lettered.inc();
                        let _ = self
                            .logger
                            .log_step(
                                &job.id,
                                PipelineStep::JobDeadLettered { subject: job.id.clone(), reason: e.to_string() },
                            )
                            .await;
                    }
                    Ok(RetryOutcome::Retried { .. }) => {}
                    Err(store_err) => {
                        warn!(job_id = %job.id, error = %store_err, "failed to persist retry record");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_store::PersistentStore;
    use oracle_types::JobKind;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    struct CountingHandler {
        calls: StdArc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl JobHandler for CountingHandler {
        async fn handle(&self, _job: &Job) -> Result<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(eyre::eyre!("synthetic handler failure"))
            } else {
                Ok(())
            }
        }
    }

    async fn temp_scheduler(fail: bool) -> (Arc<Scheduler>, StdArc<AtomicUsize>) {
        let dir = tempfile::tempdir().unwrap();
        let backend = oracle_store::SledBackend::open(dir.path().join("db")).unwrap();
        std::mem::forget(dir);
        let store = PersistentStore::new(StdArc::new(backend));
        let persistence = JobPersistence::new(store.clone());
        let retry_queue = RetryQueue::new(store, persistence.clone(), 2);
        let metrics = Metrics::new();
        let logger = PipelineLogger::new(std::env::temp_dir().join("scheduler_test.log")).await.unwrap();

        let calls = StdArc::new(AtomicUsize::new(0));
        let mut handlers: HashMap<JobKind, Arc<dyn JobHandler>> = HashMap::new();
        handlers.insert(JobKind::DataFeed, Arc::new(CountingHandler { calls: calls.clone(), fail }));

        (Scheduler::new(handlers, persistence, retry_queue, metrics, logger), calls)
    }

    #[tokio::test]
    async fn dispatched_job_reaches_its_handler() {
        let (scheduler, calls) = temp_scheduler(false).await;
        let (_tx, rx) = watch::channel(false);
        let runner = tokio::spawn(Arc::clone(&scheduler).start(rx));

        scheduler.dispatch(Job::new("1", JobKind::DataFeed, "test")).await;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        runner.abort();
    }

    #[tokio::test]
    async fn failing_handler_enqueues_a_retry() {
        let (scheduler, calls) = temp_scheduler(true).await;
        let (_tx, rx) = watch::channel(false);
        let runner = tokio::spawn(Arc::clone(&scheduler).start(rx));

        scheduler.dispatch(Job::new("2", JobKind::DataFeed, "test")).await;
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        runner.abort();
    }
}
