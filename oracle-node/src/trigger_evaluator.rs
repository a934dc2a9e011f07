//! Trigger evaluation loop (SPEC_FULL §C.3): a long-lived task that scans
//! active triggers and fires synthetic jobs when a Threshold/Deviation/
//! Heartbeat condition holds.

use crate::feed_registry::FeedRegistry;
use crate::scheduler::Scheduler;
use chrono::Utc;
use oracle_types::{Job, JobKind, Trigger};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

#[derive(Clone, Default)]
pub struct TriggerRegistry {
    triggers: Arc<RwLock<HashMap<String, Trigger>>>,
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn install(&self, trigger: Trigger) {
        self.triggers
            .write()
            .expect("trigger registry lock poisoned")
            .insert(trigger.id.clone(), trigger);
    }

    fn snapshot(&self) -> Vec<Trigger> {
        self.triggers
            .read()
            .expect("trigger registry lock poisoned")
            .values()
            .filter(|t| t.active)
            .cloned()
            .collect()
    }

    fn record_fired(&self, id: &str, value: i128) {
        if let Some(trigger) = self.triggers.write().expect("trigger registry lock poisoned").get_mut(id) {
            trigger.last_triggered = Some(Utc::now());
            trigger.last_value = Some(value);
        }
    }
}

/// Polls every trigger against the feed registry's current live value and
/// dispatches a synthetic `DataFeed` re-check job on every trigger that
/// fires. Runs until `shutdown` resolves.
pub async fn run(
    triggers: TriggerRegistry,
    feeds: FeedRegistry,
    scheduler: Arc<Scheduler>,
    poll_interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("trigger evaluation loop started");
    let mut ticker = tokio::time::interval(poll_interval);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        let now = Utc::now();
        for trigger in triggers.snapshot() {
            let Some(status) = feeds.live_status().into_iter().find(|s| s.feed_id == trigger.feed_id) else {
                continue;
            };
            let Ok(current_value) = status.value_formatted.replace('.', "").parse::<i128>() else {
                continue;
            };
            if trigger.should_fire(now, current_value) {
                debug!(trigger_id = %trigger.id, feed_id = %trigger.feed_id, "trigger fired");
                triggers.record_fired(&trigger.id, current_value);
                let job = Job::new(format!("trigger-{}-{}", trigger.id, now.timestamp_millis()), JobKind::DataFeed, "trigger-evaluator")
                    .with_param("feed_id", trigger.feed_id.clone())
                    .with_param("trigger_id", trigger.id.clone());
                scheduler.dispatch(job).await;
            }
        }
    }
    info!("trigger evaluation loop stopped");
}
