use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// What a [`Job`] asks a handler to do. One handler per kind, dispatched by
/// the Scheduler (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobKind {
    DataFeed,
    Vrf,
    Compute,
    Aggregate,
}

/// Lifecycle state of a [`Job`] in the store. Pending, completed and dead
/// are disjoint (§3): a job occupies exactly one at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Retrying,
    Completed,
    Dead,
}

/// Free-form parameters a job carries from the triggering event. Kept as a
/// string map rather than per-kind structs so the Event Listener doesn't
/// need to know every handler's shape — handlers validate what they need.
pub type JobParams = HashMap<String, String>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    /// Decimal string request ID — the key under which this job is stored.
    pub id: String,
    pub kind: JobKind,
    pub requester: String,
    pub params: JobParams,
    pub arrived_at: DateTime<Utc>,
    pub status: JobStatus,
}

impl Job {
    pub fn new(id: impl Into<String>, kind: JobKind, requester: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            requester: requester.into(),
            params: JobParams::new(),
            arrived_at: Utc::now(),
            status: JobStatus::Pending,
        }
    }

    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(|s| s.as_str())
    }

    pub fn is_optimistic(&self) -> bool {
        self.param("optimistic").map(|v| v == "true").unwrap_or(false)
    }
}

/// A record of a job as surfaced on the operator-facing `/api/jobs` view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub summary: String,
    pub updated_at: DateTime<Utc>,
}
