//! Well-known key prefixes (§6: "Persisted state"). Every record in the
//! store lives under one of these so `scan(prefix)` recovers the logical
//! set.

pub const PENDING_PREFIX: &str = "pending/";
pub const RETRY_PREFIX: &str = "retry/";
pub const DEAD_PREFIX: &str = "dead/";
pub const REPUTATION_PREFIX: &str = "reputation/";
pub const JOB_RECORD_PREFIX: &str = "job/";
pub const KV_PREFIX: &str = "kv/";
pub const LAST_PROCESSED_BLOCK_KEY: &str = "__last_processed_block";

pub fn pending_key(id: &str) -> String {
    format!("{PENDING_PREFIX}{id}")
}

pub fn retry_key(id: &str) -> String {
    format!("{RETRY_PREFIX}{id}")
}

pub fn dead_key(id: &str) -> String {
    format!("{DEAD_PREFIX}{id}")
}

pub fn job_record_key(id: &str) -> String {
    format!("{JOB_RECORD_PREFIX}{id}")
}

pub fn reputation_key(node_id: &str) -> String {
    format!("{REPUTATION_PREFIX}{node_id}")
}
