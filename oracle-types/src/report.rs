use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A node's signature over a sealed report's hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportSignature {
    pub node_id: String,
    pub pubkey: String,
    pub signature: String,
}

/// The sealed output of one OCR round (§3). `|signatures| >= threshold` is
/// an invariant enforced by the coordinator before a report is ever
/// constructed — this type does not re-check it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub round_id: u64,
    pub feed_id: String,
    pub aggregated_value: i128,
    pub timestamp: DateTime<Utc>,
    pub leader: String,
    pub epoch: u64,
    pub observation_count: u32,
    pub signatures: Vec<ReportSignature>,
    /// Hex-encoded hash of `(round_id, aggregated_value, timestamp, observation_count)`.
    pub hash: String,
}
