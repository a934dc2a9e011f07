use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A peer's vote in an OCR round (§3). `round_id <= current round` and the
/// signature must verify before the observation is admitted into a round's
/// map — both enforced by the caller, not by this type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Observation {
    pub feed_id: String,
    pub round_id: u64,
    pub value: i128,
    pub timestamp: DateTime<Utc>,
    /// Hex-encoded signature over `(feed_id, round_id, value, timestamp)`.
    pub signature: String,
    /// Hex-encoded compressed public key of the submitting node.
    pub pubkey: String,
    pub node_id: String,
}
