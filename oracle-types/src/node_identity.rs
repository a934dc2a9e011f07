use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A peer's public identity as tracked by other nodes — never carries the
/// private signing key (§3: "Private key is loaded once and never logged").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeIdentity {
    pub node_id: String,
    pub pubkey: String,
    pub reputation: u8,
    pub last_seen: DateTime<Utc>,
    pub active: bool,
}
