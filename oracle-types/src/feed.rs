use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationMethod {
    Median,
    Mean,
    Mode,
}

/// Static configuration for a feed, installed at boot or by an operator
/// (§4.11). Feeds are deactivated, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    pub id: String,
    pub name: String,
    pub decimals: u8,
    pub min_responses: u32,
    pub max_responses: u32,
    pub deviation_threshold_bps: u32,
    pub heartbeat_secs: u64,
    pub sources: Vec<String>,
    pub aggregation_method: AggregationMethod,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Live read-path cache for a feed, mutated only by the Scheduler on each
/// successful DataFeed fulfillment (§3, §4.8(g)).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedLiveStatus {
    pub feed_id: String,
    pub value_formatted: String,
    pub confidence: f64,
    pub outlier_count: u64,
    pub round_id: u64,
    pub timestamp: DateTime<Utc>,
    pub zk_verified: bool,
    pub is_optimistic: bool,
    pub confidence_interval: String,
}
