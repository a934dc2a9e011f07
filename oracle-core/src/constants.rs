//! Tunable defaults: channel capacities and retry/backoff knobs.

/// §4.12 — z-score threshold on the read path (feed live-status, dashboards).
pub const ZSCORE_THRESHOLD_READ: f64 = 1.5;
/// §4.12 — z-score threshold on the security path (fulfillment value).
pub const ZSCORE_THRESHOLD_SECURITY: f64 = 2.0;
/// Below this sample count, z-score filtering is a no-op (§4.12).
pub const ZSCORE_MIN_SAMPLES: usize = 3;

/// §4.2 — default reputation score for a node never seen before.
pub const DEFAULT_REPUTATION: u8 = 50;
pub const REPUTATION_TRUSTED_THRESHOLD: u8 = 80;
pub const REPUTATION_SLASH_THRESHOLD: u8 = 20;
pub const REPUTATION_MIN: u8 = 0;
pub const REPUTATION_MAX: u8 = 100;

/// §4.3 — every proof serializes to exactly this many field scalars.
pub const PROOF_SCALAR_COUNT: usize = oracle_types::PROOF_SCALAR_COUNT;

/// §4.8(e) — AI history ring capacity per feed.
pub const AI_HISTORY_CAP: usize = 1000;
