use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TriggerKind {
    Threshold,
    Deviation,
    Heartbeat,
}

/// A persistent automation rule (§3). Fires only if `min_interval` has
/// elapsed since `last_triggered`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trigger {
    pub id: String,
    pub kind: TriggerKind,
    pub feed_id: String,
    pub threshold: Option<i128>,
    pub deviation_bps: Option<u32>,
    pub min_interval_secs: u64,
    pub interval_secs: Option<u64>,
    pub last_triggered: Option<DateTime<Utc>>,
    pub last_value: Option<i128>,
    pub active: bool,
}

impl Trigger {
    pub fn can_fire(&self, now: DateTime<Utc>) -> bool {
        if !self.active {
            return false;
        }
        match self.last_triggered {
            None => true,
            Some(last) => {
                (now - last).num_seconds().max(0) as u64 >= self.min_interval_secs
            }
        }
    }

    /// Evaluate this trigger's condition against a freshly observed value.
    /// Returns `true` iff the trigger should fire now (condition holds AND
    /// the min-interval gate in [`Trigger::can_fire`] passes).
    pub fn should_fire(&self, now: DateTime<Utc>, current_value: i128) -> bool {
        if !self.can_fire(now) {
            return false;
        }
        match self.kind {
            TriggerKind::Threshold => self
                .threshold
                .map(|t| current_value >= t)
                .unwrap_or(false),
            TriggerKind::Deviation => match (self.last_value, self.deviation_bps) {
                (Some(last), Some(bps)) if last != 0 => {
                    let delta = (current_value - last).unsigned_abs();
                    let bps_moved = delta.saturating_mul(10_000) / last.unsigned_abs().max(1);
                    bps_moved >= bps as u128
                }
                _ => false,
            },
            TriggerKind::Heartbeat => match (self.last_triggered, self.interval_secs) {
                (Some(last), Some(interval)) => {
                    (now - last).num_seconds().max(0) as u64 >= interval
                }
                (None, _) => true,
                _ => false,
            },
        }
    }
}
