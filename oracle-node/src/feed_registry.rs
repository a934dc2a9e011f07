//! Feed Registry (§4.11): config install/replace, active-feed listing, and
//! the live-status read-path cache. Guarded by a reader-writer lock (§5).

use chrono::Utc;
use oracle_types::{FeedConfig, FeedLiveStatus};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Clone, Default)]
pub struct FeedRegistry {
    configs: Arc<RwLock<HashMap<String, FeedConfig>>>,
    live: Arc<RwLock<HashMap<String, FeedLiveStatus>>>,
}

impl FeedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Installs or replaces a feed. `created_at` is preserved across a
    /// replace; `updated_at` always bumps to now.
    pub fn register(&self, mut config: FeedConfig) {
        let mut guard = self.configs.write().expect("feed registry lock poisoned");
        if let Some(existing) = guard.get(&config.id) {
            config.created_at = existing.created_at;
        }
        config.updated_at = Utc::now();
        guard.insert(config.id.clone(), config);
    }

    pub fn get(&self, id: &str) -> Option<FeedConfig> {
        self.configs.read().expect("feed registry lock poisoned").get(id).cloned()
    }

    pub fn list_active(&self) -> Vec<FeedConfig> {
        self.configs
            .read()
            .expect("feed registry lock poisoned")
            .values()
            .filter(|f| f.active)
            .cloned()
            .collect()
    }

    pub fn deactivate(&self, id: &str) {
        if let Some(config) = self.configs.write().expect("feed registry lock poisoned").get_mut(id) {
            config.active = false;
            config.updated_at = Utc::now();
        }
    }

    pub fn update_value(&self, status: FeedLiveStatus) {
        self.live
            .write()
            .expect("feed registry lock poisoned")
            .insert(status.feed_id.clone(), status);
    }

    /// Live statuses for active feeds only.
    pub fn live_status(&self) -> Vec<FeedLiveStatus> {
        let configs = self.configs.read().expect("feed registry lock poisoned");
        let live = self.live.read().expect("feed registry lock poisoned");
        live.values()
            .filter(|status| configs.get(&status.feed_id).map(|c| c.active).unwrap_or(false))
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oracle_types::AggregationMethod;

    fn sample_config(id: &str) -> FeedConfig {
        let now = Utc::now();
        FeedConfig {
            id: id.to_string(),
            name: "ETH/USD".into(),
            decimals: 8,
            min_responses: 3,
            max_responses: 10,
            deviation_threshold_bps: 50,
            heartbeat_secs: 3600,
            sources: vec!["https://example.com/price".into()],
            aggregation_method: AggregationMethod::Median,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn replace_preserves_created_at() {
        let registry = FeedRegistry::new();
        let original = sample_config("eth-usd");
        let original_created = original.created_at;
        registry.register(original);

        std::thread::sleep(std::time::Duration::from_millis(5));
        registry.register(sample_config("eth-usd"));

        let replaced = registry.get("eth-usd").unwrap();
        assert_eq!(replaced.created_at, original_created);
        assert!(replaced.updated_at >= original_created);
    }

    #[test]
    fn deactivated_feeds_are_excluded_from_live_status_and_listing() {
        let registry = FeedRegistry::new();
        registry.register(sample_config("eth-usd"));
        registry.update_value(FeedLiveStatus {
            feed_id: "eth-usd".into(),
            value_formatted: "2500.00000000".into(),
            confidence: 99.0,
            outlier_count: 0,
            round_id: 1,
            timestamp: Utc::now(),
            zk_verified: true,
            is_optimistic: false,
            confidence_interval: "± 0.50%".into(),
        });
        assert_eq!(registry.live_status().len(), 1);

        registry.deactivate("eth-usd");
        assert!(registry.list_active().is_empty());
        assert!(registry.live_status().is_empty());
    }
}
