//! DataFeed handler (§4.8(a)-(i)): fetch, extract, score, prove, submit.

use crate::feed_registry::FeedRegistry;
use crate::fetcher::{fetch_with_retry, Fetcher, SecretVault};
use crate::logger::{PipelineLogger, PipelineStep};
use crate::metrics::Metrics;
use crate::scheduler::JobHandler;
use crate::transaction_manager::TxSubmitter;
use alloy::primitives::{Address, Bytes, U256};
use async_trait::async_trait;
use eyre::{eyre, Result};
use oracle_core::aggregation::{confidence, is_outlier, population_stddev};
use oracle_core::constants::AI_HISTORY_CAP;
use oracle_core::json_path;
use oracle_core::{ReputationRegistry, ZkProver};
use oracle_store::JobPersistence;
use oracle_types::{FeedLiveStatus, Job, JobRecord, JobStatus};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

const DEFAULT_JSON_PATH: &str = "price";
const DEFAULT_FETCH_ATTEMPTS: u32 = 3;
const DEFAULT_BOUND_MARGIN: i128 = 1_000_000;
const DEFAULT_DECIMALS: u8 = 8;

#[derive(Default)]
struct FeedHistory {
    values: VecDeque<i128>,
    outlier_count: u64,
}

pub struct DataFeedHandler {
    fetcher: Arc<dyn Fetcher>,
    vault: Arc<dyn SecretVault>,
    feeds: FeedRegistry,
    reputation: ReputationRegistry,
    tx: Arc<dyn TxSubmitter>,
    logger: PipelineLogger,
    metrics: Arc<Metrics>,
    persistence: JobPersistence,
    local_node_id: String,
    oracle_contract: Address,
    history: RwLock<HashMap<String, FeedHistory>>,
}

impl DataFeedHandler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        vault: Arc<dyn SecretVault>,
        feeds: FeedRegistry,
        reputation: ReputationRegistry,
        tx: Arc<dyn TxSubmitter>,
        logger: PipelineLogger,
        metrics: Arc<Metrics>,
        persistence: JobPersistence,
        local_node_id: String,
        oracle_contract: Address,
    ) -> Self {
        Self {
            fetcher,
            vault,
            feeds,
            reputation,
            tx,
            logger,
            metrics,
            persistence,
            local_node_id,
            oracle_contract,
            history: RwLock::new(HashMap::new()),
        }
    }

    /// A job carries either an explicit `url` (event-driven request) or a
    /// `feed_id` (trigger re-check), in which case the url comes from the
    /// Feed Registry's first configured source.
    fn resolve_url(&self, job: &Job) -> Option<(String, u8)> {
        if let Some(url) = job.param("url") {
            return Some((url.to_string(), DEFAULT_DECIMALS));
        }
        let feed_id = job.param("feed_id")?;
        let config = self.feeds.get(feed_id)?;
        let url = config.sources.first()?.clone();
        Some((url, config.decimals))
    }

    fn feed_key(&self, job: &Job) -> String {
        job.param("feed_id").unwrap_or(&job.id).to_string()
    }

    fn record_history(&self, feed_key: &str, value: i128) -> (f64, bool) {
        let mut guard = self.history.write().expect("data feed history lock poisoned");
        let entry = guard.entry(feed_key.to_string()).or_default();
        let prior: Vec<i128> = entry.values.iter().copied().collect();
        let sigma_before = population_stddev(&prior);
        let mean_before = if prior.is_empty() {
            value as f64
        } else {
            prior.iter().map(|&v| v as f64).sum::<f64>() / prior.len() as f64
        };
        let distance = (value as f64 - mean_before).abs();
        let outlier = is_outlier(sigma_before, distance);
        if outlier {
            entry.outlier_count += 1;
        }

        entry.values.push_back(value);
        if entry.values.len() > AI_HISTORY_CAP {
            entry.values.pop_front();
        }
        let sigma = population_stddev(&entry.values.iter().copied().collect::<Vec<_>>());
        (sigma, outlier)
    }

    fn outlier_count(&self, feed_key: &str) -> u64 {
        self.history
            .read()
            .expect("data feed history lock poisoned")
            .get(feed_key)
            .map(|h| h.outlier_count)
            .unwrap_or(0)
    }
}

#[async_trait]
impl JobHandler for DataFeedHandler {
    async fn handle(&self, job: &Job) -> Result<()> {
        let Some((url, decimals)) = self.resolve_url(job) else {
            return Err(eyre!("job {} carries neither a url nor a resolvable feed_id", job.id));
        };

        let body = match fetch_with_retry(self.fetcher.as_ref(), self.vault.as_ref(), &url, DEFAULT_FETCH_ATTEMPTS).await {
            Ok(body) => body,
            Err(e) => {
                let _ = self.reputation.adjust(&self.local_node_id, -1).await;
                return Err(eyre!("fetch failed for job {}: {e}", job.id));
            }
        };

        let path = job.param("json_path").unwrap_or(DEFAULT_JSON_PATH);
        let raw = json_path::extract_numeric(&body, path)
            .ok_or_else(|| eyre!("extracted value at '{path}' is missing or non-numeric"))?;
        let scale = 10i128.pow(decimals as u32);
        let value = (raw * scale as f64).round() as i128;

        let feed_key = self.feed_key(job);
        let (sigma, _) = self.record_history(&feed_key, value);
        let conf = confidence(sigma, value);
        let interval = format!("± {:.2}%", if value != 0 { 100.0 * sigma / value as f64 } else { 0.0 });

        self.feeds.update_value(FeedLiveStatus {
            feed_id: feed_key.clone(),
            value_formatted: format_scaled(value, decimals),
            confidence: conf,
            outlier_count: self.outlier_count(&feed_key),
            round_id: job.arrived_at.timestamp() as u64,
            timestamp: chrono::Utc::now(),
            zk_verified: !job.is_optimistic(),
            is_optimistic: job.is_optimistic(),
            confidence_interval: interval,
        });

        let calldata = if job.is_optimistic() {
            encode_fulfillment(&job.id, value, None)
        } else {
            let lo = job
                .param("min")
                .and_then(|s| s.parse::<i128>().ok())
                .unwrap_or(value - DEFAULT_BOUND_MARGIN);
            let hi = job
                .param("max")
                .and_then(|s| s.parse::<i128>().ok())
                .unwrap_or(value + DEFAULT_BOUND_MARGIN);
            let proof = ZkProver::prove_range(value, lo, hi)
                .map_err(|e| eyre!("range proof generation failed for job {}: {e}", job.id))?;
            let _ = self
                .logger
                .log_step(
                    &job.id,
                    PipelineStep::ProofGenerated { circuit: "Range".into(), duration_ms: 0 },
                )
                .await;
            self.metrics.proofs_generated.with_label_values(&["range"]).inc();
            encode_fulfillment(&job.id, value, Some(&proof))
        };

        let to = self.oracle_contract;
        self.tx.send(to, calldata, U256::ZERO, &job.id).await?;

        let _ = self
            .persistence
            .record(&JobRecord {
                id: job.id.clone(),
                kind: job.kind,
                status: JobStatus::Completed,
                summary: format!("fulfilled {feed_key} at {}", format_scaled(value, decimals)),
                updated_at: chrono::Utc::now(),
            })
            .await;

        Ok(())
    }
}

fn format_scaled(value: i128, decimals: u8) -> String {
    let scale = 10i128.pow(decimals as u32);
    let whole = value / scale;
    let frac = (value % scale).unsigned_abs();
    format!("{whole}.{frac:0width$}", width = decimals as usize)
}

fn encode_fulfillment(job_id: &str, value: i128, proof: Option<&oracle_types::Proof>) -> Bytes {
    let payload = json!({
        "job_id": job_id,
        "value": value.to_string(),
        "proof": proof,
    });
    Bytes::from(serde_json::to_vec(&payload).unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_scaled_value_with_decimals() {
        assert_eq!(format_scaled(250_000_000_000, 8), "2500.00000000");
        assert_eq!(format_scaled(5, 2), "0.05");
    }
}
