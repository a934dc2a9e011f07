//! Transaction Manager (§4.5): one in-flight submission per process at a
//! time, nonce serialized by a held mutex, a single corrective retry on
//! observed nonce reuse.

use crate::logger::{PipelineLogger, PipelineStep};
use crate::metrics::Metrics;
use alloy::{
    network::TransactionBuilder,
    primitives::{Address, Bytes, TxHash, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
};
use async_trait::async_trait;
use eyre::{eyre, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

const DEFAULT_GAS_CEILING: u64 = 500_000;

/// Object-safe submission surface so job handlers don't need to be generic
/// over the concrete provider type (§4.5, §4.8).
#[async_trait]
pub trait TxSubmitter: Send + Sync {
    async fn send(&self, to: Address, calldata: Bytes, value: U256, subject: &str) -> Result<TxHash>;
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync> TxSubmitter for TransactionManager<P> {
    async fn send(&self, to: Address, calldata: Bytes, value: U256, subject: &str) -> Result<TxHash> {
        TransactionManager::send(self, to, calldata, value, subject).await
    }
}

struct NonceState {
    nonce: u64,
}

pub struct TransactionManager<P: Provider + Clone> {
    provider: P,
    sender: Address,
    gas_ceiling: AtomicU64,
    gas_price_wei: AtomicU64,
    state: Mutex<NonceState>,
    logger: PipelineLogger,
    metrics: Arc<Metrics>,
}

impl<P: Provider + Clone> TransactionManager<P> {
    pub async fn new(provider: P, sender: Address, logger: PipelineLogger, metrics: Arc<Metrics>) -> Result<Self> {
        let nonce = provider.get_transaction_count(sender).await?;
        Ok(Self {
            provider,
            sender,
            gas_ceiling: AtomicU64::new(DEFAULT_GAS_CEILING),
            gas_price_wei: AtomicU64::new(0),
            state: Mutex::new(NonceState { nonce }),
            logger,
            metrics,
        })
    }

    /// Gas-price-refresh loop target (§5 "one gas-price-refresh loop"):
    /// re-reads the network's suggested gas price and caches it so
    /// `send_with_nonce` doesn't round-trip to the RPC on the legacy path
    /// when the filler stack's own per-call estimate is unavailable.
    pub async fn refresh_gas_price(&self) -> Result<()> {
        let price: u128 = self.provider.get_gas_price().await?;
        self.gas_price_wei.store(price.min(u64::MAX as u128) as u64, Ordering::Relaxed);
        Ok(())
    }

    /// Signs, submits, and (best-effort) retries once on nonce-too-low, all
    /// under the held mutex so submissions are strictly serialized (§4.5).
    pub async fn send(&self, to: Address, calldata: Bytes, value: U256, subject: &str) -> Result<TxHash> {
        let mut guard = self.state.lock().await;
        match self.send_with_nonce(to, calldata.clone(), value, guard.nonce).await {
            Ok(tx_hash) => {
                guard.nonce += 1;
                self.metrics.tx_submitted.inc();
                let _ = self
                    .logger
                    .log_step(
                        subject,
                        PipelineStep::TransactionSubmitted {
                            tx_hash: format!("{tx_hash:#x}"),
                            method: "fulfill".into(),
                        },
                    )
                    .await;
                Ok(tx_hash)
            }
            Err(e) if is_nonce_too_low(&e) => {
                warn!(subject, "nonce too low, re-reading pending nonce and retrying once");
                let fresh_nonce = self.provider.get_transaction_count(self.sender).await?;
                guard.nonce = fresh_nonce;
                let tx_hash = self.send_with_nonce(to, calldata, value, guard.nonce).await?;
                guard.nonce += 1;
                self.metrics.tx_submitted.inc();
                Ok(tx_hash)
            }
            Err(e) => {
                self.metrics.tx_failed.inc();
                let _ = self
                    .logger
                    .log_step(
                        subject,
                        PipelineStep::TransactionFailed {
                            subject: subject.to_string(),
                            error: e.to_string(),
                        },
                    )
                    .await;
                Err(e)
            }
        }
    }

    async fn send_with_nonce(&self, to: Address, calldata: Bytes, value: U256, nonce: u64) -> Result<TxHash> {
        let mut tx = TransactionRequest::default()
            .with_to(to)
            .with_input(calldata)
            .with_value(value)
            .with_nonce(nonce)
            .with_from(self.sender);

        let gas = self
            .provider
            .estimate_gas(&tx)
            .await
            .unwrap_or_else(|_| self.gas_ceiling.load(Ordering::Relaxed));
        tx = tx.with_gas_limit(gas);

        let cached_price = self.gas_price_wei.load(Ordering::Relaxed);
        if cached_price > 0 {
            tx = tx.with_gas_price(cached_price as u128);
        }

        let pending = self.provider.send_transaction(tx).await?;
        Ok(*pending.tx_hash())
    }
}

fn is_nonce_too_low(err: &eyre::Report) -> bool {
    err.to_string().to_lowercase().contains("nonce too low")
}

/// Long-lived gas-price-refresh loop (§5). Runs until `shutdown` resolves.
pub async fn gas_price_refresh_loop<P: Provider + Clone + Send + Sync>(
    manager: Arc<TransactionManager<P>>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = manager.refresh_gas_price().await {
                    warn!(error = %e, "gas price refresh failed, keeping previous value");
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("gas price refresh loop stopped");
}

/// Awaits on-chain inclusion for callers that need the receipt (§4.5 step
/// 7 is opt-in, not folded into `send`).
pub async fn await_inclusion<P: Provider>(provider: &P, tx_hash: TxHash) -> Result<u64> {
    let receipt = provider
        .get_transaction_receipt(tx_hash)
        .await?
        .ok_or_else(|| eyre!("transaction {tx_hash:#x} has no receipt yet"))?;
    Ok(receipt.block_number.unwrap_or_default())
}
