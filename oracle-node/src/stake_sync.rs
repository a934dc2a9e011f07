//! Stake-sync log loop (§5 "one stake-sync log loop"): watches the stake
//! guard contract for `Staked`/`Slashed` events and reflects them onto the
//! Reputation Registry. Polling-only (unlike the Event Listener's WS-first
//! dial-reconnect) since this is a secondary monitoring loop over a
//! contract this node never submits to.

use crate::chain_client::HttpChainProvider;
use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::types::Filter;
use alloy::sol_types::SolEvent;
use oracle_core::ReputationRegistry;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

alloy::sol! {
    event Staked(address indexed node, uint256 amount);
    event Slashed(address indexed node, uint256 amount);
}

const POLL_INTERVAL: Duration = Duration::from_secs(15);
const STAKE_REPUTATION_BONUS: i16 = 1;
const SLASH_REPUTATION_PENALTY: i16 = -20;

pub async fn run(
    provider: HttpChainProvider,
    stake_guard: Address,
    reputation: ReputationRegistry,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut from_block = match provider.get_block_number().await {
        Ok(b) => b,
        Err(e) => {
            warn!(error = %e, "stake sync failed to read starting block, loop exiting");
            return;
        }
    };
    let mut ticker = tokio::time::interval(POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let head = match provider.get_block_number().await {
                    Ok(h) => h,
                    Err(e) => {
                        warn!(error = %e, "stake sync failed to read head height");
                        continue;
                    }
                };
                if head < from_block {
                    continue;
                }
                let filter = Filter::new().address(stake_guard).from_block(from_block).to_block(head);
                let logs = match provider.get_logs(&filter).await {
                    Ok(logs) => logs,
                    Err(e) => {
                        warn!(error = %e, "stake sync log fetch failed");
                        continue;
                    }
                };
                for log in logs {
                    let Some(topic0) = log.topics().first().copied() else { continue };
                    if topic0 == Staked::SIGNATURE_HASH {
                        if let Ok(decoded) = Staked::decode_log(&log.inner, true) {
                            info!(node = %decoded.node, amount = %decoded.amount, "stake increase observed");
                            let _ = reputation.adjust(&decoded.node.to_string(), STAKE_REPUTATION_BONUS).await;
                        }
                    } else if topic0 == Slashed::SIGNATURE_HASH {
                        if let Ok(decoded) = Slashed::decode_log(&log.inner, true) {
                            warn!(node = %decoded.node, amount = %decoded.amount, "slash observed");
                            let _ = reputation.adjust(&decoded.node.to_string(), SLASH_REPUTATION_PENALTY).await;
                        }
                    }
                }
                from_block = head + 1;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    info!("stake sync loop stopped");
}
