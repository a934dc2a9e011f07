//! Event Listener (§4.9): dial-reconnect over WS (HTTP log-polling fallback),
//! subscribe to the oracle contract's logs, decode into Jobs, gate through
//! the Reorg Protector. Generalized from a single configured event
//! signature to the two this node supports.

use crate::chain_client::{self, HttpChainProvider, WsChainProvider};
use crate::logger::{PipelineLogger, PipelineStep};
use crate::reorg_protector::ReorgProtector;
use crate::scheduler::Scheduler;
use alloy::primitives::Address;
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use alloy::sol_types::SolEvent;
use eyre::Result;
use futures_util::StreamExt;
use oracle_types::{EventId, Job, JobKind};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

alloy::sol! {
    event RequestData(uint256 indexed requestId, string apiUrl, uint256 min, uint256 max, address indexed requester, bool oevEnabled, address oevBeneficiary, bool isOptimistic);
    event RandomnessRequested(uint256 indexed requestId, string seed, address indexed requester);
}

const REDIAL_BACKOFF: Duration = Duration::from_secs(10);
const HTTP_POLL_INTERVAL: Duration = Duration::from_secs(5);

pub struct EventListenerConfig {
    pub ws_url: String,
    pub private_key_hex: String,
    pub oracle_contract: Address,
}

pub async fn run(
    config: EventListenerConfig,
    reorg: Arc<ReorgProtector>,
    scheduler: Arc<Scheduler>,
    logger: PipelineLogger,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        if *shutdown.borrow() {
            break;
        }

        match chain_client::connect_ws(&config.ws_url, &config.private_key_hex).await {
            Ok(provider) => {
                info!("event listener connected over websocket");
                if let Err(e) = run_ws(&provider, &config, &reorg, &scheduler, &logger, &mut shutdown).await {
                    warn!(error = %e, "websocket subscription ended, will redial");
                }
            }
            Err(e) => {
                warn!(error = %e, "websocket dial failed, falling back to http polling");
                let http_url = chain_client::ws_to_http(&config.ws_url);
                match chain_client::connect_http(&http_url, &config.private_key_hex).await {
                    Ok(provider) => {
                        if let Err(e) = run_http_polling(&provider, &config, &reorg, &scheduler, &logger, &mut shutdown).await {
                            warn!(error = %e, "http polling ended, will redial");
                        }
                    }
                    Err(e) => error!(error = %e, "http fallback dial also failed"),
                }
            }
        }

        if *shutdown.borrow() {
            break;
        }
        tokio::time::sleep(REDIAL_BACKOFF).await;
    }
    info!("event listener stopped");
}

async fn run_ws(
    provider: &WsChainProvider,
    config: &EventListenerConfig,
    reorg: &Arc<ReorgProtector>,
    scheduler: &Arc<Scheduler>,
    logger: &PipelineLogger,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    let filter = Filter::new().address(config.oracle_contract);
    let sub = provider.subscribe_logs(&filter).await?;
    let mut stream = sub.into_stream();

    loop {
        tokio::select! {
            maybe_log = stream.next() => {
                let Some(log) = maybe_log else {
                    warn!("log stream ended unexpectedly");
                    return Ok(());
                };
                handle_log(log, provider, reorg, scheduler, logger).await;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

async fn run_http_polling(
    provider: &HttpChainProvider,
    config: &EventListenerConfig,
    reorg: &Arc<ReorgProtector>,
    scheduler: &Arc<Scheduler>,
    logger: &PipelineLogger,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    let mut from_block = provider.get_block_number().await?;
    let mut ticker = tokio::time::interval(HTTP_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let head = provider.get_block_number().await?;
                if head < from_block {
                    continue;
                }
                let filter = Filter::new().address(config.oracle_contract).from_block(from_block).to_block(head);
                let logs = provider.get_logs(&filter).await?;
                for log in logs {
                    handle_log(log, provider, reorg, scheduler, logger).await;
                }
                from_block = head + 1;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    return Ok(());
                }
            }
        }
    }
}

async fn handle_log<P: Provider>(
    log: Log,
    provider: &P,
    reorg: &Arc<ReorgProtector>,
    scheduler: &Arc<Scheduler>,
    logger: &PipelineLogger,
) {
    let Some(topic0) = log.topics().first().copied() else {
        return;
    };
    let Some(tx_hash) = log.transaction_hash else {
        return;
    };
    let Some(block_number) = log.block_number.and_then(|b| u64::try_from(b).ok()) else {
        return;
    };
    let log_index = log.log_index.unwrap_or_default();
    let event_id = EventId::new(format!("{tx_hash:#x}"), log_index);

    let head_height = match provider.get_block_number().await {
        Ok(height) => height,
        Err(e) => {
            warn!(error = %e, "failed to read head height, skipping log until next tick");
            return;
        }
    };
    if !reorg.should_process(block_number, &event_id, head_height) {
        debug!(%event_id, "event suppressed by reorg protector");
        return;
    }

    let job = if topic0 == RequestData::SIGNATURE_HASH {
        match RequestData::decode_log(&log.inner, true) {
            Ok(decoded) => Some(
                Job::new(decoded.requestId.to_string(), JobKind::DataFeed, decoded.requester.to_string())
                    .with_param("url", decoded.apiUrl.clone())
                    .with_param("min", decoded.min.to_string())
                    .with_param("max", decoded.max.to_string())
                    .with_param("optimistic", decoded.isOptimistic.to_string())
                    .with_param("oev_enabled", decoded.oevEnabled.to_string())
                    .with_param("oev_beneficiary", decoded.oevBeneficiary.to_string()),
            ),
            Err(e) => {
                warn!(error = %e, "failed to decode RequestData log");
                None
            }
        }
    } else if topic0 == RandomnessRequested::SIGNATURE_HASH {
        match RandomnessRequested::decode_log(&log.inner, true) {
            Ok(decoded) => Some(
                Job::new(decoded.requestId.to_string(), JobKind::Vrf, decoded.requester.to_string())
                    .with_param("seed", decoded.seed.clone()),
            ),
            Err(e) => {
                warn!(error = %e, "failed to decode RandomnessRequested log");
                None
            }
        }
    } else {
        None
    };

    let Some(job) = job else {
        return;
    };

    let _ = logger
        .log_step(&job.id, PipelineStep::EventReceived { kind: format!("{:?}", job.kind), subject: job.id.clone() })
        .await;

    if let Err(e) = reorg.mark_processed(block_number, event_id).await {
        warn!(error = %e, "failed to persist reorg protector state");
    }
    scheduler.dispatch(job).await;
}
