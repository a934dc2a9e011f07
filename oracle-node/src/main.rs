//! Oracle node entry point: wires the Persistent Store, Feed Registry,
//! Reputation Registry, Scheduler, Event Listener, OCR Coordinators, and the
//! HTTP/WebSocket surface into the set of long-lived tasks named in §5,
//! then waits on all of them.

use alloy::primitives::Address;
use alloy::signers::Signer;
use eyre::{Result, WrapErr};
use k256::ecdsa::SigningKey;
use oracle_core::{ReputationRegistry, VrfManager};
use oracle_node::api::{self, ws::WsHub, AppState};
use oracle_node::chain_client;
use oracle_node::config::Config;
use oracle_node::event_listener::{self, EventListenerConfig};
use oracle_node::feed_registry::FeedRegistry;
use oracle_node::fetcher::{InMemorySecretVault, ReqwestFetcher};
use oracle_node::logger::PipelineLogger;
use oracle_node::metrics::Metrics;
use oracle_node::ocr::{OcrConfig, OcrCoordinator};
use oracle_node::reorg_protector::ReorgProtector;
use oracle_node::scheduler::handlers::{AggregateHandler, ComputeHandler, DataFeedHandler, VrfHandler};
use oracle_node::scheduler::{JobHandler, Scheduler};
use oracle_node::stake_sync;
use oracle_node::trigger_evaluator::{self, TriggerRegistry};
use oracle_node::{ai_retrain, transaction_manager};
use oracle_store::{JobPersistence, PersistentStore, RetryQueue, SledBackend};
use oracle_types::{FeedConfig, Job, JobKind};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::UnixListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

const OCR_FEEDS: [&str; 2] = ["eth-usd", "btc-usd"];
const TRIGGER_POLL_INTERVAL: Duration = Duration::from_secs(10);
const GAS_PRICE_REFRESH_INTERVAL: Duration = Duration::from_secs(20);
const RETRY_POLL_INTERVAL: Duration = Duration::from_secs(5);
const REORG_CONFIRMATION_DEPTH: u64 = 5;
const MANUAL_INJECT_SOCKET: &str = "/tmp/oracle-node.sock";

#[tokio::main]
async fn main() -> Result<()> {
    fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into())
                .add_directive("oracle_node=debug".parse()?),
        )
        .with_file(true)
        .with_line_number(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(false)
        .init();

    info!("starting oracle node...");

    let config = Config::from_env()?;
    let oracle_contract: Address = config
        .oracle_contract_address
        .parse()
        .wrap_err("ORACLE_CONTRACT_ADDRESS is not a valid address")?;
    let stake_guard: Address = config
        .stake_guard_address
        .parse()
        .wrap_err("STAKE_GUARD_ADDRESS is not a valid address")?;

    let backend = SledBackend::open(&config.db_path).wrap_err("failed to open the persistent store")?;
    let store = PersistentStore::new(Arc::new(backend));
    let persistence = JobPersistence::new(store.clone());
    let retry_queue = RetryQueue::new(store.clone(), persistence.clone(), 5);
    let reputation = ReputationRegistry::with_store(store.clone());
    let feeds = FeedRegistry::new();
    seed_feeds(&feeds);
    let triggers = TriggerRegistry::new();
    let metrics = Metrics::new();
    let logger = PipelineLogger::new(PathBuf::from("oracle_pipeline.log")).await?;

    let reorg = Arc::new(ReorgProtector::new(store.clone(), REORG_CONFIRMATION_DEPTH));
    reorg.recover().await.wrap_err("failed to recover reorg protector state")?;

    let http_url = chain_client::ws_to_http(&config.ethereum_url);
    let provider = chain_client::connect_http(&http_url, &config.private_key)
        .await
        .wrap_err("failed to connect the primary chain provider")?;
    let sender: alloy::signers::local::PrivateKeySigner =
        config.private_key.parse().wrap_err("failed to parse private key")?;
    let sender_address = sender.address();

    let tx_manager = Arc::new(
        transaction_manager::TransactionManager::new(provider, sender_address, logger.clone(), metrics.clone())
            .await
            .wrap_err("failed to initialize the transaction manager")?,
    );
    let tx: Arc<dyn transaction_manager::TxSubmitter> = tx_manager.clone();

    let vrf = Arc::new(VrfManager::from_hex(&config.private_key).wrap_err("failed to derive vrf signing key")?);
    let local_node_id = format!("node-{}", &vrf.public_key_hex()[..8]);

    let fetcher: Arc<dyn oracle_node::fetcher::Fetcher> = Arc::new(ReqwestFetcher::new(Duration::from_secs(10)));
    let vault: Arc<dyn oracle_node::fetcher::SecretVault> = Arc::new(InMemorySecretVault::new());

    let mut handlers: HashMap<JobKind, Arc<dyn JobHandler>> = HashMap::new();
    handlers.insert(
        JobKind::DataFeed,
        Arc::new(DataFeedHandler::new(
            fetcher.clone(),
            vault.clone(),
            feeds.clone(),
            reputation.clone(),
            tx.clone(),
            logger.clone(),
            metrics.clone(),
            persistence.clone(),
            local_node_id.clone(),
            oracle_contract,
        )),
    );
    handlers.insert(JobKind::Vrf, Arc::new(VrfHandler::new(vrf.clone(), tx.clone(), oracle_contract)));
    handlers.insert(JobKind::Compute, Arc::new(ComputeHandler::new(tx.clone(), oracle_contract)));
    handlers.insert(
        JobKind::Aggregate,
        Arc::new(AggregateHandler::new(fetcher.clone(), vault.clone(), feeds.clone(), tx.clone(), oracle_contract)),
    );

    let scheduler = Scheduler::new(handlers, persistence.clone(), retry_queue, metrics.clone(), logger.clone());

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let mut handles = Vec::new();

    handles.push(tokio::spawn(Arc::clone(&scheduler).start(shutdown_rx.clone())));
    handles.push(tokio::spawn(
        Arc::clone(&scheduler).run_retry_consumer(RETRY_POLL_INTERVAL, shutdown_rx.clone()),
    ));

    let listener_config = EventListenerConfig {
        ws_url: config.ethereum_url.clone(),
        private_key_hex: config.private_key.clone(),
        oracle_contract,
    };
    handles.push(tokio::spawn(event_listener::run(
        listener_config,
        reorg.clone(),
        scheduler.clone(),
        logger.clone(),
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(trigger_evaluator::run(
        triggers.clone(),
        feeds.clone(),
        scheduler.clone(),
        TRIGGER_POLL_INTERVAL,
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(transaction_manager::gas_price_refresh_loop(
        tx_manager.clone(),
        GAS_PRICE_REFRESH_INTERVAL,
        shutdown_rx.clone(),
    )));

    handles.push(tokio::spawn(ai_retrain::run(feeds.clone(), shutdown_rx.clone())));

    let stake_sync_provider = chain_client::connect_http(&http_url, &config.private_key)
        .await
        .wrap_err("failed to connect the stake-sync chain provider")?;
    handles.push(tokio::spawn(stake_sync::run(
        stake_sync_provider,
        stake_guard,
        reputation.clone(),
        shutdown_rx.clone(),
    )));

    for feed_id in OCR_FEEDS {
        let signing_key =
            SigningKey::from_slice(&vrf.signing_key_bytes()).wrap_err("failed to build an ocr signing key")?;
        let (coordinator, mut obs_rx, mut report_rx) =
            OcrCoordinator::new(feed_id, OcrConfig::default(), local_node_id.clone(), signing_key);

        handles.push(tokio::spawn(coordinator.clone().run_ticker(shutdown_rx.clone())));

        let obs_coordinator = coordinator.clone();
        let mut obs_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_obs = obs_rx.recv() => {
                        let Some(observation) = maybe_obs else { break };
                        obs_coordinator.handle_observation(observation);
                    }
                    _ = obs_shutdown.changed() => {
                        if *obs_shutdown.borrow() { break; }
                    }
                }
            }
        }));

        let report_tx = tx.clone();
        let report_logger = logger.clone();
        let report_metrics = metrics.clone();
        let mut report_shutdown = shutdown_rx.clone();
        handles.push(tokio::spawn(async move {
            loop {
                tokio::select! {
                    maybe_report = report_rx.recv() => {
                        let Some(report) = maybe_report else { break };
                        report_metrics.ocr_rounds_sealed.inc();
                        let _ = report_logger
                            .log_step(
                                &report.feed_id,
                                oracle_node::logger::PipelineStep::OcrRoundSealed {
                                    round: report.round_id,
                                    feed_id: report.feed_id.clone(),
                                    count: report.observation_count as usize,
                                },
                            )
                            .await;
                        let calldata = alloy::primitives::Bytes::from(serde_json::to_vec(&report).unwrap_or_default());
                        if let Err(e) = report_tx
                            .send(oracle_contract, calldata, alloy::primitives::U256::ZERO, &report.feed_id)
                            .await
                        {
                            warn!(feed_id = %report.feed_id, error = %e, "failed to submit sealed ocr report");
                        }
                    }
                    _ = report_shutdown.changed() => {
                        if *report_shutdown.borrow() { break; }
                    }
                }
            }
        }));
    }

    let ws_hub = WsHub::new();
    let app_state = AppState {
        feeds: feeds.clone(),
        metrics: metrics.clone(),
        persistence: persistence.clone(),
        ws: ws_hub.clone(),
        api_keys: Arc::new(Vec::new()),
    };

    handles.push(tokio::spawn(api::ws::broadcast_loop(feeds.clone(), ws_hub, shutdown_rx.clone())));

    if config.telemetry_mode {
        let router = api::build_router(app_state);
        let port = config.port;
        handles.push(tokio::spawn(async move {
            if let Err(e) = api::serve(router, port).await {
                error!(error = %e, "http/ws server stopped");
            }
        }));
    } else {
        info!("telemetry_mode disabled, skipping http/ws server");
    }

    let _ = fs::remove_file(MANUAL_INJECT_SOCKET);
    let unix_listener = UnixListener::bind(MANUAL_INJECT_SOCKET).wrap_err("failed to bind manual injection socket")?;
    let inject_scheduler = scheduler.clone();
    handles.push(tokio::spawn(async move {
        loop {
            if let Ok((mut socket, _)) = unix_listener.accept().await {
                let scheduler = inject_scheduler.clone();
                tokio::spawn(async move {
                    let mut buf = Vec::new();
                    if socket.read_to_end(&mut buf).await.is_ok() {
                        match serde_json::from_slice::<Job>(&buf) {
                            Ok(job) => scheduler.dispatch(job).await,
                            Err(e) => error!(error = %e, "failed to decode manually injected job"),
                        }
                    }
                });
            }
        }
    }));

    info!("all components initialized and running");

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        warn!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "task panicked");
        }
    }

    warn!("oracle node shutting down");
    Ok(())
}

/// Boot-time feed seeding. spec.md doesn't name an install mechanism beyond
/// the Feed Registry's own `register` API, so a couple of representative
/// feeds are installed directly here — see DESIGN.md.
fn seed_feeds(feeds: &FeedRegistry) {
    let now = chrono::Utc::now();
    for (id, name) in [("eth-usd", "ETH / USD"), ("btc-usd", "BTC / USD")] {
        feeds.register(FeedConfig {
            id: id.to_string(),
            name: name.to_string(),
            decimals: 8,
            min_responses: 3,
            max_responses: 10,
            deviation_threshold_bps: 50,
            heartbeat_secs: 3600,
            sources: vec![format!("https://example.com/price/{id}")],
            aggregation_method: oracle_types::AggregationMethod::Median,
            active: true,
            created_at: now,
            updated_at: now,
        });
    }
}
