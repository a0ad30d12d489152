//! Process entry point: loads configuration, wires the Price Monitor →
//! Opportunity Detector → Transaction Builder → Execution Engine pipeline
//! over the typed event bus, and runs until a shutdown signal drains it.
//!
//! Grounded on the source's `main.rs` (the `tracing_subscriber::fmt` init
//! call was the only real content there — everything else here is this
//! expansion's first implementation of the wiring that stub left as a
//! `TODO`), plus the `signal-hook`/`signal-hook-tokio` dependency the
//! source already declared but never used, and the `.wallet(wallet)` /
//! `connect_ws`/`connect_http` provider-construction idiom a sibling
//! arbitrage bot's `submit_via_flashbots` setup uses.

use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::signers::local::PrivateKeySigner;
use anyhow::Context;
use clap::Parser;
use flash_arb_engine::builder::TransactionBuilder;
use flash_arb_engine::chain::{AlloyChainClient, AlloyPoolReader};
use flash_arb_engine::config::{Cli, RunMode, RuntimeConfig};
use flash_arb_engine::cost::{CostModel, HttpL1FeeEstimator};
use flash_arb_engine::detector::OpportunityDetector;
use flash_arb_engine::engine::{ChainClient, EngineConfig, ExecutionEngine};
use flash_arb_engine::events::{event_bus, EngineEvent};
use flash_arb_engine::monitor::PriceMonitor;
use flash_arb_engine::nonce::NonceManager;
use flash_arb_engine::store::TradeStore;
use flash_arb_engine::types::ChainConfig;
use futures::stream::StreamExt;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook_tokio::Signals;
use std::path::Path;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio_stream::wrappers::IntervalStream;
use tracing::{error, info, warn};

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
}

fn init_tracing() {
    let filter = std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .json()
        .init();
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    let mode = cli.mode();

    let config = match ChainConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "configuration error at startup");
            std::process::exit(e.exit_code());
        }
    };

    if mode != RunMode::Report && config.executor_address.is_zero() {
        error!("EXECUTOR_ADDRESS must be non-zero outside report-only mode");
        std::process::exit(2);
    }

    if !Path::new(&cli.data_dir).is_dir() {
        error!(data_dir = %cli.data_dir, "data directory does not exist, refusing to start");
        std::process::exit(2);
    }

    if let Err(e) = run(cli, mode, config).await {
        error!(error = %e, "fatal error, shutting down");
        let code = e
            .chain()
            .find_map(|cause| cause.downcast_ref::<flash_arb_engine::error::EngineError>())
            .map(|engine_err| engine_err.exit_code())
            .unwrap_or(3);
        std::process::exit(code);
    }
}

/// Builds the signing identity the provider is constructed with. Returns
/// the wallet alongside its address so callers don't have to re-derive it.
fn load_wallet() -> anyhow::Result<(EthereumWallet, alloy::primitives::Address)> {
    let key = std::env::var("BOT_PRIVATE_KEY").context("BOT_PRIVATE_KEY is required")?;
    let signer: PrivateKeySigner = key.parse().context("invalid BOT_PRIVATE_KEY")?;
    let address = alloy::signers::Signer::address(&signer);
    Ok((EthereumWallet::from(signer), address))
}

async fn run(cli: Cli, mode: RunMode, config: ChainConfig) -> anyhow::Result<()> {
    let data_dir = Path::new(&cli.data_dir);
    let runtime = RuntimeConfig::from_env();
    let rpc_url = std::env::var("RPC_URL").context("RPC_URL is required")?;
    let ws_url = std::env::var("WS_URL").ok();

    // A signing identity is required even in report-only mode so the Monitor
    // and Execution Engine share one concrete provider type; report mode
    // simply never calls `submit`/`send_transaction` on it.
    let (wallet, signer_address) = load_wallet()?;
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .connect_http(rpc_url.parse().context("invalid RPC_URL")?);

    let (events_tx, _events_rx) = event_bus();

    let pool_reader = Arc::new(AlloyPoolReader::new(provider.clone()));
    let monitor = Arc::new(PriceMonitor::new(
        pool_reader,
        config.pools.clone(),
        events_tx.clone(),
        alloy::primitives::U256::from(1_000u64),
        0.3,
    ));

    let mut cost_model = CostModel::new(config.clone());
    if config.is_l2_with_l1_posting {
        if let Ok(oracle_url) = std::env::var("L1_GAS_ORACLE_URL") {
            cost_model.set_l1_estimator(Arc::new(HttpL1FeeEstimator::new(oracle_url)));
        } else {
            warn!("chain profile posts L1 data but L1_GAS_ORACLE_URL is unset, l1DataFee will be zero");
        }
    }
    let detector = Arc::new(OpportunityDetector::new(
        config.clone(),
        cost_model,
        events_tx.clone(),
        runtime.freshness_budget_ms,
    ));

    let tx_builder = TransactionBuilder::new(config.executor_address, config.chain_id, config.adapters.clone());

    let mut nonce_manager = NonceManager::open(data_dir.join("nonce.json"), runtime.pending_nonce_timeout_ms)
        .context("failed to open nonce journal")?;
    let trade_store = TradeStore::open(data_dir.join("trades.ndjson")).context("failed to open trade journal")?;

    // Reconcile the journal against on-chain state before accepting any work,
    // per the restart contract: re-open, sync_from_chain, resume. A journal
    // stuck at u64::MAX nonce is treated as startup-fatal rather than
    // surfacing later as a submit-time circuit trip.
    let startup_chain_client = AlloyChainClient::new(provider.clone());
    let chain_transaction_count = startup_chain_client
        .transaction_count(signer_address)
        .await
        .context("failed to read on-chain transaction count for nonce sync")?;
    let chain_block_number = provider
        .get_block_number()
        .await
        .context("failed to read current block number for nonce sync")?;
    nonce_manager
        .sync_from_chain(chain_transaction_count, chain_block_number)
        .context("failed to sync nonce state from chain")?;
    nonce_manager
        .get_next_nonce()
        .map_err(anyhow::Error::from)
        .context("nonce state corrupted at startup")?;

    let chain_client = AlloyChainClient::new(provider);
    let engine = Arc::new(ExecutionEngine::new(
        chain_client,
        tx_builder,
        nonce_manager,
        trade_store,
        events_tx.clone(),
        EngineConfig {
            mode,
            freshness_budget_ms: runtime.freshness_budget_ms,
            submit_cooldown_ms: runtime.submit_cooldown_ms,
            revert_cooldown_ms: runtime.revert_cooldown_ms,
            confirmation_timeout_ms: runtime.confirmation_timeout_ms,
            max_consecutive_failures: runtime.max_consecutive_failures,
        },
        config.flash_loan_provider,
        signer_address,
        config.gas_price_gwei as u128,
        2u128,
        config.gas_limit,
    ));

    info!(mode = ?mode, pools = config.pools.len(), "flash-arb-engine starting");

    let mut shutdown_signals = Signals::new([SIGINT, SIGTERM]).context("failed to register signal handlers")?;

    let pipeline_handle = tokio::spawn(run_pipeline(detector, engine.clone(), events_tx.subscribe()));
    let poll_handle = tokio::spawn(run_poll_loop(monitor, ws_url, cli.poll_interval_ms));

    shutdown_signals.next().await;
    info!("shutdown signal received, draining pipeline");

    pipeline_handle.abort();
    poll_handle.abort();

    let timeout = std::time::Duration::from_millis(runtime.confirmation_timeout_ms);
    let deadline = tokio::time::Instant::now() + timeout;
    while !pipeline_handle.is_finished() && tokio::time::Instant::now() < deadline {
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    info!("shutdown complete");
    Ok(())
}

/// Timer-driven (or block-subscribed) polling loop. Falls back to the timer
/// whenever the streaming endpoint drops, per the Monitor's `subscribeBlocks`
/// contract.
async fn run_poll_loop<R: flash_arb_engine::monitor::PoolReader>(
    monitor: Arc<PriceMonitor<R>>,
    ws_url: Option<String>,
    poll_interval_ms: u64,
) {
    if let Some(url) = ws_url {
        match ProviderBuilder::new().connect_ws(WsConnect::new(&url)).await {
            Ok(ws_provider) => match ws_provider.subscribe_blocks().await {
                Ok(subscription) => {
                    info!("subscribed to new-block stream, polling on each block");
                    let mut stream = subscription.into_stream();
                    while stream.next().await.is_some() {
                        monitor.poll_once(now_ms()).await;
                    }
                    warn!("block stream ended, falling back to timer polling");
                }
                Err(e) => warn!(error = %e, "subscribeBlocks failed, falling back to timer polling"),
            },
            Err(e) => warn!(url = %url, error = %e, "WS_URL connect failed, falling back to timer polling"),
        }
    }

    let interval = tokio::time::interval(std::time::Duration::from_millis(poll_interval_ms));
    let mut ticks = IntervalStream::new(interval);
    while ticks.next().await.is_some() {
        monitor.poll_once(now_ms()).await;
    }
}

/// Consumes the event bus: deltas feed the Detector, accepted opportunities
/// feed the Execution Engine.
async fn run_pipeline<C: flash_arb_engine::engine::ChainClient>(
    detector: Arc<OpportunityDetector>,
    engine: Arc<ExecutionEngine<C>>,
    mut events_rx: tokio::sync::broadcast::Receiver<EngineEvent>,
) {
    loop {
        match events_rx.recv().await {
            Ok(EngineEvent::Delta(delta)) => {
                let now = now_ms();
                if let Ok(opportunity) = detector.analyze(delta, now).await {
                    if let Err(rejection) = engine.handle(opportunity, now).await {
                        info!(reason = %rejection, "opportunity rejected at execution gate");
                    }
                }
            }
            Ok(EngineEvent::Error { message }) => error!(message, "engine error event"),
            Ok(_) => {}
            Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped, "pipeline event receiver lagged, some events dropped");
            }
            Err(tokio::sync::broadcast::error::RecvError::Closed) => break,
        }
    }
}
