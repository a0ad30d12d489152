//! Execution Engine: the REPORT / SHADOW / LIVE state machine that turns an
//! accepted `ArbitrageOpportunity` into either a log line, a pre-broadcast
//! simulation, or a submitted-and-confirmed on-chain transaction.
//!
//! The dry-run branch and approve-then-swap shape are grounded on the
//! teacher's `arbitrage/executor.rs::TradeExecutor::execute`/`simulate_execution`;
//! the flash-loan-atomic single-transaction design replaces the teacher's
//! two-sequential-legs approach (which carries leg risk) because the new
//! on-chain executor owns atomicity within one call. The submit-then-confirm
//! polling loop follows the same shape as a sibling arbitrage bot's
//! `submit_via_flashbots`/`monitor_transaction_confirmation`, generalized to a
//! single injectable `ChainClient` rather than a primary/backup relay pair.

use crate::builder::{PreparedTransaction, Transaction, TransactionBuilder};
use crate::config::RunMode;
use crate::cooldown::RouteCooldown;
use crate::error::EngineError;
use crate::events::EngineEvent;
use crate::nonce::{NonceManager, PendingStatus};
use crate::store::TradeStore;
use crate::types::{ArbitrageOpportunity, TradeOutcome, TradeStatus};
use alloy::primitives::Address;
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::Sender;
use tokio::time::timeout as tokio_timeout;
use tracing::{error, info, warn};

/// Outcome of a confirmed on-chain submission, independent of the concrete
/// transport. A fake implementation drives the engine's tests the same way
/// an in-memory `PoolReader` fake drives the Monitor's.
#[derive(Debug, Clone)]
pub struct Receipt {
    pub success: bool,
    pub gas_used: u64,
    pub effective_gas_price_wei: u128,
    pub block_number: u64,
    pub revert_reason: Option<String>,
}

/// Chain-transport boundary the Engine depends on instead of a concrete RPC
/// client/signer pair, mirroring the Monitor's `PoolReader` trait.
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64>;
    /// eth-call-style speculative execution. `Err` means the call reverted.
    async fn simulate(&self, tx: &PreparedTransaction, from: Address) -> anyhow::Result<()>;
    /// Broadcasts the transaction, returning its hash.
    async fn submit(&self, tx: &PreparedTransaction, from: Address) -> anyhow::Result<String>;
    async fn wait_for_receipt(&self, tx_hash: &str, timeout: Duration) -> anyhow::Result<Receipt>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineRejection {
    Stale,
    Cooldown,
    RevertSkip,
    CircuitOpen,
}

impl std::fmt::Display for EngineRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EngineRejection::Stale => write!(f, "stale"),
            EngineRejection::Cooldown => write!(f, "cooldown"),
            EngineRejection::RevertSkip => write!(f, "revert-skip"),
            EngineRejection::CircuitOpen => write!(f, "circuit-open"),
        }
    }
}

pub struct EngineConfig {
    pub mode: RunMode,
    pub freshness_budget_ms: u64,
    pub submit_cooldown_ms: u64,
    pub revert_cooldown_ms: u64,
    pub confirmation_timeout_ms: u64,
    pub max_consecutive_failures: u32,
}

pub struct ExecutionEngine<C: ChainClient> {
    client: C,
    builder: TransactionBuilder,
    nonce_manager: Mutex<NonceManager>,
    trade_store: TradeStore,
    events: Sender<EngineEvent>,
    config: EngineConfig,
    flash_loan_provider: Address,
    signer_address: Address,
    base_fee_gwei: u128,
    priority_tip_gwei: u128,
    gas_limit: u64,

    submit_cooldowns: DashMap<String, Instant>,
    revert_cooldowns: DashMap<String, Instant>,
    route_cooldown: Mutex<RouteCooldown>,
    consecutive_failures: AtomicU32,
    circuit_open: std::sync::atomic::AtomicBool,
}

impl<C: ChainClient> ExecutionEngine<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: C,
        builder: TransactionBuilder,
        nonce_manager: NonceManager,
        trade_store: TradeStore,
        events: Sender<EngineEvent>,
        config: EngineConfig,
        flash_loan_provider: Address,
        signer_address: Address,
        base_fee_gwei: u128,
        priority_tip_gwei: u128,
        gas_limit: u64,
    ) -> Self {
        Self {
            client,
            builder,
            nonce_manager: Mutex::new(nonce_manager),
            trade_store,
            events,
            config,
            flash_loan_provider,
            signer_address,
            base_fee_gwei,
            priority_tip_gwei,
            gas_limit,
            submit_cooldowns: DashMap::new(),
            revert_cooldowns: DashMap::new(),
            route_cooldown: Mutex::new(RouteCooldown::new(Duration::from_millis(10_000))),
            consecutive_failures: AtomicU32::new(0),
            circuit_open: std::sync::atomic::AtomicBool::new(false),
        }
    }

    /// Routes `opportunity` through whichever mode the engine was constructed
    /// with. Returns `Ok(())` on a handled opportunity (including a clean
    /// report/simulation), `Err(EngineRejection)` when a LIVE-only gate
    /// rejected it before submission.
    pub async fn handle(&self, opportunity: ArbitrageOpportunity, now_ms: u64) -> Result<(), EngineRejection> {
        match self.config.mode {
            RunMode::Report => {
                self.report_only(&opportunity);
                Ok(())
            }
            RunMode::Shadow => {
                self.shadow(&opportunity).await;
                Ok(())
            }
            RunMode::Live => self.live(opportunity, now_ms).await,
        }
    }

    fn report_only(&self, opportunity: &ArbitrageOpportunity) {
        info!(
            id = %opportunity.id,
            pair = %opportunity.price_delta.pair,
            net_profit = opportunity.net_profit,
            "report-only: opportunity would be executed"
        );
    }

    fn pair_of(&self, opportunity: &ArbitrageOpportunity) -> String {
        opportunity.price_delta.pair.clone()
    }

    fn build_and_prepare(&self, opportunity: &ArbitrageOpportunity, nonce: u64) -> Result<PreparedTransaction, EngineError> {
        let tx: Transaction = self
            .builder
            .build_arbitrage_transaction(opportunity, self.flash_loan_provider)?;
        let base_fee_wei = self.base_fee_gwei * 1_000_000_000;
        let priority_tip_wei = self.priority_tip_gwei * 1_000_000_000;
        self.builder
            .prepare_transaction(tx, base_fee_wei, priority_tip_wei, self.gas_limit, nonce)
    }

    /// Pre-broadcast call: treats any revert as `simulation_revert`. A
    /// successful call is logged but not journaled — without decoding the
    /// executor's return payload there is nothing concrete to record besides
    /// "it didn't revert" (see the simulation-accuracy Open Question).
    async fn shadow(&self, opportunity: &ArbitrageOpportunity) {
        let pair = self.pair_of(opportunity);
        let nonce = self
            .nonce_manager
            .lock()
            .unwrap()
            .get_next_nonce()
            .map(|(n, _)| n)
            .unwrap_or(0);

        let prepared = match self.build_and_prepare(opportunity, nonce) {
            Ok(p) => p,
            Err(e) => {
                warn!(pair = %pair, error = %e, "shadow: failed to build transaction");
                return;
            }
        };

        match self.client.simulate(&prepared, self.signer_address).await {
            Ok(()) => {
                info!(pair = %pair, id = %opportunity.id, "shadow: simulation succeeded");
                self.route_cooldown.lock().unwrap().record_success(&route_key(opportunity));
            }
            Err(e) => {
                warn!(pair = %pair, error = %e, "shadow: simulation reverted");
                let outcome = simulation_revert_outcome(opportunity, format!("SIMULATED-{}", opportunity.id));
                if let Err(store_err) = self.trade_store.append(&outcome) {
                    error!(error = %store_err, "failed to journal simulation revert");
                }
                let _ = self.events.send(EngineEvent::Reverted { pair: pair.clone(), outcome });
                self.route_cooldown.lock().unwrap().record_failure(route_key(opportunity), Instant::now());
            }
        }
    }

    /// Full LIVE submission sequence: nonce acquisition, build, cooldown
    /// arming, submit, confirm, journal. Gated by freshness, cooldowns, and
    /// the circuit breaker before anything touches the chain.
    async fn live(&self, opportunity: ArbitrageOpportunity, now_ms: u64) -> Result<(), EngineRejection> {
        let pair = self.pair_of(&opportunity);

        if now_ms.saturating_sub(opportunity.detected_at_ms) > self.config.freshness_budget_ms {
            return Err(EngineRejection::Stale);
        }
        if self.circuit_open.load(Ordering::SeqCst) {
            return Err(EngineRejection::CircuitOpen);
        }
        if self.is_revert_cooling_down(&pair) {
            return Err(EngineRejection::RevertSkip);
        }
        if self.is_submit_cooling_down(&pair) {
            return Err(EngineRejection::Cooldown);
        }
        if !self.route_cooldown.lock().unwrap().is_cooled_down(&route_key(&opportunity), Instant::now()) {
            return Err(EngineRejection::RevertSkip);
        }

        // Nonce Manager enforces a single in-flight transaction per account:
        // a still-pending submission blocks a new one from reusing its slot;
        // a timed-out one is reclaimed so its nonce isn't stranded.
        let nonce = {
            let mut manager = self.nonce_manager.lock().unwrap();
            let (n, status) = manager.get_next_nonce().map_err(|_| EngineRejection::CircuitOpen)?;
            match status {
                PendingStatus::NoneInFlight => n,
                PendingStatus::StillPending => return Err(EngineRejection::Cooldown),
                PendingStatus::TimedOut => manager.reclaim_dropped_pending().ok().flatten().unwrap_or(n),
            }
        };

        let prepared = match self.build_and_prepare(&opportunity, nonce) {
            Ok(p) => p,
            Err(e) => {
                warn!(pair = %pair, error = %e, "live: failed to build transaction, not counted against nonce");
                self.record_failure();
                return Ok(());
            }
        };

        // Cooldown timestamp recorded immediately before submission, per spec.
        self.submit_cooldowns.insert(pair.clone(), Instant::now());

        let tx_hash = match self.client.submit(&prepared, self.signer_address).await {
            Ok(hash) => hash,
            Err(e) => {
                error!(pair = %pair, error = %e, "live: submission failed before a hash was known");
                self.record_failure();
                let _ = self.events.send(EngineEvent::Error { message: e.to_string() });
                return Ok(());
            }
        };

        self.nonce_manager
            .lock()
            .unwrap()
            .mark_submitted(nonce, tx_hash.clone())
            .map_err(|_| EngineRejection::CircuitOpen)?;
        let _ = self.events.send(EngineEvent::Submitted { pair: pair.clone(), tx_hash: tx_hash.clone() });

        let receipt = match tokio_timeout(
            Duration::from_millis(self.config.confirmation_timeout_ms),
            self.client.wait_for_receipt(&tx_hash, Duration::from_millis(self.config.confirmation_timeout_ms)),
        )
        .await
        {
            Ok(Ok(receipt)) => receipt,
            Ok(Err(e)) => {
                error!(pair = %pair, tx_hash = %tx_hash, error = %e, "live: confirmation transport error");
                self.record_failure();
                let _ = self.events.send(EngineEvent::Error { message: e.to_string() });
                return Ok(());
            }
            Err(_) => {
                error!(pair = %pair, tx_hash = %tx_hash, "live: confirmation timed out");
                self.record_failure();
                let _ = self.events.send(EngineEvent::Error { message: "confirmation timeout".to_string() });
                return Ok(());
            }
        };

        // Nonce advances regardless of success/revert — both are terminal states.
        self.nonce_manager.lock().unwrap().mark_confirmed(&tx_hash).ok();

        if receipt.success {
            let outcome = success_outcome(&opportunity, tx_hash.clone(), &receipt);
            if let Err(e) = self.trade_store.append(&outcome) {
                error!(error = %e, "failed to journal successful trade");
            }
            let _ = self.events.send(EngineEvent::Confirmed { pair: pair.clone(), outcome });
            self.route_cooldown.lock().unwrap().record_success(&route_key(&opportunity));
            self.consecutive_failures.store(0, Ordering::SeqCst);
        } else {
            let outcome = revert_outcome(&opportunity, tx_hash.clone(), &receipt);
            if let Err(e) = self.trade_store.append(&outcome) {
                error!(error = %e, "failed to journal reverted trade");
            }
            if let Some(reason) = &receipt.revert_reason {
                warn!(pair = %pair, tx_hash = %tx_hash, reason = %reason, "live: transaction reverted on-chain");
            }
            self.revert_cooldowns.insert(pair.clone(), Instant::now());
            let _ = self.events.send(EngineEvent::Reverted { pair: pair.clone(), outcome });
            self.route_cooldown.lock().unwrap().record_failure(route_key(&opportunity), Instant::now());
        }

        Ok(())
    }

    fn is_submit_cooling_down(&self, pair: &str) -> bool {
        self.submit_cooldowns
            .get(pair)
            .map(|t| t.elapsed() < Duration::from_millis(self.config.submit_cooldown_ms))
            .unwrap_or(false)
    }

    fn is_revert_cooling_down(&self, pair: &str) -> bool {
        self.revert_cooldowns
            .get(pair)
            .map(|t| t.elapsed() < Duration::from_millis(self.config.revert_cooldown_ms))
            .unwrap_or(false)
    }

    fn record_failure(&self) {
        let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
        if failures >= self.config.max_consecutive_failures {
            self.circuit_open.store(true, Ordering::SeqCst);
            let _ = self.events.send(EngineEvent::Error {
                message: format!("fatal: {failures} consecutive submission failures, LIVE submissions suspended"),
            });
        }
    }

    /// Operator-requested recovery after investigating a tripped circuit breaker.
    pub fn reset_circuit_breaker(&self) {
        self.consecutive_failures.store(0, Ordering::SeqCst);
        self.circuit_open.store(false, Ordering::SeqCst);
    }

    pub fn is_circuit_open(&self) -> bool {
        self.circuit_open.load(Ordering::SeqCst)
    }
}

fn route_key(opportunity: &ArbitrageOpportunity) -> crate::cooldown::RouteKey {
    let steps = &opportunity.path.steps;
    let buy_venue = steps.first().map(|s| s.venue.to_string()).unwrap_or_default();
    let sell_venue = steps.last().map(|s| s.venue.to_string()).unwrap_or_default();
    (opportunity.price_delta.pair.clone(), buy_venue, sell_venue)
}

fn simulation_revert_outcome(opportunity: &ArbitrageOpportunity, sim_id: String) -> TradeOutcome {
    TradeOutcome {
        tx_hash: sim_id,
        timestamp_ms: opportunity.detected_at_ms,
        block_number: opportunity.block_number,
        path_label: opportunity.price_delta.pair.clone(),
        input_amount: opportunity.input_amount,
        gross_profit: alloy::primitives::U256::ZERO,
        gas_cost: alloy::primitives::U256::ZERO,
        l1_data_fee: alloy::primitives::U256::ZERO,
        revert_cost: alloy::primitives::U256::ZERO,
        net_profit: 0,
        status: TradeStatus::SimulationRevert,
    }
}

fn success_outcome(opportunity: &ArbitrageOpportunity, tx_hash: String, receipt: &Receipt) -> TradeOutcome {
    let gas_cost = alloy::primitives::U256::from(receipt.gas_used as u128 * receipt.effective_gas_price_wei);
    let net_profit = opportunity.gross_profit.to::<u128>() as i128
        - gas_cost.to::<u128>() as i128
        - opportunity.costs.l1_data_fee.to::<u128>() as i128;
    TradeOutcome {
        tx_hash,
        timestamp_ms: opportunity.detected_at_ms,
        block_number: receipt.block_number,
        path_label: opportunity.price_delta.pair.clone(),
        input_amount: opportunity.input_amount,
        gross_profit: opportunity.gross_profit,
        gas_cost,
        l1_data_fee: opportunity.costs.l1_data_fee,
        revert_cost: alloy::primitives::U256::ZERO,
        net_profit,
        status: TradeStatus::Success,
    }
}

fn revert_outcome(opportunity: &ArbitrageOpportunity, tx_hash: String, receipt: &Receipt) -> TradeOutcome {
    let gas_cost = alloy::primitives::U256::from(receipt.gas_used as u128 * receipt.effective_gas_price_wei);
    let revert_cost = gas_cost + opportunity.costs.l1_data_fee;
    TradeOutcome {
        tx_hash,
        timestamp_ms: opportunity.detected_at_ms,
        block_number: receipt.block_number,
        path_label: opportunity.price_delta.pair.clone(),
        input_amount: opportunity.input_amount,
        gross_profit: alloy::primitives::U256::ZERO,
        gas_cost: alloy::primitives::U256::ZERO,
        l1_data_fee: alloy::primitives::U256::ZERO,
        revert_cost,
        net_profit: -(revert_cost.to::<u128>() as i128),
        status: TradeStatus::Revert,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CostEstimate, PriceDelta, PriceSnapshot, SwapPath, SwapStep, VenueTag};
    use alloy::primitives::U256;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicBool as StdAtomicBool;

    fn test_opportunity(pair: &str, net_profit: i128) -> ArbitrageOpportunity {
        let usdc = Address::ZERO;
        let weth = Address::with_last_byte(1);
        let path = SwapPath {
            base_token: usdc,
            steps: vec![
                SwapStep {
                    venue: VenueTag::UniswapV3Like { fee_tier: 500 },
                    pool_address: Address::with_last_byte(2),
                    token_in: usdc,
                    token_out: weth,
                    decimals_in: 6,
                    decimals_out: 18,
                    expected_price: 1.0 / 3000.0,
                },
                SwapStep {
                    venue: VenueTag::UniswapV2Like,
                    pool_address: Address::with_last_byte(3),
                    token_in: weth,
                    token_out: usdc,
                    decimals_in: 18,
                    decimals_out: 6,
                    expected_price: 3030.0,
                },
            ],
        };
        let buy_snap = PriceSnapshot::new("buy", 3000.0, 100, 0);
        let sell_snap = PriceSnapshot::new("sell", 3030.0, 100, 0);
        let delta = PriceDelta::from_snapshots(pair.to_string(), buy_snap, sell_snap, 0).unwrap();
        ArbitrageOpportunity {
            id: format!("{pair}-1"),
            price_delta: delta,
            path,
            input_amount: U256::from(10_000_000u64),
            gross_profit: U256::from(100_000u64),
            costs: CostEstimate::default(),
            net_profit,
            net_profit_percent: 1.0,
            block_number: 100,
            detected_at_ms: 0,
        }
    }

    fn test_builder() -> TransactionBuilder {
        let mut adapters = HashMap::new();
        adapters.insert("uniswapV3-like".to_string(), Address::with_last_byte(10));
        adapters.insert("uniswapV2-like".to_string(), Address::with_last_byte(11));
        TransactionBuilder::new(Address::with_last_byte(9), 137, adapters)
    }

    fn test_manager(dir: &std::path::Path) -> NonceManager {
        NonceManager::open(dir.join("nonce.json"), 300_000).unwrap()
    }

    fn test_store(dir: &std::path::Path) -> TradeStore {
        TradeStore::open(dir.join("trades.ndjson")).unwrap()
    }

    struct AlwaysConfirmsClient {
        reverts: StdAtomicBool,
    }

    #[async_trait]
    impl ChainClient for AlwaysConfirmsClient {
        async fn transaction_count(&self, _address: Address) -> anyhow::Result<u64> {
            Ok(0)
        }
        async fn simulate(&self, _tx: &PreparedTransaction, _from: Address) -> anyhow::Result<()> {
            if self.reverts.load(Ordering::SeqCst) {
                anyhow::bail!("simulated revert")
            }
            Ok(())
        }
        async fn submit(&self, _tx: &PreparedTransaction, _from: Address) -> anyhow::Result<String> {
            Ok("0xdeadbeef".to_string())
        }
        async fn wait_for_receipt(&self, _tx_hash: &str, _timeout: Duration) -> anyhow::Result<Receipt> {
            Ok(Receipt {
                success: !self.reverts.load(Ordering::SeqCst),
                gas_used: 100_000,
                effective_gas_price_wei: 30_000_000_000,
                block_number: 101,
                revert_reason: None,
            })
        }
    }

    fn test_dir(name: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("engine-test-{name}-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn test_engine(dir: &std::path::Path, mode: RunMode, client: AlwaysConfirmsClient) -> ExecutionEngine<AlwaysConfirmsClient> {
        let (tx, _rx) = tokio::sync::broadcast::channel(64);
        ExecutionEngine::new(
            client,
            test_builder(),
            test_manager(dir),
            test_store(dir),
            tx,
            EngineConfig {
                mode,
                freshness_budget_ms: 200,
                submit_cooldown_ms: 10_000,
                revert_cooldown_ms: 10_000,
                confirmation_timeout_ms: 5_000,
                max_consecutive_failures: 5,
            },
            Address::with_last_byte(20),
            Address::with_last_byte(21),
            30,
            2,
            600_000,
        )
    }

    #[tokio::test]
    async fn test_report_mode_never_touches_chain() {
        let dir = test_dir("report");
        let engine = test_engine(&dir, RunMode::Report, AlwaysConfirmsClient { reverts: StdAtomicBool::new(false) });
        let result = engine.handle(test_opportunity("WETH-USDC", 100), 0).await;
        assert!(result.is_ok());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_shadow_mode_journals_simulation_revert() {
        let dir = test_dir("shadow");
        let engine = test_engine(&dir, RunMode::Shadow, AlwaysConfirmsClient { reverts: StdAtomicBool::new(true) });
        engine.handle(test_opportunity("WETH-USDC", 100), 0).await.unwrap();
        let aggregates = engine.trade_store.aggregates().unwrap();
        assert_eq!(aggregates.total_trades, 1);
        assert_eq!(aggregates.simulation_reverts, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_live_mode_rejects_stale_opportunity() {
        let dir = test_dir("live-stale");
        let engine = test_engine(&dir, RunMode::Live, AlwaysConfirmsClient { reverts: StdAtomicBool::new(false) });
        let mut opp = test_opportunity("WETH-USDC", 100);
        opp.detected_at_ms = 0;
        let result = engine.handle(opp, 10_000).await;
        assert_eq!(result.unwrap_err(), EngineRejection::Stale);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_live_mode_confirms_and_journals_success() {
        let dir = test_dir("live-ok");
        let engine = test_engine(&dir, RunMode::Live, AlwaysConfirmsClient { reverts: StdAtomicBool::new(false) });
        let result = engine.handle(test_opportunity("WETH-USDC", 100), 0).await;
        assert!(result.is_ok());
        let aggregates = engine.trade_store.aggregates().unwrap();
        assert_eq!(aggregates.successes, 1);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_live_mode_arms_revert_cooldown_and_rejects_followup() {
        let dir = test_dir("live-revert-cooldown");
        let engine = test_engine(&dir, RunMode::Live, AlwaysConfirmsClient { reverts: StdAtomicBool::new(true) });
        engine.handle(test_opportunity("WETH-USDC", 100), 0).await.unwrap();
        let result = engine.handle(test_opportunity("WETH-USDC", 100), 1_000).await;
        assert_eq!(result.unwrap_err(), EngineRejection::RevertSkip);
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_live_mode_submit_cooldown_blocks_duplicate() {
        let dir = test_dir("live-submit-cooldown");
        let engine = test_engine(&dir, RunMode::Live, AlwaysConfirmsClient { reverts: StdAtomicBool::new(false) });
        engine.handle(test_opportunity("WETH-USDC", 100), 0).await.unwrap();
        let result = engine.handle(test_opportunity("WETH-USDC", 100), 100).await;
        assert_eq!(result.unwrap_err(), EngineRejection::Cooldown);
        std::fs::remove_dir_all(&dir).ok();
    }
}
