//! Opportunity Detector: turns a `PriceDelta` into a sized, costed
//! `ArbitrageOpportunity` or an explicit rejection.
//!
//! Path construction and min/max pool selection is grounded on the source's
//! `arbitrage/detector.rs` (`OpportunityDetector::check_pair`/`find_best_pools`),
//! generalized from a V2-only two-pool comparison to the venue-agnostic
//! three-bound sizing SPEC_FULL.md §4.3 calls for, and from the source's
//! hardcoded per-token USD price constants to raw on-chain units throughout.

use crate::cost::CostModel;
use crate::events::EngineEvent;
use crate::types::{ArbitrageOpportunity, ChainConfig, PriceDelta, SwapPath, SwapStep};
use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::broadcast::Sender;
use tracing::{debug, info};

/// Optional hook invoked once per candidate so callers can veto a venue pair
/// for reasons outside the pure cost model (e.g. a known-bad route).
#[async_trait]
pub trait GasEstimatorHook: Send + Sync {
    async fn on_candidate(&self, path: &SwapPath) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectionReason {
    Stale,
    TooThin,
    UnknownAdapter,
    BelowThreshold { required: U256, actual: i128 },
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            RejectionReason::Stale => write!(f, "stale"),
            RejectionReason::TooThin => write!(f, "tooThin"),
            RejectionReason::UnknownAdapter => write!(f, "unknown-adapter"),
            RejectionReason::BelowThreshold { required, actual } => {
                write!(f, "below threshold {required} (actual {actual})")
            }
        }
    }
}

pub struct OpportunityDetector {
    config: ChainConfig,
    cost_model: CostModel,
    events: Sender<EngineEvent>,
    freshness_budget_ms: u64,
    min_input_amount: U256,
    gas_hook: Option<Arc<dyn GasEstimatorHook>>,
}

const LOWER_BOUND_INPUT: u128 = 10_000_000_000_000_000; // 0.01 base-token units at 18 decimals

impl OpportunityDetector {
    pub fn new(
        config: ChainConfig,
        cost_model: CostModel,
        events: Sender<EngineEvent>,
        freshness_budget_ms: u64,
    ) -> Self {
        Self {
            config,
            cost_model,
            events,
            freshness_budget_ms,
            min_input_amount: U256::from(LOWER_BOUND_INPUT),
            gas_hook: None,
        }
    }

    pub fn set_gas_hook(&mut self, hook: Arc<dyn GasEstimatorHook>) {
        self.gas_hook = Some(hook);
    }

    pub async fn analyze(&self, delta: PriceDelta, now_ms: u64) -> Result<ArbitrageOpportunity, RejectionReason> {
        if delta.buy_pool.age_ms(now_ms) > self.freshness_budget_ms
            || delta.sell_pool.age_ms(now_ms) > self.freshness_budget_ms
        {
            self.reject(&delta, RejectionReason::Stale);
            return Err(RejectionReason::Stale);
        }

        let buy_pool = self.pool_for_snapshot(&delta.buy_pool.pool);
        let sell_pool = self.pool_for_snapshot(&delta.sell_pool.pool);
        let (Some(buy_pool), Some(sell_pool)) = (buy_pool, sell_pool) else {
            self.reject(&delta, RejectionReason::TooThin);
            return Err(RejectionReason::TooThin);
        };

        let path = SwapPath {
            // token1 is the common leg: acquire token0 cheaply on buyPool,
            // then offload it on sellPool where it quotes higher. Using
            // token0 as the round-trip anchor instead would chain
            // buy.price * sell.price, squaring the spread instead of
            // closing the loop at (1 + spread).
            base_token: buy_pool.token1,
            steps: vec![
                SwapStep {
                    venue: buy_pool.venue,
                    pool_address: buy_pool.address,
                    token_in: buy_pool.token1,
                    token_out: buy_pool.token0,
                    decimals_in: buy_pool.decimals1,
                    decimals_out: buy_pool.decimals0,
                    // token1 -> token0 leg: invert buyPool's
                    // token1-per-token0 quote to get token0-per-token1.
                    expected_price: delta.buy_pool.inverse_price,
                },
                SwapStep {
                    venue: sell_pool.venue,
                    pool_address: sell_pool.address,
                    token_in: sell_pool.token0,
                    token_out: sell_pool.token1,
                    decimals_in: sell_pool.decimals0,
                    decimals_out: sell_pool.decimals1,
                    // token0 -> token1 leg: sellPool's own quote applies
                    // directly, no inversion needed.
                    expected_price: delta.sell_pool.price,
                },
            ],
        };

        if self.has_unknown_adapter(&path) {
            self.reject(&delta, RejectionReason::UnknownAdapter);
            return Err(RejectionReason::UnknownAdapter);
        }

        if let Some(hook) = &self.gas_hook {
            if let Err(e) = hook.on_candidate(&path).await {
                debug!(error = %e, "gas estimator hook rejected candidate");
                self.reject(&delta, RejectionReason::TooThin);
                return Err(RejectionReason::TooThin);
            }
        }

        let input_amount = self.size_input(&path, &delta.buy_pool.reserve0);
        if input_amount < self.min_input_amount {
            self.reject(&delta, RejectionReason::TooThin);
            return Err(RejectionReason::TooThin);
        }

        let gross_profit = self.cost_model.gross_profit(&path, input_amount);
        let costs = self
            .cost_model
            .estimate_costs(&path, input_amount, None, 0.005, 256)
            .await
            .map_err(|_| RejectionReason::TooThin)?;

        let net_profit = gross_profit.to::<u128>() as i128 - costs.total().to::<u128>() as i128;

        let threshold = if self.is_risky(&path) {
            self.config.min_profit_threshold_raw * U256::from(2u32)
        } else {
            self.config.min_profit_threshold_raw
        };

        if net_profit <= 0 || U256::try_from(net_profit).map(|p| p < threshold).unwrap_or(true) {
            let reason = RejectionReason::BelowThreshold {
                required: threshold,
                actual: net_profit,
            };
            self.reject(&delta, reason.clone());
            return Err(reason);
        }

        let net_profit_percent = if input_amount.is_zero() {
            0.0
        } else {
            net_profit as f64 / input_amount.to::<u128>() as f64 * 100.0
        };

        let opportunity = ArbitrageOpportunity {
            id: format!("{}-{}", delta.pair, now_ms),
            block_number: delta.sell_pool.block_number.max(delta.buy_pool.block_number),
            detected_at_ms: now_ms,
            price_delta: delta,
            path,
            input_amount,
            gross_profit,
            costs,
            net_profit,
            net_profit_percent,
        };

        info!(id = %opportunity.id, net_profit, "opportunity accepted");
        let _ = self.events.send(EngineEvent::OpportunityFound(opportunity.clone()));
        Ok(opportunity)
    }

    fn reject(&self, delta: &PriceDelta, reason: RejectionReason) {
        debug!(pair = %delta.pair, reason = %reason, "opportunity rejected");
        let _ = self.events.send(EngineEvent::OpportunityRejected {
            reason: reason.to_string(),
            pair: delta.pair.clone(),
        });
    }

    fn pool_for_snapshot(&self, pool_label: &str) -> Option<crate::types::PoolConfig> {
        self.config.pools.iter().find(|p| p.label == pool_label).cloned()
    }

    fn is_risky(&self, path: &SwapPath) -> bool {
        path.steps
            .iter()
            .any(|s| self.config.risky_venues.contains(&venue_label(&s.venue)))
    }

    /// Detector-side half of the two-guard adapter check (SPEC_FULL §9): reject
    /// before a tx is ever built, rather than relying solely on the builder's
    /// own resolve-time guard.
    fn has_unknown_adapter(&self, path: &SwapPath) -> bool {
        path.steps.iter().any(|s| {
            self.config
                .adapters
                .get(&venue_label(&s.venue))
                .copied()
                .unwrap_or(Address::ZERO)
                == Address::ZERO
        })
    }

    /// Three-bound input sizing: per-venue cap, reserve cap, default input —
    /// the detector takes the minimum of whichever bounds apply.
    fn size_input(&self, path: &SwapPath, buy_reserve0: &Option<U256>) -> U256 {
        let mut size = self.config.default_input_amount;

        let venue_cap = path
            .steps
            .iter()
            .filter_map(|s| self.config.max_input_by_venue.get(&venue_label(&s.venue)))
            .min()
            .copied();
        if let Some(cap) = venue_cap {
            size = size.min(cap);
        }

        let has_unknown_reserve_step = path.steps.iter().any(|s| !s.venue.is_v2_like());
        if has_unknown_reserve_step {
            if let Some(cap) = venue_cap {
                size = size.min(cap);
            }
        } else if let Some(reserve0) = buy_reserve0 {
            let reserve_cap = *reserve0 * U256::from(30u32) / U256::from(100u32);
            size = size.min(reserve_cap);
        }

        size
    }
}

fn venue_label(venue: &crate::types::VenueTag) -> String {
    use crate::types::VenueTag;
    match venue {
        VenueTag::UniswapV2Like => "uniswapV2-like".to_string(),
        VenueTag::SolidlyFork => "solidlyFork".to_string(),
        VenueTag::UniswapV3Like { .. } => "uniswapV3-like".to_string(),
        VenueTag::BinnedLb { .. } => "binnedLB".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PoolConfig, PriceSnapshot, VenueTag};
    use std::collections::{HashMap, HashSet};

    fn pool(label: &str, venue: VenueTag) -> PoolConfig {
        PoolConfig {
            label: label.to_string(),
            venue,
            address: Address::with_last_byte(1),
            token0: Address::ZERO,
            token1: Address::with_last_byte(2),
            decimals0: 6,
            decimals1: 18,
            invert_price: false,
        }
    }

    fn test_config(pools: Vec<PoolConfig>) -> ChainConfig {
        let mut adapters = HashMap::new();
        adapters.insert("uniswapV2-like".to_string(), Address::with_last_byte(10));
        adapters.insert("solidlyFork".to_string(), Address::with_last_byte(11));
        adapters.insert("uniswapV3-like".to_string(), Address::with_last_byte(12));
        adapters.insert("binnedLB".to_string(), Address::with_last_byte(13));

        ChainConfig {
            chain_id: 137,
            is_l2_with_l1_posting: false,
            flash_loan_provider: Address::ZERO,
            flash_loan_fee_bps: 0,
            executor_address: Address::with_last_byte(9),
            pools,
            adapters,
            gas_price_gwei: 0,
            gas_limit: 0,
            min_profit_threshold_raw: U256::from(1_000u64),
            risky_venues: HashSet::new(),
            max_input_by_venue: HashMap::new(),
            default_input_amount: U256::from(10_000_000_000_000_000_000u128),
        }
    }

    #[tokio::test]
    async fn test_rejects_stale_snapshot() {
        let buy = pool("buy", VenueTag::UniswapV3Like { fee_tier: 500 });
        let sell = pool("sell", VenueTag::UniswapV3Like { fee_tier: 3000 });
        let config = test_config(vec![buy, sell]);
        let (tx, _rx) = tokio::sync::broadcast::channel(16);
        let detector = OpportunityDetector::new(config.clone(), CostModel::new(config), tx, 200);

        let buy_snap = PriceSnapshot::new("buy", 3000.0, 100, 0);
        let sell_snap = PriceSnapshot::new("sell", 3030.0, 100, 0);
        let delta = PriceDelta::from_snapshots("pair", buy_snap, sell_snap, 500).unwrap();

        let result = detector.analyze(delta, 500).await;
        assert_eq!(result.unwrap_err(), RejectionReason::Stale);
    }

    #[tokio::test]
    async fn test_accepts_profitable_cross_tier() {
        let buy = pool("buy", VenueTag::UniswapV3Like { fee_tier: 500 });
        let sell = pool("sell", VenueTag::UniswapV3Like { fee_tier: 3000 });
        let mut config = test_config(vec![buy, sell]);
        config.min_profit_threshold_raw = U256::from(1u64);
        let (tx, _rx) = tokio::sync::broadcast::channel(16);
        let detector = OpportunityDetector::new(config.clone(), CostModel::new(config), tx, 200);

        let buy_snap = PriceSnapshot::new("buy", 3000.0, 100, 0);
        let sell_snap = PriceSnapshot::new("sell", 3030.0, 100, 0);
        let delta = PriceDelta::from_snapshots("pair", buy_snap, sell_snap, 0).unwrap();

        let opportunity = detector.analyze(delta, 0).await.unwrap();

        // 1% spread, 0.05% + 0.3% fees, 10 base-token input: the round trip
        // should close at roughly (1 + spread) instead of squaring buy*sell.
        let gross = opportunity.gross_profit.to::<u128>() as f64 / 1e18;
        assert!((gross - 0.065).abs() < 0.005, "gross profit {gross} far from expected ~0.065");
    }

    #[tokio::test]
    async fn test_rejects_unknown_adapter() {
        let buy = pool("buy", VenueTag::UniswapV3Like { fee_tier: 500 });
        let sell = pool("sell", VenueTag::UniswapV3Like { fee_tier: 3000 });
        let mut config = test_config(vec![buy, sell]);
        config.min_profit_threshold_raw = U256::from(1u64);
        config.adapters.clear();
        let (tx, _rx) = tokio::sync::broadcast::channel(16);
        let detector = OpportunityDetector::new(config.clone(), CostModel::new(config), tx, 200);

        let buy_snap = PriceSnapshot::new("buy", 3000.0, 100, 0);
        let sell_snap = PriceSnapshot::new("sell", 3030.0, 100, 0);
        let delta = PriceDelta::from_snapshots("pair", buy_snap, sell_snap, 0).unwrap();

        let result = detector.analyze(delta, 0).await;
        assert_eq!(result.unwrap_err(), RejectionReason::UnknownAdapter);
    }
}
