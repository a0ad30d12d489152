//! Core data types for the arbitrage engine.
//!
//! `VenueTag` generalizes the DEX-specific enum a constant-product/concentrated-liquidity
//! bot would otherwise hand-roll: each structural pool kind carries its fee parameter as
//! data instead of being enumerated per fee tier per protocol.

use alloy::primitives::{Address, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Structural kind of a DEX pool, carrying the parameter that determines its swap fee.
///
/// Two pools of the same protocol family (e.g. two Uniswap V3 forks) that differ only
/// in fee tier are the *same* `VenueTag` variant with a different `fee_tier`/`bin_step` —
/// venue identity (which protocol/router) lives in `PoolConfig::label`, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VenueTag {
    /// Constant-product AMM (Uniswap V2 style). Fee is a fixed 0.30%.
    UniswapV2Like,
    /// Concentrated liquidity (Uniswap V3 style). `fee_tier` in hundredths of a bip
    /// (100 = 0.01%, 500 = 0.05%, 3000 = 0.30%, 10000 = 1.00%).
    UniswapV3Like { fee_tier: u32 },
    /// Binned liquidity (Trader Joe Liquidity Book style). `bin_step` in basis points.
    BinnedLb { bin_step: u16 },
    /// Solidly-fork stable/volatile AMM. Fee is a fixed 0.30% like V2, but quoting
    /// differs for `stable` pools (not modeled — treated as constant-product here).
    SolidlyFork,
}

/// Fee sentinel the on-chain executor interprets as "use the V2 swap path".
/// type(uint24).max = 16777215.
pub const V2_FEE_SENTINEL: u32 = 16_777_215;

impl VenueTag {
    pub fn is_v3_like(&self) -> bool {
        matches!(self, VenueTag::UniswapV3Like { .. })
    }

    pub fn is_v2_like(&self) -> bool {
        matches!(self, VenueTag::UniswapV2Like | VenueTag::SolidlyFork)
    }

    /// Swap fee as a fraction (0.003 == 0.30%).
    ///
    /// Binned venues carry a 1.5x buffer over their nominal bin step to
    /// compensate for the dynamic volatility surcharge LB pools add on top
    /// of the base fee (see the Cost/Gas Model's per-venue fee rate rule).
    pub fn fee_rate(&self) -> f64 {
        match self {
            VenueTag::UniswapV2Like | VenueTag::SolidlyFork => 0.003,
            VenueTag::UniswapV3Like { fee_tier } => *fee_tier as f64 / 1_000_000.0,
            VenueTag::BinnedLb { bin_step } => (*bin_step as f64 / 10_000.0) * 1.5,
        }
    }

    /// Fee value for the on-chain executor's atomic call.
    /// V2-like → sentinel (swapExactTokensForTokens path). V3-like → its fee tier.
    /// Binned → bin step reused directly (the adapter interprets it).
    pub fn atomic_fee(&self) -> u32 {
        match self {
            VenueTag::UniswapV2Like | VenueTag::SolidlyFork => V2_FEE_SENTINEL,
            VenueTag::UniswapV3Like { fee_tier } => *fee_tier,
            VenueTag::BinnedLb { bin_step } => *bin_step as u32,
        }
    }
}

impl fmt::Display for VenueTag {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VenueTag::UniswapV2Like => write!(f, "uniswapV2-like"),
            VenueTag::SolidlyFork => write!(f, "solidlyFork"),
            VenueTag::UniswapV3Like { fee_tier } => write!(f, "uniswapV3-like({fee_tier})"),
            VenueTag::BinnedLb { bin_step } => write!(f, "binnedLB({bin_step})"),
        }
    }
}

/// Static, immutable identity of one monitored pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    pub label: String,
    pub venue: VenueTag,
    pub address: Address,
    pub token0: Address,
    pub token1: Address,
    pub decimals0: u8,
    pub decimals1: u8,
    /// When the on-chain token ordering puts the pair's quote token in a
    /// different slot than this pool's callers expect, invert the price.
    pub invert_price: bool,
}

impl PoolConfig {
    /// Canonical pair key: token addresses lowercased and sorted, joined with '-'.
    pub fn pair_key(&self) -> String {
        canonical_pair_key(self.token0, self.token1)
    }
}

pub fn canonical_pair_key(a: Address, b: Address) -> String {
    let (lo, hi) = if a < b { (a, b) } else { (b, a) };
    format!("{lo:?}-{hi:?}").to_lowercase()
}

/// One sampled price observation for a pool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub pool: String, // PoolConfig::label
    pub price: f64,
    pub inverse_price: f64,
    pub sqrt_price_x96: Option<U256>,
    pub block_number: u64,
    pub timestamp_ms: u64,
    pub reserve0: Option<U256>,
    pub reserve1: Option<U256>,
}

impl PriceSnapshot {
    pub fn new(pool: impl Into<String>, price: f64, block_number: u64, timestamp_ms: u64) -> Self {
        Self {
            pool: pool.into(),
            price,
            inverse_price: if price > 0.0 { 1.0 / price } else { 0.0 },
            sqrt_price_x96: None,
            block_number,
            timestamp_ms,
            reserve0: None,
            reserve1: None,
        }
    }

    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.timestamp_ms)
    }
}

/// A pairwise cross-venue spread for one canonical pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceDelta {
    pub pair: String,
    pub buy_pool: PriceSnapshot,
    pub sell_pool: PriceSnapshot,
    pub delta_percent: f64,
    pub timestamp_ms: u64,
}

impl PriceDelta {
    /// Construct from two snapshots, ordering by price. Returns `None` if prices
    /// are equal (no spread) or either price is non-positive.
    pub fn from_snapshots(pair: impl Into<String>, a: PriceSnapshot, b: PriceSnapshot, now_ms: u64) -> Option<Self> {
        if a.price <= 0.0 || b.price <= 0.0 || (a.price - b.price).abs() < f64::EPSILON {
            return None;
        }
        let (buy_pool, sell_pool) = if a.price < b.price { (a, b) } else { (b, a) };
        let delta_percent = (sell_pool.price - buy_pool.price) / buy_pool.price * 100.0;
        Some(Self {
            pair: pair.into(),
            buy_pool,
            sell_pool,
            delta_percent,
            timestamp_ms: now_ms,
        })
    }
}

/// One leg of a candidate swap path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapStep {
    pub venue: VenueTag,
    pub pool_address: Address,
    pub token_in: Address,
    pub token_out: Address,
    pub decimals_in: u8,
    pub decimals_out: u8,
    pub expected_price: f64,
}

/// An ordered pair of steps that starts and ends in `base_token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapPath {
    pub base_token: Address,
    pub steps: Vec<SwapStep>,
}

impl SwapPath {
    /// `true` when the path is well-formed: starts/ends in `base_token` and each
    /// step's output feeds the next step's input.
    pub fn is_closed_loop(&self) -> bool {
        if self.steps.is_empty() {
            return false;
        }
        if self.steps.first().map(|s| s.token_in) != Some(self.base_token) {
            return false;
        }
        if self.steps.last().map(|s| s.token_out) != Some(self.base_token) {
            return false;
        }
        self.steps.windows(2).all(|w| w[0].token_out == w[1].token_in)
    }
}

/// Cost decomposition for a candidate execution, all in base-token raw units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default)]
pub struct CostEstimate {
    pub flash_loan_fee: U256,
    pub gas_cost: U256,
    pub l1_data_fee: U256,
    pub slippage_cost: U256,
}

impl CostEstimate {
    pub fn total(&self) -> U256 {
        self.flash_loan_fee + self.gas_cost + self.l1_data_fee + self.slippage_cost
    }
}

/// Output of a Detector analysis: a sized, costed, accept/reject-ready candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArbitrageOpportunity {
    pub id: String,
    pub price_delta: PriceDelta,
    pub path: SwapPath,
    pub input_amount: U256,
    pub gross_profit: U256,
    pub costs: CostEstimate,
    pub net_profit: i128,
    pub net_profit_percent: f64,
    pub block_number: u64,
    pub detected_at_ms: u64,
}

impl ArbitrageOpportunity {
    pub fn is_profitable(&self, min_profit_raw: U256) -> bool {
        self.net_profit > 0 && U256::try_from(self.net_profit).map(|p| p >= min_profit_raw).unwrap_or(false)
    }
}

/// Terminal status of one journaled trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeStatus {
    Success,
    Revert,
    SimulationRevert,
}

/// A single append-only journal record with three-bucket accounting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeOutcome {
    pub tx_hash: String,
    pub timestamp_ms: u64,
    pub block_number: u64,
    pub path_label: String,
    pub input_amount: U256,
    pub gross_profit: U256,
    pub gas_cost: U256,
    pub l1_data_fee: U256,
    pub revert_cost: U256,
    pub net_profit: i128,
    pub status: TradeStatus,
}

impl TradeOutcome {
    pub fn net_profit_raw(&self) -> i128 {
        match self.status {
            TradeStatus::Success => {
                self.gross_profit.to::<u128>() as i128
                    - self.gas_cost.to::<u128>() as i128
                    - self.l1_data_fee.to::<u128>() as i128
            }
            TradeStatus::Revert | TradeStatus::SimulationRevert => {
                -(self.revert_cost.to::<u128>() as i128)
            }
        }
    }
}

/// Per-chain profile: gas economics, venue adapter table, and whether L1 data
/// fees apply (rollups posting calldata to L1).
#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub is_l2_with_l1_posting: bool,
    pub flash_loan_provider: Address,
    pub flash_loan_fee_bps: u32,
    pub executor_address: Address,
    pub pools: Vec<PoolConfig>,
    /// venue label (router/adapter identity, e.g. "uniswap-v3") → adapter address
    pub adapters: std::collections::HashMap<String, Address>,
    pub gas_price_gwei: u64,
    pub gas_limit: u64,
    pub min_profit_threshold_raw: U256,
    pub risky_venues: std::collections::HashSet<String>,
    pub max_input_by_venue: std::collections::HashMap<String, U256>,
    pub default_input_amount: U256,
}
