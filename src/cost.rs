//! Cost/Gas Model: per-venue fee rate, gross-profit projection, and the
//! four-bucket cost decomposition (flash-loan fee, gas, L1 data fee, slippage).
//!
//! Swap-fee math is grounded on the source's constant-product `get_amount_out`;
//! gas estimation borrows the cached-fetch shape of a sibling arbitrage bot's
//! `GasPriceFetcher` (time-boxed cache around a gas-price read) generalized to
//! an injectable async trait so a chain-specific oracle can be swapped in.

use crate::types::{ChainConfig, CostEstimate, SwapPath};
use alloy::primitives::U256;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Pluggable hook for chains that charge an L1 data-availability fee on top
/// of L2 execution gas (e.g. an OP-stack or Arbitrum rollup). Chains without
/// L1 posting simply never set one; `estimate_costs` then leaves `l1_data_fee`
/// at zero.
#[async_trait]
pub trait L1FeeEstimator: Send + Sync {
    async fn estimate_l1_data_fee(&self, calldata_len: usize) -> anyhow::Result<U256>;
}

/// Process-wide HTTP client shared by every `HttpL1FeeEstimator` instance,
/// one connection pool instead of one per estimator.
static HTTP_CLIENT: Lazy<reqwest::Client> = Lazy::new(reqwest::Client::new);

#[derive(serde::Deserialize)]
struct L1OracleResponse {
    l1_base_fee_wei: u64,
}

/// Fetches the current L1 base fee from a rollup gas-price oracle over HTTP
/// and converts it into a data-posting cost for `calldata_len` bytes, at a
/// fixed 16 gas/byte (the non-zero-byte EIP-2028 rate, used as the worst case
/// since the builder doesn't track zero-byte runs in its calldata).
///
/// Grounded on the source's `GasPriceFetcher` cached-fetch shape (TTL-bounded
/// refetch behind a mutex) and a sibling arbitrage bot's `gas_price.rs`
/// (fetching gas price from an HTTP oracle rather than an on-chain read).
pub struct HttpL1FeeEstimator {
    endpoint: String,
    cache: Mutex<Option<(u64, std::time::Instant)>>,
    ttl: Duration,
}

const L1_GAS_PER_NONZERO_BYTE: u64 = 16;

impl HttpL1FeeEstimator {
    pub fn new(endpoint: String) -> Self {
        Self { endpoint, cache: Mutex::new(None), ttl: Duration::from_secs(12) }
    }

    async fn l1_base_fee_wei(&self) -> anyhow::Result<u64> {
        let mut cache = self.cache.lock().await;
        if let Some((fee, fetched_at)) = *cache {
            if fetched_at.elapsed() < self.ttl {
                return Ok(fee);
            }
        }
        let response: L1OracleResponse =
            HTTP_CLIENT.get(&self.endpoint).send().await?.error_for_status()?.json().await?;
        *cache = Some((response.l1_base_fee_wei, std::time::Instant::now()));
        Ok(response.l1_base_fee_wei)
    }
}

#[async_trait]
impl L1FeeEstimator for HttpL1FeeEstimator {
    async fn estimate_l1_data_fee(&self, calldata_len: usize) -> anyhow::Result<U256> {
        let base_fee = self.l1_base_fee_wei().await?;
        Ok(U256::from(base_fee) * U256::from(calldata_len as u64 * L1_GAS_PER_NONZERO_BYTE))
    }
}

/// Caches the last gas-price read for `ttl`, matching the source's
/// `GasPriceCache` (30s TTL, `is_expired()` check before refetching).
struct GasPriceCache {
    gwei: u64,
    fetched_at: std::time::Instant,
    ttl: Duration,
}

impl GasPriceCache {
    fn is_expired(&self) -> bool {
        self.fetched_at.elapsed() > self.ttl
    }
}

pub const DEFAULT_GAS_PRICE_GWEI: u64 = 30;
pub const ARBITRAGE_GAS_UNITS: u64 = 300_000;

pub struct CostModel {
    config: ChainConfig,
    gas_cache: Mutex<GasPriceCache>,
    l1_estimator: Option<Arc<dyn L1FeeEstimator>>,
}

impl CostModel {
    pub fn new(config: ChainConfig) -> Self {
        let gwei = config.gas_price_gwei.max(1);
        Self {
            config,
            gas_cache: Mutex::new(GasPriceCache {
                gwei,
                fetched_at: std::time::Instant::now(),
                ttl: Duration::from_secs(30),
            }),
            l1_estimator: None,
        }
    }

    pub fn set_l1_estimator(&mut self, estimator: Arc<dyn L1FeeEstimator>) {
        self.l1_estimator = Some(estimator);
    }

    /// Refresh the cached gas price if stale, returning gwei.
    async fn effective_gas_price_gwei(&self, observed_gwei: Option<u64>) -> u64 {
        let mut cache = self.gas_cache.lock().await;
        if let Some(observed) = observed_gwei {
            cache.gwei = observed;
            cache.fetched_at = std::time::Instant::now();
        } else if cache.is_expired() {
            cache.fetched_at = std::time::Instant::now();
        }
        cache.gwei
    }

    /// Projects gross profit for `input_amount` run through `path`, applying
    /// each step's venue fee rate: out = in * expected_price * (1 - fee_rate).
    pub fn gross_profit(&self, path: &SwapPath, input_amount: U256) -> U256 {
        let mut amount = input_amount.to::<u128>() as f64;
        for step in &path.steps {
            amount *= step.expected_price * (1.0 - step.venue.fee_rate());
        }
        let input_f = input_amount.to::<u128>() as f64;
        if amount <= input_f {
            U256::ZERO
        } else {
            U256::from((amount - input_f) as u128)
        }
    }

    /// Builds the full cost decomposition for a candidate execution.
    pub async fn estimate_costs(
        &self,
        path: &SwapPath,
        input_amount: U256,
        observed_gas_price_gwei: Option<u64>,
        max_slippage: f64,
        calldata_len: usize,
    ) -> anyhow::Result<CostEstimate> {
        let flash_loan_fee =
            input_amount * U256::from(self.config.flash_loan_fee_bps) / U256::from(10_000u32);

        let gwei = self.effective_gas_price_gwei(observed_gas_price_gwei).await;
        let gas_cost = U256::from(self.config.gas_limit) * U256::from(gwei) * U256::from(1_000_000_000u64);

        let l1_data_fee = if self.config.is_l2_with_l1_posting {
            match &self.l1_estimator {
                Some(estimator) => estimator.estimate_l1_data_fee(calldata_len).await?,
                None => U256::ZERO,
            }
        } else {
            U256::ZERO
        };

        let slippage_cost = if max_slippage > 0.0 {
            let amount_f = input_amount.to::<u128>() as f64 * max_slippage;
            U256::from(amount_f as u128)
        } else {
            U256::ZERO
        };

        let _ = path; // path shape doesn't affect cost beyond what gross_profit already used

        Ok(CostEstimate {
            flash_loan_fee,
            gas_cost,
            l1_data_fee,
            slippage_cost,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SwapStep, VenueTag};
    use alloy::primitives::Address;
    use std::collections::{HashMap, HashSet};

    fn test_config() -> ChainConfig {
        ChainConfig {
            chain_id: 137,
            is_l2_with_l1_posting: false,
            flash_loan_provider: Address::ZERO,
            flash_loan_fee_bps: 9,
            executor_address: Address::with_last_byte(1),
            pools: vec![],
            adapters: HashMap::new(),
            gas_price_gwei: 30,
            gas_limit: 600_000,
            min_profit_threshold_raw: U256::ZERO,
            risky_venues: HashSet::new(),
            max_input_by_venue: HashMap::new(),
            default_input_amount: U256::from(1_000_000_000_000_000_000u128),
        }
    }

    fn test_path(fee_a: VenueTag, price_a: f64, fee_b: VenueTag, price_b: f64) -> SwapPath {
        let usdc = Address::ZERO;
        let weth = Address::with_last_byte(1);
        SwapPath {
            base_token: usdc,
            steps: vec![
                SwapStep {
                    venue: fee_a,
                    pool_address: Address::with_last_byte(2),
                    token_in: usdc,
                    token_out: weth,
                    decimals_in: 6,
                    decimals_out: 18,
                    expected_price: price_a,
                },
                SwapStep {
                    venue: fee_b,
                    pool_address: Address::with_last_byte(3),
                    token_in: weth,
                    token_out: usdc,
                    decimals_in: 18,
                    decimals_out: 6,
                    expected_price: price_b,
                },
            ],
        }
    }

    #[test]
    fn test_gross_profit_cross_tier_beats_same_tier() {
        let model = CostModel::new(test_config());
        let cross_tier = test_path(
            VenueTag::UniswapV3Like { fee_tier: 500 },
            1.0 / 3000.0,
            VenueTag::UniswapV3Like { fee_tier: 3000 },
            3030.0,
        );
        let same_tier = test_path(
            VenueTag::UniswapV3Like { fee_tier: 3000 },
            1.0 / 3000.0,
            VenueTag::UniswapV3Like { fee_tier: 3000 },
            3030.0,
        );
        let input = U256::from(10_000_000u64); // 10 USDC (6 decimals)
        let cross_profit = model.gross_profit(&cross_tier, input);
        let same_profit = model.gross_profit(&same_tier, input);
        assert!(cross_profit > same_profit);
    }

    #[tokio::test]
    async fn test_cost_total_matches_sum() {
        let model = CostModel::new(test_config());
        let path = test_path(
            VenueTag::UniswapV2Like,
            1.0 / 3000.0,
            VenueTag::UniswapV2Like,
            3030.0,
        );
        let costs = model
            .estimate_costs(&path, U256::from(10_000_000u64), Some(30), 0.005, 200)
            .await
            .unwrap();
        assert_eq!(
            costs.total(),
            costs.flash_loan_fee + costs.gas_cost + costs.l1_data_fee + costs.slippage_cost
        );
        assert_eq!(costs.l1_data_fee, U256::ZERO);
    }
}
