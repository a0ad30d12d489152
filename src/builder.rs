//! Transaction Builder: turns an accepted `ArbitrageOpportunity` into an
//! immutable call payload for the on-chain executor.
//!
//! ABI shape is grounded on the source's `contracts.rs`, which already moved
//! its other interfaces off `ethers::abigen!` onto alloy's `sol!` macro —
//! this module extends that pattern with `IFlashArbExecutor`, matching the
//! richer `(flashLoanProvider, flashLoanToken, flashLoanAmount, steps[])`
//! wire contract described in SPEC_FULL.md §6.

use crate::contracts::IFlashArbExecutor;
use crate::error::EngineError;
use crate::types::{ArbitrageOpportunity, SwapStep, VenueTag};
use alloy::primitives::{Address, Bytes, U256};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct Transaction {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
    pub chain_id: u64,
    pub flash_loan_provider: Address,
    pub flash_loan_token: Address,
    pub flash_loan_amount: U256,
}

#[derive(Debug, Clone)]
pub struct PreparedTransaction {
    pub tx: Transaction,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
    pub gas_limit: u64,
    pub nonce: u64,
}

pub struct TransactionBuilder {
    executor_address: Address,
    chain_id: u64,
    /// venue label → on-chain adapter address, matching the venue labels
    /// the Cost Model and Detector use for per-venue caps/risk flags.
    adapter_table: HashMap<String, Address>,
}

impl TransactionBuilder {
    pub fn new(executor_address: Address, chain_id: u64, adapter_table: HashMap<String, Address>) -> Self {
        Self {
            executor_address,
            chain_id,
            adapter_table,
        }
    }

    fn resolve_adapter(&self, venue: &VenueTag) -> Result<Address, EngineError> {
        let label = venue_label(venue);
        let address = self
            .adapter_table
            .get(&label)
            .copied()
            .unwrap_or(Address::ZERO);
        if address == Address::ZERO {
            return Err(EngineError::ZeroAdapter { venue: label });
        }
        Ok(address)
    }

    fn encode_step(&self, step: &SwapStep, is_first: bool, amount_in: U256) -> Result<IFlashArbExecutor::SwapStep, EngineError> {
        let adapter = self.resolve_adapter(&step.venue)?;
        let extra_data = encode_extra_data(&step.venue);
        Ok(IFlashArbExecutor::SwapStep {
            adapter,
            tokenIn: step.token_in,
            tokenOut: step.token_out,
            // First step carries the full flash-loan amount; later steps
            // encode 0, meaning "use current balance" on-chain.
            amountIn: if is_first { amount_in } else { U256::ZERO },
            extraData: extra_data,
        })
    }

    /// Builds the executor call payload for `opportunity`. Fails fast —
    /// never returns a transaction whose adapter table resolved to the zero
    /// address (hard guard alongside the detector-level pre-check).
    pub fn build_arbitrage_transaction(
        &self,
        opportunity: &ArbitrageOpportunity,
        flash_loan_provider: Address,
    ) -> Result<Transaction, EngineError> {
        let steps: Vec<IFlashArbExecutor::SwapStep> = opportunity
            .path
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| self.encode_step(step, i == 0, opportunity.input_amount))
            .collect::<Result<_, _>>()?;

        let call = IFlashArbExecutor::executeArbitrageCall {
            flashLoanProvider: flash_loan_provider,
            flashLoanToken: opportunity.path.base_token,
            flashLoanAmount: opportunity.input_amount,
            steps,
        };

        use alloy::sol_types::SolCall;
        let data = call.abi_encode();

        Ok(Transaction {
            to: self.executor_address,
            value: U256::ZERO,
            data: Bytes::from(data),
            chain_id: self.chain_id,
            flash_loan_provider,
            flash_loan_token: opportunity.path.base_token,
            flash_loan_amount: opportunity.input_amount,
        })
    }

    /// Attaches EIP-1559 gas fields and a nonce. Rejects a non-positive gas
    /// limit or a priority tip that would make `max_fee_per_gas` overflow/negative.
    pub fn prepare_transaction(
        &self,
        tx: Transaction,
        base_fee: u128,
        priority_tip: u128,
        gas_limit: u64,
        nonce: u64,
    ) -> Result<PreparedTransaction, EngineError> {
        if gas_limit == 0 {
            return Err(EngineError::Configuration("gas limit must be positive".into()));
        }
        let max_fee_per_gas = base_fee
            .checked_mul(2)
            .and_then(|v| v.checked_add(priority_tip))
            .ok_or_else(|| EngineError::Configuration("gas fee overflow".into()))?;

        Ok(PreparedTransaction {
            tx,
            max_fee_per_gas,
            max_priority_fee_per_gas: priority_tip,
            gas_limit,
            nonce,
        })
    }
}

fn venue_label(venue: &VenueTag) -> String {
    match venue {
        VenueTag::UniswapV2Like => "uniswapV2-like".to_string(),
        VenueTag::SolidlyFork => "solidlyFork".to_string(),
        VenueTag::UniswapV3Like { .. } => "uniswapV3-like".to_string(),
        VenueTag::BinnedLb { .. } => "binnedLB".to_string(),
    }
}

/// Per-venue `extraData`: empty for V2-like, a 3-byte fee tier for V3-like,
/// an encoded bin-step list for binned venues.
fn encode_extra_data(venue: &VenueTag) -> Bytes {
    match venue {
        VenueTag::UniswapV2Like | VenueTag::SolidlyFork => Bytes::new(),
        VenueTag::UniswapV3Like { fee_tier } => Bytes::from(fee_tier.to_be_bytes()[1..].to_vec()),
        VenueTag::BinnedLb { bin_step } => Bytes::from(bin_step.to_be_bytes().to_vec()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PriceDelta, PriceSnapshot, SwapPath};

    fn test_opportunity(buy_venue: VenueTag, sell_venue: VenueTag) -> ArbitrageOpportunity {
        let usdc = Address::ZERO;
        let weth = Address::with_last_byte(1);
        let path = SwapPath {
            base_token: usdc,
            steps: vec![
                SwapStep {
                    venue: buy_venue,
                    pool_address: Address::with_last_byte(2),
                    token_in: usdc,
                    token_out: weth,
                    decimals_in: 6,
                    decimals_out: 18,
                    expected_price: 3000.0,
                },
                SwapStep {
                    venue: sell_venue,
                    pool_address: Address::with_last_byte(3),
                    token_in: weth,
                    token_out: usdc,
                    decimals_in: 18,
                    decimals_out: 6,
                    expected_price: 1.0 / 3030.0,
                },
            ],
        };
        let buy_snap = PriceSnapshot::new("buy", 3000.0, 100, 0);
        let sell_snap = PriceSnapshot::new("sell", 3030.0, 100, 0);
        let delta = PriceDelta::from_snapshots("WETH-USDC", buy_snap, sell_snap, 0).unwrap();
        ArbitrageOpportunity {
            id: "test".into(),
            price_delta: delta,
            path,
            input_amount: U256::from(10_000_000u64),
            gross_profit: U256::from(100_000u64),
            costs: Default::default(),
            net_profit: 50_000,
            net_profit_percent: 0.5,
            block_number: 100,
            detected_at_ms: 0,
        }
    }

    #[test]
    fn test_build_fails_on_zero_adapter() {
        let builder = TransactionBuilder::new(Address::with_last_byte(9), 137, HashMap::new());
        let opp = test_opportunity(
            VenueTag::UniswapV3Like { fee_tier: 500 },
            VenueTag::UniswapV2Like,
        );
        let result = builder.build_arbitrage_transaction(&opp, Address::with_last_byte(5));
        assert!(matches!(result, Err(EngineError::ZeroAdapter { .. })));
    }

    #[test]
    fn test_build_succeeds_with_adapters() {
        let mut adapters = HashMap::new();
        adapters.insert("uniswapV3-like".to_string(), Address::with_last_byte(10));
        adapters.insert("uniswapV2-like".to_string(), Address::with_last_byte(11));
        let builder = TransactionBuilder::new(Address::with_last_byte(9), 137, adapters);
        let opp = test_opportunity(
            VenueTag::UniswapV3Like { fee_tier: 500 },
            VenueTag::UniswapV2Like,
        );
        let tx = builder
            .build_arbitrage_transaction(&opp, Address::with_last_byte(5))
            .unwrap();
        assert_eq!(tx.to, Address::with_last_byte(9));
        assert!(!tx.data.is_empty());
    }

    #[test]
    fn test_prepare_rejects_zero_gas_limit() {
        let builder = TransactionBuilder::new(Address::with_last_byte(9), 137, HashMap::new());
        let tx = Transaction {
            to: Address::ZERO,
            value: U256::ZERO,
            data: Bytes::new(),
            chain_id: 137,
            flash_loan_provider: Address::ZERO,
            flash_loan_token: Address::ZERO,
            flash_loan_amount: U256::ZERO,
        };
        let result = builder.prepare_transaction(tx, 30_000_000_000, 2_000_000_000, 0, 1);
        assert!(result.is_err());
    }

    #[test]
    fn test_extra_data_encoding_by_venue() {
        assert!(encode_extra_data(&VenueTag::UniswapV2Like).is_empty());
        assert_eq!(encode_extra_data(&VenueTag::UniswapV3Like { fee_tier: 500 }).len(), 3);
        assert_eq!(encode_extra_data(&VenueTag::BinnedLb { bin_step: 20 }).len(), 2);
    }
}
