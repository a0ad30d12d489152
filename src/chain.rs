//! Concrete `alloy`-backed implementations of the `PoolReader` and
//! `ChainClient` transport boundaries the Monitor and Execution Engine
//! depend on. Keeping these in one module means swapping chain clients
//! (e.g. a mocked provider in tests, a different RPC crate entirely) never
//! touches the pricing or execution logic, only this file.
//!
//! Read-side ABI calls are grounded on the source's `pool/v3_syncer.rs`
//! (`slot0()`/`liquidity()`/`token_0()` call shape) and `pool/syncer.rs`
//! (`getReserves()`), ported from `ethers::abigen!` instances to the `sol!`
//! interfaces in `contracts.rs`. The submit/confirm shape follows a sibling
//! arbitrage bot's `executor.rs::monitor_transaction_confirmation` polling
//! loop.

use crate::builder::PreparedTransaction;
use crate::contracts::{ILbPair, IUniswapV2Pair, UniswapV3Pool};
use crate::engine::{ChainClient, Receipt};
use crate::monitor::{PoolReader, RawPoolRead};
use crate::types::{PoolConfig, VenueTag};
use alloy::primitives::{Address, TxKind, U256};
use alloy::providers::Provider;
use alloy::rpc::types::TransactionRequest;
use anyhow::Context;
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

/// Trader Joe Liquidity Book's fixed reference bin (`ID_ONE` = 2^23): the
/// bin whose price is exactly 1.0 before decimal adjustment.
const LB_ID_ONE: i32 = 1 << 23;

pub struct AlloyPoolReader<P> {
    provider: P,
}

impl<P: Provider + Clone + Send + Sync + 'static> AlloyPoolReader<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> PoolReader for AlloyPoolReader<P> {
    async fn read_pool(&self, pool: &PoolConfig) -> anyhow::Result<RawPoolRead> {
        let block_number = self.provider.get_block_number().await.context("get_block_number")?;
        match pool.venue {
            VenueTag::UniswapV2Like | VenueTag::SolidlyFork => {
                let pair = IUniswapV2Pair::new(pool.address, self.provider.clone());
                let reserves = pair.getReserves().call().await.context("getReserves")?;
                Ok(RawPoolRead::V2 {
                    reserve0: U256::from(reserves.reserve0),
                    reserve1: U256::from(reserves.reserve1),
                    block_number,
                })
            }
            VenueTag::UniswapV3Like { .. } => {
                let v3 = UniswapV3Pool::new(pool.address, self.provider.clone());
                let slot0 = v3.slot0().call().await.context("slot0")?;
                Ok(RawPoolRead::V3 {
                    sqrt_price_x96: U256::from(slot0.sqrtPriceX96),
                    tick: slot0.tick.as_i32(),
                    block_number,
                })
            }
            VenueTag::BinnedLb { .. } => {
                let lb = ILbPair::new(pool.address, self.provider.clone());
                let active = lb.getActiveId().call().await.context("getActiveId")?;
                Ok(RawPoolRead::BinnedLb {
                    active_bin_id: active.activeId as i32,
                    reference_bin_id: LB_ID_ONE,
                    block_number,
                })
            }
        }
    }
}

pub struct AlloyChainClient<P> {
    provider: P,
}

impl<P: Provider + Clone + Send + Sync + 'static> AlloyChainClient<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    fn request_from(tx: &PreparedTransaction, from: Address) -> TransactionRequest {
        TransactionRequest {
            from: Some(from),
            to: Some(TxKind::Call(tx.tx.to)),
            value: Some(tx.tx.value),
            input: tx.tx.data.clone().into(),
            chain_id: Some(tx.tx.chain_id),
            nonce: Some(tx.nonce),
            gas: Some(tx.gas_limit),
            max_fee_per_gas: Some(tx.max_fee_per_gas),
            max_priority_fee_per_gas: Some(tx.max_priority_fee_per_gas),
            ..Default::default()
        }
    }
}

#[async_trait]
impl<P: Provider + Clone + Send + Sync + 'static> ChainClient for AlloyChainClient<P> {
    async fn transaction_count(&self, address: Address) -> anyhow::Result<u64> {
        self.provider
            .get_transaction_count(address)
            .await
            .context("get_transaction_count")
    }

    async fn simulate(&self, tx: &PreparedTransaction, from: Address) -> anyhow::Result<()> {
        let request = Self::request_from(tx, from);
        self.provider
            .call(request)
            .await
            .map(|_| ())
            .context("eth_call reverted")
    }

    async fn submit(&self, tx: &PreparedTransaction, from: Address) -> anyhow::Result<String> {
        let request = Self::request_from(tx, from);
        let pending = self
            .provider
            .send_transaction(request)
            .await
            .context("send_transaction")?;
        Ok(format!("{:#x}", pending.tx_hash()))
    }

    async fn wait_for_receipt(&self, tx_hash: &str, timeout: Duration) -> anyhow::Result<Receipt> {
        let hash: alloy::primitives::B256 = tx_hash.parse().context("invalid tx hash")?;
        let deadline = std::time::Instant::now() + timeout;
        loop {
            if let Some(receipt) = self
                .provider
                .get_transaction_receipt(hash)
                .await
                .context("get_transaction_receipt")?
            {
                return Ok(Receipt {
                    success: receipt.status(),
                    gas_used: receipt.gas_used as u64,
                    effective_gas_price_wei: receipt.effective_gas_price,
                    block_number: receipt.block_number.unwrap_or_default(),
                    revert_reason: if receipt.status() { None } else { Some("reverted".to_string()) },
                });
            }
            if std::time::Instant::now() >= deadline {
                anyhow::bail!("confirmation timed out waiting for {tx_hash}");
            }
            debug!(tx_hash, "still waiting for receipt");
            tokio::time::sleep(Duration::from_millis(500)).await;
        }
    }
}

