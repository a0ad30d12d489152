//! Price Monitor: polls every configured pool, normalizes to a comparable
//! price, and publishes per-pool updates plus pairwise deltas.
//!
//! Polling shape is grounded on the source's `pool/syncer.rs` (V2 reserve
//! reads, "V2 pools sort tokens by address" correctness note) and
//! `pool/v3_syncer.rs` (fee-tier iteration, decimals caching); the
//! concurrent snapshot cache reuses `pool/state.rs`'s `PoolStateManager`
//! shape (a `DashMap` keyed by pool identity) almost directly. The
//! `ethers::Middleware`-generic transport is replaced by a project-defined
//! `PoolReader` trait so the chain client stays pluggable.

use crate::events::EngineEvent;
use crate::types::{canonical_pair_key, PoolConfig, PriceDelta, PriceSnapshot, VenueTag};
use alloy::primitives::U256;
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast::Sender;
use tracing::{debug, warn};

/// Raw on-chain facts a pool read returns, before price normalization.
pub enum RawPoolRead {
    V2 {
        reserve0: U256,
        reserve1: U256,
        block_number: u64,
    },
    V3 {
        sqrt_price_x96: U256,
        tick: i32,
        block_number: u64,
    },
    BinnedLb {
        active_bin_id: i32,
        reference_bin_id: i32,
        block_number: u64,
    },
}

/// Chain-transport boundary the Monitor depends on instead of a concrete
/// RPC client, so tests can supply an in-memory fake and a different
/// transport crate can stand in for `alloy::providers::Provider` without
/// touching this module.
#[async_trait]
pub trait PoolReader: Send + Sync {
    async fn read_pool(&self, pool: &PoolConfig) -> anyhow::Result<RawPoolRead>;
}

const MAX_RETRIES: u32 = 5;

struct PoolTracking {
    consecutive_failures: AtomicU32,
    stale: std::sync::atomic::AtomicBool,
}

pub struct PriceMonitor<R: PoolReader> {
    reader: Arc<R>,
    pools: Vec<PoolConfig>,
    snapshots: Arc<DashMap<String, PriceSnapshot>>,
    tracking: Arc<DashMap<String, PoolTracking>>,
    events: Sender<EngineEvent>,
    min_reserve_base: U256,
    delta_threshold_percent: f64,
}

impl<R: PoolReader> PriceMonitor<R> {
    pub fn new(
        reader: Arc<R>,
        pools: Vec<PoolConfig>,
        events: Sender<EngineEvent>,
        min_reserve_base: U256,
        delta_threshold_percent: f64,
    ) -> Self {
        let tracking = Arc::new(DashMap::new());
        for pool in &pools {
            tracking.insert(
                pool.label.clone(),
                PoolTracking {
                    consecutive_failures: AtomicU32::new(0),
                    stale: std::sync::atomic::AtomicBool::new(false),
                },
            );
        }
        Self {
            reader,
            pools,
            snapshots: Arc::new(DashMap::new()),
            tracking,
            events,
            min_reserve_base,
            delta_threshold_percent,
        }
    }

    pub fn latest(&self, pool_label: &str) -> Option<PriceSnapshot> {
        self.snapshots.get(pool_label).map(|e| e.clone())
    }

    pub fn is_stale(&self, pool_label: &str) -> bool {
        self.tracking
            .get(pool_label)
            .map(|t| t.stale.load(Ordering::Relaxed))
            .unwrap_or(true)
    }

    /// Runs one polling cycle across all configured pools, publishing
    /// `priceUpdate` before any `delta` that references it, as required by
    /// the ordering guarantee.
    pub async fn poll_once(&self, now_ms: u64) {
        for pool in &self.pools {
            match self.reader.read_pool(pool).await {
                Ok(raw) => {
                    self.record_success(pool);
                    if let Some(snapshot) = normalize(pool, raw, now_ms) {
                        self.publish_snapshot(pool, snapshot);
                    }
                }
                Err(e) => {
                    self.record_failure(pool, &e);
                }
            }
        }
        self.detect_deltas(now_ms);
    }

    fn record_success(&self, pool: &PoolConfig) {
        if let Some(t) = self.tracking.get(&pool.label) {
            t.consecutive_failures.store(0, Ordering::Relaxed);
            t.stale.store(false, Ordering::Relaxed);
        }
    }

    fn record_failure(&self, pool: &PoolConfig, err: &anyhow::Error) {
        warn!(pool = %pool.label, error = %err, "pool read failed");
        if let Some(t) = self.tracking.get(&pool.label) {
            let failures = t.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures >= MAX_RETRIES {
                t.stale.store(true, Ordering::Relaxed);
                let _ = self.events.send(EngineEvent::Stale { pool: pool.label.clone() });
            }
        }
    }

    fn publish_snapshot(&self, pool: &PoolConfig, snapshot: PriceSnapshot) {
        // Monotonic block number per pool: don't republish a snapshot whose
        // block hasn't advanced, but still update the cached value.
        let should_publish = self
            .snapshots
            .get(&pool.label)
            .map(|prev| snapshot.block_number > prev.block_number)
            .unwrap_or(true);
        self.snapshots.insert(pool.label.clone(), snapshot.clone());
        if should_publish {
            let _ = self.events.send(EngineEvent::PriceUpdate(snapshot));
        }
    }

    /// Groups fresh, liquid snapshots by canonical pair key and emits a
    /// `delta` event for any pair whose spread clears the threshold.
    fn detect_deltas(&self, now_ms: u64) {
        let mut by_pair: HashMap<String, Vec<(PoolConfig, PriceSnapshot)>> = HashMap::new();
        for pool in &self.pools {
            if self.is_stale(&pool.label) {
                continue;
            }
            if !self.passes_liquidity_filter(pool) {
                continue;
            }
            if let Some(snapshot) = self.latest(&pool.label) {
                by_pair
                    .entry(pool.pair_key())
                    .or_default()
                    .push((pool.clone(), snapshot));
            }
        }

        for (pair, entries) in by_pair {
            if entries.len() < 2 {
                continue;
            }
            let min_entry = entries
                .iter()
                .min_by(|a, b| a.1.price.partial_cmp(&b.1.price).unwrap());
            let max_entry = entries
                .iter()
                .max_by(|a, b| a.1.price.partial_cmp(&b.1.price).unwrap());
            if let (Some((_, min_snap)), Some((_, max_snap))) = (min_entry, max_entry) {
                if let Some(delta) = PriceDelta::from_snapshots(
                    pair,
                    min_snap.clone(),
                    max_snap.clone(),
                    now_ms,
                ) {
                    if delta.delta_percent >= self.delta_threshold_percent {
                        debug!(pair = %delta.pair, delta_percent = delta.delta_percent, "delta detected");
                        let _ = self.events.send(EngineEvent::Delta(delta));
                    }
                }
            }
        }
    }

    fn passes_liquidity_filter(&self, pool: &PoolConfig) -> bool {
        if !matches!(pool.venue, VenueTag::UniswapV2Like | VenueTag::SolidlyFork) {
            return true;
        }
        match self.latest(&pool.label).and_then(|s| s.reserve0) {
            Some(reserve0) => reserve0 >= self.min_reserve_base,
            None => true,
        }
    }
}

/// Converts a raw on-chain read into a decimal-normalized price snapshot
/// per the three polling algorithms in SPEC_FULL.md §4.1.
fn normalize(pool: &PoolConfig, raw: RawPoolRead, now_ms: u64) -> Option<PriceSnapshot> {
    let price = match &raw {
        RawPoolRead::V2 { reserve0, reserve1, .. } => {
            let r0 = reserve0.to::<u128>() as f64;
            let r1 = reserve1.to::<u128>() as f64;
            if r0 == 0.0 {
                return None;
            }
            let decimal_adjustment = 10f64.powi(pool.decimals0 as i32 - pool.decimals1 as i32);
            (r1 / r0) * decimal_adjustment
        }
        RawPoolRead::V3 { tick, .. } => price_from_tick(*tick, pool.decimals0, pool.decimals1),
        RawPoolRead::BinnedLb {
            active_bin_id,
            reference_bin_id,
            ..
        } => {
            let VenueTag::BinnedLb { bin_step } = pool.venue else {
                return None;
            };
            let step = bin_step as f64 / 10_000.0;
            let decimal_adjustment = 10f64.powi(pool.decimals0 as i32 - pool.decimals1 as i32);
            (1.0 + step).powi(active_bin_id - reference_bin_id) * decimal_adjustment
        }
    };

    if price <= 0.0 {
        return None;
    }
    let price = if pool.invert_price { 1.0 / price } else { price };

    let block_number = match &raw {
        RawPoolRead::V2 { block_number, .. }
        | RawPoolRead::V3 { block_number, .. }
        | RawPoolRead::BinnedLb { block_number, .. } => *block_number,
    };

    let mut snapshot = PriceSnapshot::new(pool.label.clone(), price, block_number, now_ms);
    if let RawPoolRead::V2 { reserve0, reserve1, .. } = raw {
        snapshot.reserve0 = Some(reserve0);
        snapshot.reserve1 = Some(reserve1);
    }
    if let RawPoolRead::V3 { sqrt_price_x96, .. } = raw {
        snapshot.sqrt_price_x96 = Some(sqrt_price_x96);
    }
    Some(snapshot)
}

/// price = 1.0001^tick * 10^(decimals0 - decimals1). Preferred over squaring
/// the Q64.96 sqrt-price in f64, which is prone to precision loss at the
/// values real pools reach (matches the source's documented reasoning).
fn price_from_tick(tick: i32, decimals0: u8, decimals1: u8) -> f64 {
    let base: f64 = 1.0001;
    let price = base.powi(tick);
    let decimal_adjustment = 10f64.powi(decimals0 as i32 - decimals1 as i32);
    price * decimal_adjustment
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;

    fn v2_pool(label: &str, decimals0: u8, decimals1: u8) -> PoolConfig {
        PoolConfig {
            label: label.to_string(),
            venue: VenueTag::UniswapV2Like,
            address: Address::ZERO,
            token0: Address::ZERO,
            token1: Address::with_last_byte(1),
            decimals0,
            decimals1,
            invert_price: false,
        }
    }

    #[test]
    fn test_normalize_v2_applies_decimal_adjustment() {
        let pool = v2_pool("p", 18, 6);
        let raw = RawPoolRead::V2 {
            reserve0: U256::from(1_000_000_000_000_000_000u128), // 1 WETH
            reserve1: U256::from(3_000_000_000u128),             // 3000 USDC (6 decimals)
            block_number: 100,
        };
        let snapshot = normalize(&pool, raw, 1_000).unwrap();
        assert!((snapshot.price - 3000.0).abs() < 1e-6);
    }

    #[test]
    fn test_normalize_v3_tick_price() {
        let pool = v2_pool("p", 18, 6);
        // tick chosen so 1.0001^tick ≈ 3e-4 (WETH per USDC raw ratio before decimals)
        let tick = (3e-4_f64.ln() / 1.0001_f64.ln()).round() as i32;
        let raw = RawPoolRead::V3 {
            sqrt_price_x96: U256::ZERO,
            tick,
            block_number: 100,
        };
        let snapshot = normalize(&pool, raw, 1_000).unwrap();
        assert!(snapshot.price > 0.0);
    }

    #[test]
    fn test_normalize_rejects_zero_reserve() {
        let pool = v2_pool("p", 18, 6);
        let raw = RawPoolRead::V2 {
            reserve0: U256::ZERO,
            reserve1: U256::from(1u64),
            block_number: 1,
        };
        assert!(normalize(&pool, raw, 0).is_none());
    }

    #[tokio::test]
    async fn test_poll_once_marks_stale_after_max_retries() {
        struct AlwaysFails;
        #[async_trait]
        impl PoolReader for AlwaysFails {
            async fn read_pool(&self, _pool: &PoolConfig) -> anyhow::Result<RawPoolRead> {
                anyhow::bail!("rpc down")
            }
        }
        let (tx, mut rx) = tokio::sync::broadcast::channel(16);
        let monitor = PriceMonitor::new(
            Arc::new(AlwaysFails),
            vec![v2_pool("p", 18, 6)],
            tx,
            U256::ZERO,
            0.3,
        );
        for _ in 0..MAX_RETRIES {
            monitor.poll_once(0).await;
        }
        assert!(monitor.is_stale("p"));
        let mut saw_stale = false;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, EngineEvent::Stale { .. }) {
                saw_stale = true;
            }
        }
        assert!(saw_stale);
    }
}
