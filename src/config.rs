//! Environment-variable configuration loading.
//!
//! Mirrors the source's `load_config()` idiom (`dotenv::dotenv().ok()` then
//! `std::env::var()?.parse()?` per field) rather than a config-file parser —
//! file-based configuration loading is an explicit non-goal of this engine.

use crate::error::EngineError;
use crate::types::{ChainConfig, PoolConfig, VenueTag};
use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;

/// Execution mode selected by `--dry-run` / `--shadow` / `--live` (or the
/// matching `DRY_RUN`/`SHADOW_MODE` env vars when no flag is given).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Report,
    Shadow,
    Live,
}

#[derive(Debug, Parser)]
#[command(name = "flash-arb-engine", about = "Off-chain flash-loan arbitrage engine")]
pub struct Cli {
    /// Report-only: detect and log opportunities, never build or submit a transaction.
    #[arg(long, env = "DRY_RUN", default_value_t = true)]
    pub dry_run: bool,

    /// Simulate via a pre-broadcast call before (not instead of) considering live submission.
    #[arg(long, env = "SHADOW_MODE", default_value_t = false)]
    pub shadow: bool,

    /// Directory holding the nonce and trade journals. Must already exist.
    #[arg(long, env = "DATA_DIR")]
    pub data_dir: String,

    #[arg(long, env = "POLL_INTERVAL_MS", default_value_t = 1000)]
    pub poll_interval_ms: u64,
}

impl Cli {
    pub fn mode(&self) -> RunMode {
        if self.dry_run {
            RunMode::Report
        } else if self.shadow {
            RunMode::Shadow
        } else {
            RunMode::Live
        }
    }
}

/// Runtime tuning knobs beyond the static `ChainConfig`, all with the
/// "env var, fallback to default" idiom named in SPEC_FULL.md §6.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub freshness_budget_ms: u64,
    pub submit_cooldown_ms: u64,
    pub revert_cooldown_ms: u64,
    pub max_consecutive_failures: u32,
    pub confirmation_timeout_ms: u64,
    pub pending_nonce_timeout_ms: u64,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        Self {
            freshness_budget_ms: env_or("FRESHNESS_BUDGET_MS", 200),
            submit_cooldown_ms: env_or("SUBMIT_COOLDOWN_MS", 10_000),
            revert_cooldown_ms: env_or("REVERT_COOLDOWN_MS", 10_000),
            max_consecutive_failures: env_or("MAX_CONSECUTIVE_FAILURES", 5),
            confirmation_timeout_ms: env_or("CONFIRMATION_TIMEOUT_MS", 120_000),
            pending_nonce_timeout_ms: env_or("PENDING_NONCE_TIMEOUT_MS", 300_000),
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

/// Parses one `POOLS` entry: `label:venue:address:token0:token1:decimals0:decimals1:feeParam`.
/// `venue` is one of `v2`, `v3`, `lb`, `solidly`; `feeParam` is the V3 fee tier or LB bin step
/// (ignored for `v2`/`solidly`, but the field must still be present as `0`).
fn parse_pool_entry(entry: &str) -> Result<PoolConfig> {
    let parts: Vec<&str> = entry.split(':').collect();
    anyhow::ensure!(parts.len() == 8, "malformed POOLS entry: {entry}");
    let label = parts[0].to_string();
    let venue = match parts[1] {
        "v2" => VenueTag::UniswapV2Like,
        "v3" => VenueTag::UniswapV3Like {
            fee_tier: parts[7].parse().context("invalid fee tier")?,
        },
        "lb" => VenueTag::BinnedLb {
            bin_step: parts[7].parse().context("invalid bin step")?,
        },
        "solidly" => VenueTag::SolidlyFork,
        other => anyhow::bail!("unknown venue kind: {other}"),
    };
    Ok(PoolConfig {
        label,
        venue,
        address: parts[2].parse().context("invalid pool address")?,
        token0: parts[3].parse().context("invalid token0")?,
        token1: parts[4].parse().context("invalid token1")?,
        decimals0: parts[5].parse().context("invalid decimals0")?,
        decimals1: parts[6].parse().context("invalid decimals1")?,
        invert_price: false,
    })
}

/// Parses one `ADAPTERS` entry: `venueLabel:address`.
fn parse_adapter_entry(entry: &str) -> Result<(String, Address)> {
    let (label, addr) = entry
        .split_once(':')
        .context("malformed ADAPTERS entry, expected venueLabel:address")?;
    Ok((label.to_string(), addr.parse().context("invalid adapter address")?))
}

impl ChainConfig {
    /// Load from the process environment. Populates a local `.env` file first
    /// via `dotenv`, matching the source's development-convenience pattern.
    pub fn from_env() -> std::result::Result<Self, EngineError> {
        dotenv::dotenv().ok();
        Self::from_env_inner().map_err(|e| EngineError::Configuration(e.to_string()))
    }

    fn from_env_inner() -> Result<Self> {
        let chain_id: u64 = require_env("CHAIN_ID")?.parse().context("invalid CHAIN_ID")?;

        let pools: Vec<PoolConfig> = match std::env::var("POOLS") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .split(',')
                .map(parse_pool_entry)
                .collect::<Result<Vec<_>>>()?,
            _ => Vec::new(),
        };
        anyhow::ensure!(!pools.is_empty(), "no pools configured (POOLS env var is empty)");

        let mut adapters: HashMap<String, Address> = HashMap::new();
        if let Ok(raw) = std::env::var("ADAPTERS") {
            for entry in raw.split(',').filter(|s| !s.trim().is_empty()) {
                let (label, addr) = parse_adapter_entry(entry)?;
                adapters.insert(label, addr);
            }
        }

        let executor_address: Address = require_env("EXECUTOR_ADDRESS")?
            .parse()
            .context("invalid EXECUTOR_ADDRESS")?;

        let risky_venues: HashSet<String> = std::env::var("RISKY_VENUES")
            .unwrap_or_default()
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.to_string())
            .collect();

        let max_input_by_venue: HashMap<String, alloy::primitives::U256> =
            std::env::var("MAX_INPUT_BY_VENUE")
                .unwrap_or_default()
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .filter_map(|entry| {
                    let (label, amount) = entry.split_once(':')?;
                    Some((label.to_string(), alloy::primitives::U256::from_str(amount).ok()?))
                })
                .collect();

        Ok(ChainConfig {
            chain_id,
            is_l2_with_l1_posting: env_or("IS_L2_WITH_L1_POSTING", false),
            flash_loan_provider: require_env("FLASH_LOAN_PROVIDER")?
                .parse()
                .context("invalid FLASH_LOAN_PROVIDER")?,
            flash_loan_fee_bps: env_or("FLASH_LOAN_FEE_BPS", 9u32),
            executor_address,
            pools,
            adapters,
            gas_price_gwei: env_or("GAS_PRICE_GWEI", 30u64),
            gas_limit: env_or("GAS_LIMIT", 600_000u64),
            min_profit_threshold_raw: alloy::primitives::U256::from(env_or::<u128>(
                "MIN_PROFIT_THRESHOLD",
                0,
            )),
            risky_venues,
            max_input_by_venue,
            default_input_amount: alloy::primitives::U256::from(env_or::<u128>(
                "DEFAULT_INPUT_AMOUNT",
                1_000_000_000_000_000_000,
            )),
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var {key}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_pool_entry_v2() {
        let pool = parse_pool_entry(
            "uni-v2-weth-usdc:v2:0x1111111111111111111111111111111111111111:0x2222222222222222222222222222222222222222:0x3333333333333333333333333333333333333333:18:6:0",
        )
        .unwrap();
        assert_eq!(pool.venue, VenueTag::UniswapV2Like);
        assert_eq!(pool.decimals0, 18);
        assert_eq!(pool.decimals1, 6);
    }

    #[test]
    fn test_parse_pool_entry_v3_fee_tier() {
        let pool = parse_pool_entry(
            "uni-v3-500:v3:0x1111111111111111111111111111111111111111:0x2222222222222222222222222222222222222222:0x3333333333333333333333333333333333333333:18:6:500",
        )
        .unwrap();
        assert_eq!(pool.venue, VenueTag::UniswapV3Like { fee_tier: 500 });
    }

    #[test]
    fn test_parse_pool_entry_rejects_wrong_arity() {
        assert!(parse_pool_entry("too:few:fields").is_err());
    }

    #[test]
    fn test_parse_adapter_entry() {
        let (label, addr) =
            parse_adapter_entry("uniswap-v3:0x1111111111111111111111111111111111111111").unwrap();
        assert_eq!(label, "uniswap-v3");
        assert_eq!(addr, Address::from_str("0x1111111111111111111111111111111111111111").unwrap());
    }
}
