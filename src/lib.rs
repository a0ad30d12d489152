//! Off-chain flash-loan arbitrage engine.
//!
//! Pipeline: Price Monitor → Opportunity Detector (backed by the Cost/Gas
//! Model) → Transaction Builder → Execution Engine, wired together over a
//! typed event bus, with a crash-safe Nonce Manager and an append-only Trade
//! Store on the critical path of every LIVE submission.

pub mod builder;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod cooldown;
pub mod cost;
pub mod detector;
pub mod engine;
pub mod error;
pub mod events;
pub mod monitor;
pub mod nonce;
pub mod store;
pub mod types;

pub use config::{Cli, RunMode, RuntimeConfig};
pub use engine::{ChainClient, EngineConfig, EngineRejection, ExecutionEngine};
pub use error::{EngineError, EngineResult};
pub use events::{event_bus, EngineEvent};
pub use types::{ArbitrageOpportunity, ChainConfig, PoolConfig, PriceDelta, PriceSnapshot, TradeOutcome, VenueTag};
