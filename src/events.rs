//! Typed event bus. Replaces the source's callback-style subscriptions with a
//! single broadcast channel so every component can publish without knowing
//! its subscribers, and ordering within one sender is preserved (FIFO per
//! `tokio::sync::broadcast::Sender`).

use crate::types::{ArbitrageOpportunity, PriceDelta, PriceSnapshot, TradeOutcome};
use tokio::sync::broadcast;

#[derive(Debug, Clone)]
pub enum EngineEvent {
    PriceUpdate(PriceSnapshot),
    Delta(PriceDelta),
    OpportunityFound(ArbitrageOpportunity),
    OpportunityRejected { reason: String, pair: String },
    Submitted { pair: String, tx_hash: String },
    Confirmed { pair: String, outcome: TradeOutcome },
    Reverted { pair: String, outcome: TradeOutcome },
    Stale { pool: String },
    Error { message: String },
    WsConnected,
    WsDisconnected,
    WsReconnecting,
}

/// Default channel capacity. Slow subscribers that fall more than this many
/// events behind start missing messages (`broadcast::error::RecvError::Lagged`);
/// the orchestrator logs and continues rather than treating lag as fatal.
pub const EVENT_BUS_CAPACITY: usize = 1024;

pub fn event_bus() -> (broadcast::Sender<EngineEvent>, broadcast::Receiver<EngineEvent>) {
    broadcast::channel(EVENT_BUS_CAPACITY)
}
