//! Escalating per-route backoff, generalized from the source's
//! `arbitrage/cooldown.rs::RouteCooldown` from block-counted cooldowns
//! (Polygon-block-time-specific) to millisecond-counted ones so the engine
//! stays chain-agnostic. Escalation factor and cap preserved as-is.

use std::collections::HashMap;
use std::time::{Duration, Instant};

pub type RouteKey = (String, String, String); // (pair, buy_venue, sell_venue)

const ESCALATION_FACTOR: u64 = 5;
const DEFAULT_MAX_COOLDOWN_MS: u64 = 6_480_000; // ~1800 "blocks" at 3.6s equivalent, 1.8 hours

struct CooldownEntry {
    last_failed_at: Instant,
    cooldown: Duration,
    failure_count: u32,
}

pub struct RouteCooldown {
    entries: HashMap<RouteKey, CooldownEntry>,
    initial_cooldown: Duration,
    max_cooldown: Duration,
}

impl RouteCooldown {
    pub fn new(initial_cooldown: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            initial_cooldown,
            max_cooldown: Duration::from_millis(DEFAULT_MAX_COOLDOWN_MS),
        }
    }

    pub fn is_cooled_down(&self, key: &RouteKey, now: Instant) -> bool {
        if self.initial_cooldown.is_zero() {
            return true;
        }
        match self.entries.get(key) {
            Some(entry) => now.duration_since(entry.last_failed_at) >= entry.cooldown,
            None => true,
        }
    }

    /// Escalates `initial_cooldown * FACTOR^(failures-1)`, capped at `max_cooldown`.
    pub fn record_failure(&mut self, key: RouteKey, now: Instant) {
        let entry = self.entries.entry(key).or_insert_with(|| CooldownEntry {
            last_failed_at: now,
            cooldown: self.initial_cooldown,
            failure_count: 0,
        });
        entry.failure_count += 1;
        entry.last_failed_at = now;
        let factor = ESCALATION_FACTOR.saturating_pow(entry.failure_count.saturating_sub(1));
        let escalated = self.initial_cooldown.saturating_mul(factor as u32);
        entry.cooldown = escalated.min(self.max_cooldown);
    }

    /// Instant reset on success — no lingering partial cooldown.
    pub fn record_success(&mut self, key: &RouteKey) {
        self.entries.remove(key);
    }

    pub fn cleanup(&mut self, now: Instant) {
        self.entries
            .retain(|_, entry| now.duration_since(entry.last_failed_at) < entry.cooldown);
    }

    pub fn active_count(&self) -> usize {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> RouteKey {
        ("WETH-USDC".to_string(), "uniswapV3-like".to_string(), "uniswapV2-like".to_string())
    }

    #[test]
    fn test_no_cooldown_initially() {
        let cooldown = RouteCooldown::new(Duration::from_millis(10_000));
        assert!(cooldown.is_cooled_down(&key(), Instant::now()));
    }

    #[test]
    fn test_cooldown_after_failure() {
        let mut cooldown = RouteCooldown::new(Duration::from_millis(10_000));
        let now = Instant::now();
        cooldown.record_failure(key(), now);
        assert!(!cooldown.is_cooled_down(&key(), now));
    }

    #[test]
    fn test_escalating_backoff() {
        let mut cooldown = RouteCooldown::new(Duration::from_millis(10));
        let now = Instant::now();
        let expected = [10u64, 50, 250, 1250, 6250];
        for exp in expected {
            cooldown.record_failure(key(), now);
            let entry = cooldown.entries.get(&key()).unwrap();
            assert_eq!(entry.cooldown.as_millis() as u64, exp.min(DEFAULT_MAX_COOLDOWN_MS));
        }
    }

    #[test]
    fn test_success_resets_cooldown() {
        let mut cooldown = RouteCooldown::new(Duration::from_millis(10_000));
        let now = Instant::now();
        cooldown.record_failure(key(), now);
        cooldown.record_success(&key());
        assert!(cooldown.is_cooled_down(&key(), now));
    }

    #[test]
    fn test_different_routes_independent() {
        let mut cooldown = RouteCooldown::new(Duration::from_millis(10_000));
        let now = Instant::now();
        let other = ("WBTC-USDC".to_string(), "uniswapV3-like".to_string(), "uniswapV2-like".to_string());
        cooldown.record_failure(key(), now);
        assert!(cooldown.is_cooled_down(&other, now));
    }

    #[test]
    fn test_disabled_when_zero() {
        let cooldown = RouteCooldown::new(Duration::ZERO);
        assert!(cooldown.is_cooled_down(&key(), Instant::now()));
    }
}
