//! Nonce Manager: crash-safe sequence counter reconciled with on-chain state.
//!
//! Persistence reuses the source's `data_collector/shared_state.rs::write_to_file`
//! pattern verbatim — serialize, write to a `.tmp` sibling, then `rename` over
//! the target — applied here to nonce state instead of pool snapshots.

use crate::error::EngineError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingNonce {
    pub nonce: u64,
    pub tx_hash: String,
    pub submitted_at_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NonceState {
    pub next_nonce: u64,
    pub pending: Option<PendingNonce>,
    pub last_synced_from_chain: u64,
}

impl Default for NonceState {
    fn default() -> Self {
        Self {
            next_nonce: 0,
            pending: None,
            last_synced_from_chain: 0,
        }
    }
}

pub enum PendingStatus {
    NoneInFlight,
    StillPending,
    TimedOut,
}

pub struct NonceManager {
    path: PathBuf,
    state: NonceState,
    pending_timeout_ms: u64,
}

fn now_ms() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_millis() as u64
}

impl NonceManager {
    /// Opens the journal at `path`, creating a fresh `NonceState` if the
    /// file doesn't exist yet.
    pub fn open(path: impl AsRef<Path>, pending_timeout_ms: u64) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            Self::read_from_file(&path)?
        } else {
            NonceState::default()
        };
        Ok(Self {
            path,
            state,
            pending_timeout_ms,
        })
    }

    fn read_from_file(path: &Path) -> Result<NonceState> {
        let json = std::fs::read_to_string(path).context("failed to read nonce journal")?;
        serde_json::from_str(&json).context("failed to parse nonce journal")
    }

    fn persist(&self) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.state).context("failed to serialize nonce state")?;
        let temp_path = self.path.with_extension("tmp");
        std::fs::write(&temp_path, &json).context("failed to write temp nonce file")?;
        std::fs::rename(&temp_path, &self.path).context("failed to rename temp nonce file")?;
        Ok(())
    }

    /// Reconciles `next_nonce` against the on-chain transaction count.
    /// If the confirmed count has passed the pending entry's nonce, clear it.
    pub fn sync_from_chain(&mut self, chain_transaction_count: u64, block_number: u64) -> Result<()> {
        if chain_transaction_count > self.state.next_nonce {
            self.state.next_nonce = chain_transaction_count;
        }
        if let Some(pending) = &self.state.pending {
            if pending.nonce < chain_transaction_count {
                self.state.pending = None;
            }
        }
        self.state.last_synced_from_chain = block_number;
        self.persist()
    }

    fn pending_status(&self) -> PendingStatus {
        match &self.state.pending {
            None => PendingStatus::NoneInFlight,
            Some(pending) => {
                if now_ms().saturating_sub(pending.submitted_at_ms) > self.pending_timeout_ms {
                    PendingStatus::TimedOut
                } else {
                    PendingStatus::StillPending
                }
            }
        }
    }

    /// Returns the next usable nonce. `u64::MAX` is treated as corruption per
    /// the boundary behavior in SPEC_FULL.md §8.
    pub fn get_next_nonce(&self) -> std::result::Result<(u64, PendingStatus), EngineError> {
        if self.state.next_nonce == u64::MAX {
            return Err(EngineError::NonceInconsistent(
                "next_nonce at u64::MAX".to_string(),
            ));
        }
        Ok((self.state.next_nonce, self.pending_status()))
    }

    pub fn mark_submitted(&mut self, nonce: u64, tx_hash: String) -> Result<()> {
        self.state.pending = Some(PendingNonce {
            nonce,
            tx_hash,
            submitted_at_ms: now_ms(),
        });
        self.persist()
    }

    pub fn mark_confirmed(&mut self, tx_hash: &str) -> Result<()> {
        if let Some(pending) = &self.state.pending {
            if pending.tx_hash == tx_hash {
                self.state.next_nonce = pending.nonce + 1;
                self.state.pending = None;
            }
        }
        self.persist()
    }

    /// A pending entry past timeout whose tx was dropped: reuse its nonce
    /// instead of advancing past a gap.
    pub fn reclaim_dropped_pending(&mut self) -> Result<Option<u64>> {
        if let Some(pending) = self.state.pending.take() {
            self.persist()?;
            return Ok(Some(pending.nonce));
        }
        Ok(None)
    }

    pub fn state(&self) -> &NonceState {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_through_file() {
        let dir = std::env::temp_dir().join(format!("nonce-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("nonce.json");

        let mut manager = NonceManager::open(&path, 300_000).unwrap();
        manager.mark_submitted(5, "0xabc".to_string()).unwrap();
        manager.mark_confirmed("0xabc").unwrap();
        assert_eq!(manager.state().next_nonce, 6);
        assert!(manager.state().pending.is_none());

        let reopened = NonceManager::open(&path, 300_000).unwrap();
        assert_eq!(reopened.state().next_nonce, 6);

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_max_nonce_is_corruption() {
        let dir = std::env::temp_dir().join(format!("nonce-test2-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("nonce.json");
        let mut manager = NonceManager::open(&path, 300_000).unwrap();
        manager.state.next_nonce = u64::MAX;
        assert!(manager.get_next_nonce().is_err());
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_sync_from_chain_clears_stale_pending() {
        let dir = std::env::temp_dir().join(format!("nonce-test3-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("nonce.json");
        let mut manager = NonceManager::open(&path, 300_000).unwrap();
        manager.mark_submitted(3, "0xdead".to_string()).unwrap();
        manager.sync_from_chain(10, 100).unwrap();
        assert!(manager.state().pending.is_none());
        assert_eq!(manager.state().next_nonce, 10);
        std::fs::remove_dir_all(&dir).ok();
    }
}
