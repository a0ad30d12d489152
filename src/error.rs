//! Closed set of error kinds the engine can raise, matching the recovery
//! policy table: transient transport errors are retried by the caller,
//! configuration and fatal errors stop the process.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("transport error reading {pool}: {source}")]
    Transport {
        pool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to decode on-chain response for {pool}: {source}")]
    Decode {
        pool: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("snapshot for {pool} is stale ({age_ms}ms old)")]
    Stale { pool: String, age_ms: u64 },

    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("resolved adapter for venue {venue} is the zero address")]
    ZeroAdapter { venue: String },

    #[error("transaction reverted: {reason}")]
    Reverted { reason: String },

    #[error("nonce state inconsistent: {0}")]
    NonceInconsistent(String),

    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    /// Process exit code this error should map to when surfaced from `main`.
    pub fn exit_code(&self) -> i32 {
        match self {
            EngineError::Configuration(_) => 2,
            EngineError::Fatal(_) => 3,
            EngineError::NonceInconsistent(_) => 4,
            _ => 1,
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
