//! Trade Store: append-only newline-delimited journal of `TradeOutcome`
//! records with three-bucket accounting. The single-owned-append-only-file
//! discipline is grounded on the source's `tax/csv_logger.rs::TaxCsvLogger`,
//! generalized from CSV rows to newline-delimited JSON so the nested
//! `CostEstimate` round-trips without a bespoke column schema.

use crate::types::{TradeOutcome, TradeStatus};
use anyhow::{Context, Result};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct TradeStore {
    path: PathBuf,
    file: Mutex<File>,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SessionAggregates {
    pub total_trades: u64,
    pub successes: u64,
    pub reverts: u64,
    pub simulation_reverts: u64,
    pub net_profit: i128,
}

impl TradeStore {
    /// Opens the journal at `path` in append mode, holding the handle for
    /// the process lifetime so no other writer can interleave records.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("failed to open trade journal")?;
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Appends one record. Never mutates or rewrites a prior line.
    pub fn append(&self, outcome: &TradeOutcome) -> Result<()> {
        let line = serde_json::to_string(outcome).context("failed to serialize trade outcome")?;
        let mut file = self.file.lock().unwrap();
        writeln!(file, "{line}").context("failed to append trade outcome")?;
        file.flush().context("failed to flush trade journal")?;
        Ok(())
    }

    /// Streams the journal to compute session aggregates without loading
    /// the whole file into memory at once.
    pub fn aggregates(&self) -> Result<SessionAggregates> {
        let file = File::open(&self.path).context("failed to reopen trade journal for read")?;
        let reader = BufReader::new(file);
        let mut aggregates = SessionAggregates::default();
        for line in reader.lines() {
            let line = line.context("failed to read trade journal line")?;
            if line.trim().is_empty() {
                continue;
            }
            let outcome: TradeOutcome =
                serde_json::from_str(&line).context("failed to parse trade journal line")?;
            aggregates.total_trades += 1;
            aggregates.net_profit += outcome.net_profit_raw();
            match outcome.status {
                TradeStatus::Success => aggregates.successes += 1,
                TradeStatus::Revert => aggregates.reverts += 1,
                TradeStatus::SimulationRevert => aggregates.simulation_reverts += 1,
            }
        }
        Ok(aggregates)
    }
}
