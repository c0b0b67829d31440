//! Progress tracking for scan passes.
//!
//! This module provides the `ScanProgress` tracker, which records which heights a scan pass
//! applied, which blocks were unavailable, and how many key images were credited or spent.
//! It logs progress at regular height intervals and a summary when the pass ends.

use crate::wallet::ledger::TransactionEffect;
use tracing::{debug, info};

/// Heights between two progress log lines
const LOG_EVERY_HEIGHTS: u64 = 1000;

/// Tracker for a single scan pass
#[derive(Debug, Clone)]
pub struct ScanProgress {
    /// First height of the pass
    start_height: u64,
    /// Chain height the pass is catching up to
    target_height: u64,
    /// Highest height applied so far
    highest_applied: Option<u64>,
    /// Blocks applied to the ledger
    blocks_applied: usize,
    /// Heights the node could not serve
    missing_heights: Vec<u64>,
    /// Decoded transactions applied
    transactions_applied: usize,
    /// Key images inserted or updated
    key_images_credited: usize,
    /// Key images removed by spends
    key_images_retracted: usize,
    /// Height at which progress was last logged
    last_logged_height: u64,
}

impl ScanProgress {
    /// Create a tracker for a pass covering `start_height..=target_height`.
    pub fn new(start_height: u64, target_height: u64) -> Self {
        Self {
            start_height,
            target_height,
            highest_applied: None,
            blocks_applied: 0,
            missing_heights: Vec::new(),
            transactions_applied: 0,
            key_images_credited: 0,
            key_images_retracted: 0,
            last_logged_height: start_height,
        }
    }

    /// Record a block applied at `height` with its combined effect on the ledger
    pub fn record_block(&mut self, height: u64, transactions: usize, effect: &TransactionEffect) {
        self.highest_applied = Some(self.highest_applied.map_or(height, |h| h.max(height)));
        self.blocks_applied += 1;
        self.transactions_applied += transactions;
        self.key_images_credited += effect.credited;
        self.key_images_retracted += effect.retracted;
    }

    /// Record a height the node had no usable block for
    pub fn record_missing(&mut self, height: u64) {
        self.missing_heights.push(height);
    }

    /// Log progress every `LOG_EVERY_HEIGHTS` heights or when forced
    pub fn log_progress(&mut self, force: bool) {
        let Some(highest) = self.highest_applied else {
            return;
        };

        if force || highest.saturating_sub(self.last_logged_height) >= LOG_EVERY_HEIGHTS {
            info!(
                "Scan progress: height {} of {}, {} transactions applied",
                highest, self.target_height, self.transactions_applied
            );
            self.last_logged_height = highest;
        }
    }

    /// Get statistics for the pass so far
    pub fn stats(&self) -> ScanStats {
        ScanStats {
            start_height: self.start_height,
            target_height: self.target_height,
            highest_applied: self.highest_applied,
            blocks_applied: self.blocks_applied,
            missing_heights: self.missing_heights.clone(),
            transactions_applied: self.transactions_applied,
            key_images_credited: self.key_images_credited,
            key_images_retracted: self.key_images_retracted,
        }
    }

    /// Log the end-of-pass summary
    pub fn log_summary(&self) {
        let stats = self.stats();
        if stats.blocks_applied == 0 && stats.missing_heights.is_empty() {
            debug!("{}", stats.summary());
        } else {
            info!("{}", stats.summary());
        }
    }
}

/// Statistics about one scan pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanStats {
    pub start_height: u64,
    pub target_height: u64,
    pub highest_applied: Option<u64>,
    pub blocks_applied: usize,
    pub missing_heights: Vec<u64>,
    pub transactions_applied: usize,
    pub key_images_credited: usize,
    pub key_images_retracted: usize,
}

impl ScanStats {
    /// Get a human-readable summary of the scan statistics
    pub fn summary(&self) -> String {
        format!(
            "Scan from {} to {}: {} blocks, {} transactions, {} key images credited, {} spent{}",
            self.start_height,
            self.highest_applied
                .map_or_else(|| "-".to_string(), |h| h.to_string()),
            self.blocks_applied,
            self.transactions_applied,
            self.key_images_credited,
            self.key_images_retracted,
            if self.missing_heights.is_empty() {
                String::new()
            } else {
                format!(" (blocks unavailable: {:?})", self.missing_heights)
            }
        )
    }
}
