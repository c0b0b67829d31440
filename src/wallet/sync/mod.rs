//! Wallet Synchronization Module
//!
//! This module drives the key-image ledger forward as the chain grows. It is composed of:
//!
//! - `engine`: The worker that schedules scan passes and resyncs and applies decoded blocks to the ledger.
//! - `progress_tracker`: Tracks blocks and key images processed by a scan pass and logs progress.
//!
//! The engine is owned by the wallet `Controller`; nothing else can start, stop or resync it.

/// Scan and resync scheduling
mod engine;
/// Tracks scan progress and statistics
pub mod progress_tracker;

pub(crate) use engine::SyncEngine;
pub use engine::{EngineStatus, ResyncReport, ScanOutcome};
