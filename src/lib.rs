//! Wallet-side synchronizer that tracks spendable outputs by key image.
//!
//! The crate polls a chain node for new blocks, recognises outputs paying the configured
//! account through an external cryptographic oracle, and keeps a ledger of unspent key images
//! whose sum is the wallet balance.

pub mod config;
pub mod logging;
pub mod node;
pub mod utils;
pub mod wallet;

#[cfg(test)]
mod testing;

pub use config::{NodeConfig, SyncConfig, WalletSyncConfig};
pub use wallet::{AccountKeys, BalanceStream, Controller, CryptoOracle, SyncError};
