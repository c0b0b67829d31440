//! Lifecycle facade for the synchronizer.
//!
//! The `Controller` is the only owner of its sync engine: it builds the engine from a node,
//! an account and an oracle, and exposes start, stop, resync and the balance stream.

use super::balance::BalanceStream;
use super::chain_reader::ChainReader;
use super::decoder::TransactionDecoder;
use super::keys::{AccountKeys, KeyImage};
use super::ledger::KeyImageRecord;
use super::oracle::CryptoOracle;
use super::sync::{EngineStatus, ResyncReport, ScanOutcome, SyncEngine};
use super::types::SyncError;
use crate::config::{SyncConfig, WalletSyncConfig};
use crate::node::{ChainNode, DaemonRpcClient};

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

pub struct Controller {
	engine: SyncEngine,
}

impl Controller {
	/// Create a controller talking to the node described by `config`.
	///
	/// # Arguments
	/// * `config` - Node connection and sync settings.
	/// * `account` - Address and secret keys of the wallet to track.
	/// * `oracle` - Cryptographic functions used to recognise owned outputs.
	///
	/// # Returns
	/// A stopped controller, or an error if the configuration or account is invalid.
	pub fn new(
		config: WalletSyncConfig,
		account: AccountKeys,
		oracle: Arc<dyn CryptoOracle>,
	) -> Result<Self, SyncError> {
		let node = DaemonRpcClient::new(&config.node)?;
		Self::with_node(Arc::new(node), account, oracle, config.sync)
	}

	/// Create a controller over an arbitrary chain-node implementation.
	pub fn with_node(
		node: Arc<dyn ChainNode>,
		account: AccountKeys,
		oracle: Arc<dyn CryptoOracle>,
		config: SyncConfig,
	) -> Result<Self, SyncError> {
		config.validate()?;
		let decoder = TransactionDecoder::new(account, oracle, config.confirmation_threshold)?;
		let reader = ChainReader::new(node, decoder);

		Ok(Self {
			engine: SyncEngine::new(reader, &config),
		})
	}

	/// Start polling. Fails with `AlreadyRunning` if the engine is running.
	pub fn start(&mut self) -> Result<(), SyncError> {
		self.engine.start()
	}

	/// Stop polling and wait for the worker to exit.
	pub async fn stop(&mut self) {
		self.engine.stop().await
	}

	/// Re-verify the unspent outputs recorded at or above `start_height`.
	///
	/// Requests are processed one at a time in submission order. A failure is returned to the
	/// caller; the engine keeps polling.
	pub async fn resync(&self, start_height: u64) -> Result<ResyncReport, SyncError> {
		let report = self.engine.resync(start_height).await.inspect_err(|e| {
			warn!("Resync from height {} failed: {}", start_height, e);
		})?;

		info!(
			"Resync from height {} reprocessed {} blocks ({} unavailable)",
			start_height,
			report.reprocessed.len(),
			report.missing.len()
		);
		Ok(report)
	}

	/// Run a scan pass now, unless one is already in flight.
	pub async fn trigger_scan(&self) -> Result<ScanOutcome, SyncError> {
		self.engine.trigger_scan().await
	}

	/// Subscribe to balance changes. The current balance is delivered first.
	pub fn subscribe_balance(&self) -> BalanceStream {
		self.engine.subscribe_balance()
	}

	/// Wait until the engine stops.
	///
	/// Resolves with the scan error if the engine stopped itself, and immediately if the engine
	/// is not running.
	pub async fn wait(&self) -> Result<(), SyncError> {
		let mut status = self.engine.status();
		let status = status
			.wait_for(|status| *status != EngineStatus::Running)
			.await
			.map_err(|_| SyncError::EngineGone("status channel closed".to_string()))?
			.clone();

		match status {
			EngineStatus::Failed(e) => Err(e),
			_ => Ok(()),
		}
	}

	pub fn is_running(&self) -> bool {
		self.engine.is_running()
	}

	/// Height the next scan pass starts from.
	pub fn next_height(&self) -> u64 {
		self.engine.next_height()
	}

	/// Current balance as a decimal string.
	pub fn balance(&self) -> String {
		self.engine.balance()
	}

	/// Copy of the unspent key images and their records.
	pub fn key_images(&self) -> HashMap<KeyImage, KeyImageRecord> {
		self.engine.key_images()
	}
}
