//! Chain reader.
//!
//! Fetches the chain tip and whole blocks from a [`ChainNode`] and decodes their transactions.
//! Missing or unusable blocks come back as `None`, which callers treat as "retry later".

use super::decoder::TransactionDecoder;
use super::types::{Block, DecodedTransaction, SyncError};
use crate::node::ChainNode;
use crate::utils::timestamp_to_datetime;

use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub struct ChainReader {
	node: Arc<dyn ChainNode>,
	decoder: TransactionDecoder,
}

impl ChainReader {
	pub fn new(node: Arc<dyn ChainNode>, decoder: TransactionDecoder) -> Self {
		Self { node, decoder }
	}

	/// Current height of the chain tip.
	pub async fn height(&self) -> Result<u64, SyncError> {
		self.node.get_height().await.map_err(|e| {
			error!("Failed to get chain height: {}", e);
			SyncError::from(e)
		})
	}

	/// Fetch and decode the block at `height`.
	///
	/// `tip` is the chain height the caller last observed; it determines the confirmation
	/// status of each transaction. Transactions that cannot be fetched or fail validation are
	/// left out of the block.
	pub async fn block(&self, height: u64, tip: u64) -> Option<Block> {
		let details = match self.node.get_block_details(height).await {
			Ok(details) => details,
			Err(e) => {
				warn!("Block {} unavailable: {}", height, e);
				return None;
			}
		};
		if details.height != height {
			warn!(
				"Node returned block {} when asked for block {}",
				details.height, height
			);
			return None;
		}

		let tip = tip.max(height);

		let fetches = details
			.transactions_details
			.iter()
			.map(|summary| self.fetch_decoded(&summary.id, tip));
		let transactions: Vec<DecodedTransaction> =
			join_all(fetches).await.into_iter().flatten().collect();

		if transactions.len() < details.transactions_details.len() {
			debug!(
				"Block {}: decoded {} of {} transactions",
				height,
				transactions.len(),
				details.transactions_details.len()
			);
		}

		Some(Block {
			height,
			timestamp: timestamp_to_datetime(details.timestamp),
			transactions,
		})
	}

	/// Fetch and decode a single transaction by hash.
	pub async fn transaction(&self, tx_hash: &str) -> Option<DecodedTransaction> {
		let tip = match self.node.get_height().await {
			Ok(tip) => tip,
			Err(e) => {
				warn!("Chain height unavailable, cannot read {}: {}", tx_hash, e);
				return None;
			}
		};
		self.fetch_decoded(tx_hash, tip).await
	}

	async fn fetch_decoded(&self, tx_hash: &str, tip: u64) -> Option<DecodedTransaction> {
		let response = match self.node.get_transaction_details(tx_hash).await {
			Ok(response) => response,
			Err(e) => {
				warn!("Skipping transaction {}: {}", tx_hash, e);
				return None;
			}
		};

		match self.decoder.decode(&response, tip) {
			Ok(decoded) => Some(decoded),
			Err(reason) => {
				debug!("Rejected transaction {}: {}", tx_hash, reason);
				None
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{FakeNode, FakeOracle, RawTransaction, account, key_image};
	use crate::wallet::types::ConfirmationStatus;

	fn reader(node: Arc<FakeNode>) -> ChainReader {
		let decoder = TransactionDecoder::new(account(), Arc::new(FakeOracle), 6).unwrap();
		ChainReader::new(node, decoder)
	}

	#[tokio::test]
	async fn reads_blocks_in_node_order() {
		let node = Arc::new(FakeNode::new(120));
		node.add_block(
			100,
			vec![
				RawTransaction::new("b1", 100).owned_output(5).input(key_image(1)).build(),
				RawTransaction::new("b2", 100).foreign_output().input(key_image(2)).build(),
			],
		);

		let block = reader(node.clone()).block(100, 120).await.unwrap();
		assert_eq!(block.height, 100);
		assert!(block.timestamp.is_some());
		let hashes: Vec<&str> = block.transactions.iter().map(|tx| tx.tx_hash.as_str()).collect();
		assert_eq!(hashes, vec!["b1", "b2"]);
		assert_eq!(block.transactions[0].outputs.len(), 1);
	}

	#[tokio::test]
	async fn one_failing_transaction_does_not_fail_the_block() {
		let node = Arc::new(FakeNode::new(120));
		node.add_block(
			100,
			vec![
				RawTransaction::new("c1", 100).owned_output(5).input(key_image(1)).build(),
				RawTransaction::new("c2", 100).owned_output(6).input(key_image(2)).build(),
				RawTransaction::new("c3", 100).input(key_image(3)).build(),
			],
		);
		node.fail_transaction("c1");

		let block = reader(node.clone()).block(100, 120).await.unwrap();
		// c1 fails to fetch, c3 has no outputs and is rejected.
		let hashes: Vec<&str> = block.transactions.iter().map(|tx| tx.tx_hash.as_str()).collect();
		assert_eq!(hashes, vec!["c2"]);
	}

	#[tokio::test]
	async fn block_reads_do_not_depend_on_the_height_endpoint() {
		let node = Arc::new(FakeNode::new(120));
		node.add_block(
			100,
			vec![RawTransaction::new("f1", 100).owned_output(5).input(key_image(1)).build()],
		);
		node.fail_height(true);

		let reader = reader(node);
		let block = reader.block(100, 106).await.unwrap();
		assert_eq!(block.transactions[0].status, ConfirmationStatus::Finished);
		let block = reader.block(100, 104).await.unwrap();
		assert_eq!(block.transactions[0].status, ConfirmationStatus::Unknown);
	}

	#[tokio::test]
	async fn missing_blocks_are_none() {
		let node = Arc::new(FakeNode::new(120));
		assert!(reader(node).block(101, 120).await.is_none());
	}

	#[tokio::test]
	async fn height_failure_is_an_error() {
		let node = Arc::new(FakeNode::new(120));
		let reader = reader(node.clone());
		assert_eq!(reader.height().await.unwrap(), 120);

		node.fail_height(true);
		assert!(matches!(
			reader.height().await,
			Err(SyncError::NodeUnavailable(_))
		));
	}

	#[tokio::test]
	async fn reads_single_transactions() {
		let node = Arc::new(FakeNode::new(120));
		node.add_block(
			100,
			vec![RawTransaction::new("d1", 100).owned_output(9).input(key_image(4)).build()],
		);

		let reader = reader(node);
		let decoded = reader.transaction("d1").await.unwrap();
		assert_eq!(decoded.outputs[0].key_image, FakeOracle::key_image_for("d1", 0));
		assert!(reader.transaction("unknown").await.is_none());
	}
}
