//! In-memory collaborators shared by the unit tests.

use crate::node::{
	BlockDetails, ChainNode, NodeError, STATUS_OK, TransactionDetailsResponse, TransactionInfo,
	TransactionSummary,
};
use crate::utils::Amount;
use crate::wallet::{
	AccountKeys, AddressKeys, ConfirmationStatus, CryptoOracle, DecodedTransaction, KeyImage,
	OwnedOutput,
};

use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet};
use tokio::sync::watch;

pub const ADDRESS: &str = "ZxCVkN3aQYHRLq8x2GzW4Mp7fuJg1tPYEjS";
pub const VIEW_SECRET: &str = "1ab5e6038ab6d8d5d9e9e4e6f59b585e2a1dc2e8c04550b7b50a396ca251ef06";
pub const SPEND_SECRET: &str = "79bbc3cb7b134d55e768a3422c0c68fb84729bc22470e31c4a238ebda9f09105";
pub const BLOCK_TIMESTAMP: u64 = 1_700_000_000;

pub fn account() -> AccountKeys {
	AccountKeys::new(ADDRESS, VIEW_SECRET, Some(SPEND_SECRET)).unwrap()
}

pub fn view_only_account() -> AccountKeys {
	AccountKeys::new(ADDRESS, VIEW_SECRET, None).unwrap()
}

/// A distinct, valid key image per seed.
pub fn key_image(seed: u8) -> KeyImage {
	hex::encode([seed; 32]).parse().unwrap()
}

pub fn credit(seed: u8, amount: &str) -> OwnedOutput {
	OwnedOutput {
		key_image: key_image(seed),
		amount: amount.parse().unwrap(),
	}
}

pub fn decoded(tx_hash: &str, outputs: Vec<OwnedOutput>, inputs: Vec<KeyImage>) -> DecodedTransaction {
	DecodedTransaction {
		tx_hash: tx_hash.to_string(),
		keeper_block: 1,
		outputs,
		input_key_images: inputs,
		view_only_amounts: Vec::<Amount>::new(),
		status: ConfirmationStatus::Unknown,
	}
}

/// Deterministic stand-in for the curve arithmetic.
///
/// Every derived value is a readable function of its inputs, so tests can build outputs that
/// match (or deliberately do not match) the test account.
pub struct FakeOracle;

impl FakeOracle {
	/// The key image the oracle derives for output `index` of a transaction whose public key
	/// is `tx_public_key`. Public keys are the (hex) transaction hashes in tests.
	pub fn key_image_for(tx_public_key: &str, index: usize) -> KeyImage {
		format!("{:0>64}", format!("{}{:04x}", tx_public_key, index))
			.parse()
			.unwrap()
	}
}

impl CryptoOracle for FakeOracle {
	fn keys_from_address(&self, address: &str) -> Option<AddressKeys> {
		if address == "bogus" {
			return None;
		}
		Some(AddressKeys {
			view_public_key: format!("view-pub:{}", address),
			spend_public_key: format!("spend-pub:{}", address),
		})
	}

	fn stealth_address(
		&self,
		tx_public_key: &str,
		view_secret_key: &str,
		spend_public_key: &str,
		index: usize,
	) -> Option<String> {
		Some(format!(
			"stealth:{}:{}:{}:{}",
			tx_public_key, view_secret_key, spend_public_key, index
		))
	}

	fn concealing_point(
		&self,
		view_secret_key: &str,
		tx_public_key: &str,
		view_public_key: &str,
		index: usize,
	) -> Option<String> {
		Some(format!(
			"point:{}:{}:{}:{}",
			view_secret_key, tx_public_key, view_public_key, index
		))
	}

	fn blinded_asset_id(
		&self,
		view_secret_key: &str,
		tx_public_key: &str,
		index: usize,
	) -> Option<String> {
		Some(format!("asset:{}:{}:{}", view_secret_key, tx_public_key, index))
	}

	fn decrypt_amount(
		&self,
		_view_secret_key: &str,
		_tx_public_key: &str,
		encrypted_amount: &str,
		_index: usize,
	) -> Option<i128> {
		encrypted_amount.parse().ok()
	}

	fn derive_key_image(
		&self,
		tx_public_key: &str,
		_view_secret_key: &str,
		_spend_public_key: &str,
		index: usize,
		_spend_secret_key: &str,
	) -> Option<String> {
		Some(Self::key_image_for(tx_public_key, index).to_string())
	}
}

/// Builder for raw `get_tx_details` responses.
pub struct RawTransaction {
	hash: String,
	height: u64,
	outputs: Vec<Value>,
	inputs: Vec<Value>,
}

impl RawTransaction {
	pub fn new(hash: &str, height: u64) -> Self {
		Self {
			hash: hash.to_string(),
			height,
			outputs: Vec::new(),
			inputs: Vec::new(),
		}
	}

	/// Append an output paying the test account `units` minimal units.
	pub fn owned_output(mut self, units: i128) -> Self {
		let oracle = FakeOracle;
		let index = self.outputs.len();
		let keys = oracle.keys_from_address(ADDRESS).unwrap();
		let tx_public_key = self.hash.as_str();
		self.outputs.push(json!({
			"tx_out_zarcanum": {
				"stealth_address": oracle
					.stealth_address(tx_public_key, VIEW_SECRET, &keys.spend_public_key, index),
				"concealing_point": oracle
					.concealing_point(VIEW_SECRET, tx_public_key, &keys.view_public_key, index),
				"amount_commitment": "commitment",
				"blinded_asset_id": oracle.blinded_asset_id(VIEW_SECRET, tx_public_key, index),
				"encrypted_amount": units.to_string(),
				"mix_attr": 0
			}
		}));
		self
	}

	/// Append an output paying someone else.
	pub fn foreign_output(mut self) -> Self {
		self.outputs.push(json!({
			"tx_out_zarcanum": {
				"stealth_address": "someone-else",
				"concealing_point": "someone-else",
				"amount_commitment": "commitment",
				"blinded_asset_id": "someone-else",
				"encrypted_amount": "999",
				"mix_attr": 0
			}
		}));
		self
	}

	/// Append an input spending `key_image`.
	pub fn input(mut self, key_image: KeyImage) -> Self {
		self.inputs.push(json!({
			"txin_zc_input": { "k_image": key_image.as_str() }
		}));
		self
	}

	pub fn build(self) -> TransactionDetailsResponse {
		let object = json!({
			"vin": self.inputs,
			"vout": self.outputs,
			"extra": [{ "pub_key": self.hash }]
		});
		TransactionDetailsResponse {
			status: Some(STATUS_OK.to_string()),
			tx_info: Some(TransactionInfo {
				amount: Some(0),
				blob: Some("00".to_string()),
				blob_size: Some(1),
				id: Some(self.hash.clone()),
				keeper_block: Some(self.height),
				object_in_json: Some(object.to_string()),
				pub_key: Some(self.hash),
				timestamp: Some(BLOCK_TIMESTAMP),
			}),
		}
	}
}

#[derive(Default)]
struct NodeState {
	height: u64,
	height_fails: bool,
	blocks: HashMap<u64, Vec<String>>,
	transactions: HashMap<String, TransactionDetailsResponse>,
	failing_transactions: HashSet<String>,
	block_requests: Vec<u64>,
}

/// In-memory chain node.
///
/// Block fetches can be held open with [`FakeNode::pause_blocks`] to simulate a slow node.
pub struct FakeNode {
	state: Mutex<NodeState>,
	paused: watch::Sender<bool>,
	block_fetches: watch::Sender<usize>,
}

impl FakeNode {
	pub fn new(height: u64) -> Self {
		Self {
			state: Mutex::new(NodeState {
				height,
				..NodeState::default()
			}),
			paused: watch::Sender::new(false),
			block_fetches: watch::Sender::new(0),
		}
	}

	pub fn set_height(&self, height: u64) {
		self.state.lock().height = height;
	}

	pub fn fail_height(&self, fail: bool) {
		self.state.lock().height_fails = fail;
	}

	pub fn add_block(&self, height: u64, transactions: Vec<TransactionDetailsResponse>) {
		let mut state = self.state.lock();
		let mut hashes = Vec::with_capacity(transactions.len());
		for transaction in transactions {
			let hash = transaction
				.tx_info
				.as_ref()
				.and_then(|info| info.id.clone())
				.unwrap();
			hashes.push(hash.clone());
			state.transactions.insert(hash, transaction);
		}
		state.blocks.insert(height, hashes);
	}

	pub fn fail_transaction(&self, hash: &str) {
		self.state.lock().failing_transactions.insert(hash.to_string());
	}

	/// Heights requested through `get_block_details`, in request order.
	pub fn block_requests(&self) -> Vec<u64> {
		self.state.lock().block_requests.clone()
	}

	pub fn pause_blocks(&self) {
		self.paused.send_replace(true);
	}

	pub fn resume_blocks(&self) {
		self.paused.send_replace(false);
	}

	/// Wait until at least `count` block fetches have started.
	pub async fn wait_for_block_fetches(&self, count: usize) {
		let mut fetches = self.block_fetches.subscribe();
		let _ = fetches.wait_for(|started| *started >= count).await;
	}
}

#[async_trait::async_trait]
impl ChainNode for FakeNode {
	async fn get_height(&self) -> Result<u64, NodeError> {
		let state = self.state.lock();
		if state.height_fails {
			return Err(NodeError::Unavailable("connection refused".to_string()));
		}
		Ok(state.height)
	}

	async fn get_block_details(&self, height: u64) -> Result<BlockDetails, NodeError> {
		self.state.lock().block_requests.push(height);
		self.block_fetches.send_modify(|started| *started += 1);

		let mut paused = self.paused.subscribe();
		let _ = paused.wait_for(|paused| !*paused).await;

		let state = self.state.lock();
		let hashes = state
			.blocks
			.get(&height)
			.ok_or_else(|| NodeError::NotFound(format!("block {}", height)))?;
		Ok(BlockDetails {
			height,
			timestamp: BLOCK_TIMESTAMP,
			transactions_details: hashes
				.iter()
				.map(|hash| TransactionSummary { id: hash.clone() })
				.collect(),
		})
	}

	async fn get_transaction_details(
		&self,
		tx_hash: &str,
	) -> Result<TransactionDetailsResponse, NodeError> {
		let state = self.state.lock();
		if state.failing_transactions.contains(tx_hash) {
			return Err(NodeError::Unavailable(format!("timeout fetching {}", tx_hash)));
		}
		state
			.transactions
			.get(tx_hash)
			.cloned()
			.ok_or_else(|| NodeError::NotFound(tx_hash.to_string()))
	}
}
