use crate::node::NodeError;
use crate::utils::Amount;
use crate::wallet::keys::KeyImage;

use chrono::{DateTime, Utc};

/// Confirmation state of a transaction relative to the current chain height
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmationStatus {
	/// At least `threshold` blocks were mined on top of the transaction's block
	Finished,
	/// Not yet final, or heights are inconsistent
	Unknown,
}

impl ConfirmationStatus {
	/// Derive the status from the current height, the height the transaction was observed
	/// at and the confirmation threshold.
	pub fn from_heights(current_height: u64, observed_height: u64, threshold: u64) -> Self {
		match current_height.checked_sub(observed_height) {
			Some(depth) if depth >= threshold => ConfirmationStatus::Finished,
			_ => ConfirmationStatus::Unknown,
		}
	}
}

/// An output recognised as belonging to the account, with its key image
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedOutput {
	pub key_image: KeyImage,
	pub amount: Amount,
}

/// A transaction reduced to what the ledger needs
#[derive(Debug, Clone)]
pub struct DecodedTransaction {
	pub tx_hash: String,
	/// Height of the block that included the transaction, as reported by the node.
	pub keeper_block: u64,
	/// Owned outputs that can enter the ledger.
	pub outputs: Vec<OwnedOutput>,
	/// Key images referenced by the transaction inputs. Retraction candidates.
	pub input_key_images: Vec<KeyImage>,
	/// Amounts of owned outputs whose key image could not be derived (no spend key).
	pub view_only_amounts: Vec<Amount>,
	pub status: ConfirmationStatus,
}

/// A block with its decoded transactions in node order
#[derive(Debug, Clone)]
pub struct Block {
	pub height: u64,
	pub timestamp: Option<DateTime<Utc>>,
	pub transactions: Vec<DecodedTransaction>,
}

/// Error types surfaced by the synchronizer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SyncError {
	#[error("Node unavailable: {0}")]
	NodeUnavailable(String),

	#[error("Malformed node response: {0}")]
	MalformedResponse(String),

	#[error("Sync engine is already running")]
	AlreadyRunning,

	#[error("Sync engine is not running")]
	NotRunning,

	#[error("Invalid account: {0}")]
	InvalidAccount(String),

	#[error("Configuration error: {0}")]
	ConfigError(String),

	#[error("No Tokio runtime available to run the sync engine")]
	NoRuntime,

	#[error("Sync engine worker terminated: {0}")]
	EngineGone(String),
}

impl From<NodeError> for SyncError {
	fn from(error: NodeError) -> Self {
		match error {
			NodeError::MalformedResponse(_)
			| NodeError::JsonError(_)
			| NodeError::NotFound(_)
			| NodeError::Rpc { .. } => SyncError::MalformedResponse(error.to_string()),
			NodeError::InvalidConfig(_) => SyncError::ConfigError(error.to_string()),
			NodeError::Unavailable(_) | NodeError::Busy | NodeError::HttpError(_) => {
				SyncError::NodeUnavailable(error.to_string())
			}
		}
	}
}
