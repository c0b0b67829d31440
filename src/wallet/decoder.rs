//! Transaction decoder.
//!
//! Turns one raw transaction from the node into the owned outputs and spent key images the
//! ledger needs. Ownership checks, amount decryption and key-image derivation are delegated
//! to a [`CryptoOracle`]; this module only validates the node data and wires the oracle's
//! answers together.

use super::keys::{AccountKeys, KeyImage};
use super::oracle::{AddressKeys, CryptoOracle};
use super::types::{ConfirmationStatus, DecodedTransaction, OwnedOutput, SyncError};
use crate::node::{STATUS_OK, TransactionDetailsResponse, TransactionObject, ZarcanumOutput};
use crate::utils::Amount;

use std::sync::Arc;
use tracing::{debug, warn};

/// Reasons a transaction is excluded from the ledger
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeRejected {
	#[error("status is {0}")]
	StatusNotOk(String),

	#[error("no transaction info")]
	MissingTransaction,

	#[error("missing field {0}")]
	MissingField(&'static str),

	#[error("transaction object is not valid JSON: {0}")]
	InvalidObject(String),

	#[error("transaction has no outputs")]
	NoOutputs,

	#[error("transaction has no inputs")]
	NoInputs,

	#[error("transaction public key not found in extra")]
	MissingPublicKey,
}

fn required_text<'a>(
	value: Option<&'a String>,
	field: &'static str,
) -> Result<&'a str, DecodeRejected> {
	value
		.map(String::as_str)
		.filter(|text| !text.is_empty())
		.ok_or(DecodeRejected::MissingField(field))
}

fn required_positive(value: Option<u64>, field: &'static str) -> Result<u64, DecodeRejected> {
	value
		.filter(|number| *number > 0)
		.ok_or(DecodeRejected::MissingField(field))
}

/// Recognises outputs that belong to one account
pub struct TransactionDecoder {
	account: AccountKeys,
	address_keys: AddressKeys,
	oracle: Arc<dyn CryptoOracle>,
	confirmation_threshold: u64,
}

impl TransactionDecoder {
	pub fn new(
		account: AccountKeys,
		oracle: Arc<dyn CryptoOracle>,
		confirmation_threshold: u64,
	) -> Result<Self, SyncError> {
		let address_keys = oracle.keys_from_address(account.address()).ok_or_else(|| {
			SyncError::InvalidAccount(format!(
				"cannot extract public keys from address {}",
				account.address()
			))
		})?;

		if !account.can_spend() {
			warn!("No spend key configured: owned outputs will not enter the ledger");
		}

		Ok(Self {
			account,
			address_keys,
			oracle,
			confirmation_threshold,
		})
	}

	/// Decode one raw transaction.
	///
	/// `chain_height` is the current tip, used only for the confirmation status.
	pub fn decode(
		&self,
		response: &TransactionDetailsResponse,
		chain_height: u64,
	) -> Result<DecodedTransaction, DecodeRejected> {
		match response.status.as_deref() {
			Some(STATUS_OK) => {}
			other => {
				return Err(DecodeRejected::StatusNotOk(
					other.unwrap_or("missing").to_string(),
				));
			}
		}

		let info = response
			.tx_info
			.as_ref()
			.ok_or(DecodeRejected::MissingTransaction)?;
		let tx_hash = required_text(info.id.as_ref(), "id")?;
		required_text(info.blob.as_ref(), "blob")?;
		required_text(info.pub_key.as_ref(), "pub_key")?;
		let object_json = required_text(info.object_in_json.as_ref(), "object_in_json")?;
		let keeper_block = required_positive(info.keeper_block, "keeper_block")?;
		required_positive(info.timestamp, "timestamp")?;
		info.amount.ok_or(DecodeRejected::MissingField("amount"))?;
		info.blob_size
			.ok_or(DecodeRejected::MissingField("blob_size"))?;

		let object: TransactionObject = serde_json::from_str(object_json)
			.map_err(|e| DecodeRejected::InvalidObject(e.to_string()))?;
		if object.vout.is_empty() {
			return Err(DecodeRejected::NoOutputs);
		}
		if object.vin.is_empty() {
			return Err(DecodeRejected::NoInputs);
		}
		let tx_public_key = object
			.public_key()
			.ok_or(DecodeRejected::MissingPublicKey)?;

		let input_key_images = object
			.vin
			.iter()
			.filter_map(|input| input.txin_zc_input.as_ref()?.k_image.as_deref())
			.filter_map(|raw| match raw.parse::<KeyImage>() {
				Ok(key_image) => Some(key_image),
				Err(e) => {
					debug!("Ignoring input of {}: {}", tx_hash, e);
					None
				}
			})
			.collect();

		let mut outputs = Vec::new();
		let mut view_only_amounts = Vec::new();
		for (index, output) in object.vout.iter().enumerate() {
			let Some(zarcanum) = output.tx_out_zarcanum.as_ref() else {
				continue;
			};
			let Some(encrypted_amount) = self.owned_encrypted_amount(tx_public_key, index, zarcanum)
			else {
				continue;
			};

			let amount = match self.decrypt_amount(tx_public_key, &encrypted_amount, index) {
				Some(amount) => amount,
				None => {
					warn!("Output {} of {} is ours but its amount is malformed", index, tx_hash);
					continue;
				}
			};

			match self.derive_key_image(tx_public_key, index) {
				Some(key_image) => outputs.push(OwnedOutput { key_image, amount }),
				None => view_only_amounts.push(amount),
			}
		}

		if !outputs.is_empty() || !view_only_amounts.is_empty() {
			debug!(
				"Transaction {} at height {}: {} owned outputs, {} view-only",
				tx_hash,
				keeper_block,
				outputs.len(),
				view_only_amounts.len()
			);
		}

		Ok(DecodedTransaction {
			tx_hash: tx_hash.to_string(),
			keeper_block,
			outputs,
			input_key_images,
			view_only_amounts,
			status: ConfirmationStatus::from_heights(
				chain_height,
				keeper_block,
				self.confirmation_threshold,
			),
		})
	}

	/// If the output pays this account, return its encrypted amount.
	///
	/// Outputs missing any of the confidential fields are never ours.
	fn owned_encrypted_amount(
		&self,
		tx_public_key: &str,
		index: usize,
		output: &ZarcanumOutput,
	) -> Option<String> {
		let stealth_address = output.stealth_address.as_deref()?;
		let concealing_point = output.concealing_point.as_deref()?;
		let blinded_asset_id = output.blinded_asset_id.as_deref()?;
		output.amount_commitment.as_deref()?;
		let encrypted_amount = output.encrypted_amount_text()?;

		let view_secret_key = self.account.view_secret_key();
		let expected_stealth = self.oracle.stealth_address(
			tx_public_key,
			view_secret_key,
			&self.address_keys.spend_public_key,
			index,
		)?;
		if !expected_stealth.eq_ignore_ascii_case(stealth_address) {
			return None;
		}

		let expected_point = self.oracle.concealing_point(
			view_secret_key,
			tx_public_key,
			&self.address_keys.view_public_key,
			index,
		)?;
		let expected_asset = self
			.oracle
			.blinded_asset_id(view_secret_key, tx_public_key, index)?;

		(expected_point.eq_ignore_ascii_case(concealing_point)
			&& expected_asset.eq_ignore_ascii_case(blinded_asset_id))
		.then_some(encrypted_amount)
	}

	fn decrypt_amount(&self, tx_public_key: &str, encrypted_amount: &str, index: usize) -> Option<Amount> {
		let units = self.oracle.decrypt_amount(
			self.account.view_secret_key(),
			tx_public_key,
			encrypted_amount,
			index,
		)?;
		Amount::from_signed_atomic(units).ok()
	}

	fn derive_key_image(&self, tx_public_key: &str, index: usize) -> Option<KeyImage> {
		let spend_secret_key = self.account.spend_secret_key()?;
		let raw = self.oracle.derive_key_image(
			tx_public_key,
			self.account.view_secret_key(),
			&self.address_keys.spend_public_key,
			index,
			spend_secret_key,
		)?;

		match raw.parse() {
			Ok(key_image) => Some(key_image),
			Err(e) => {
				warn!("Oracle returned an unusable key image for output {}: {}", index, e);
				None
			}
		}
	}
}
