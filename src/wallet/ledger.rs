//! Key-image ledger.
//!
//! The ledger maps each unspent owned key image to the amount it carries and the height it
//! was observed at. Its running total is the wallet balance; every change to that total is
//! published on the ledger's `BalanceFeed`.

use super::balance::{BalanceFeed, BalanceStream};
use super::keys::KeyImage;
use super::types::DecodedTransaction;
use crate::utils::Amount;

use std::collections::HashMap;
use tracing::{debug, warn};

/// One unspent owned output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyImageRecord {
	pub amount: Amount,
	pub height: u64,
}

/// Error types for ledger mutations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
	#[error("Crediting {amount} for key image {key_image} would overflow the balance")]
	BalanceOverflow { key_image: KeyImage, amount: Amount },
}

/// Result of applying one transaction
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionEffect {
	/// Key images inserted or updated.
	pub credited: usize,
	/// Key images removed because the transaction spent them.
	pub retracted: usize,
}

impl TransactionEffect {
	pub fn is_empty(&self) -> bool {
		self.credited == 0 && self.retracted == 0
	}
}

pub struct KeyImageLedger {
	records: HashMap<KeyImage, KeyImageRecord>,
	total: Amount,
	balance: BalanceFeed,
}

impl Default for KeyImageLedger {
	fn default() -> Self {
		Self::new()
	}
}

impl KeyImageLedger {
	pub fn new() -> Self {
		Self {
			records: HashMap::new(),
			total: Amount::ZERO,
			balance: BalanceFeed::new(Amount::ZERO.to_string()),
		}
	}

	/// Insert or overwrite the record for `key_image`.
	///
	/// Re-inserting identical values leaves the ledger unchanged. Returns whether the stored
	/// record changed. The balance is not published here; see [`KeyImageLedger::apply`].
	pub fn upsert(
		&mut self,
		key_image: KeyImage,
		amount: Amount,
		height: u64,
	) -> Result<bool, LedgerError> {
		let record = KeyImageRecord { amount, height };
		let previous = self.records.get(&key_image).copied();
		if previous == Some(record) {
			return Ok(false);
		}

		let base = previous
			.map(|old| self.total.checked_sub(old.amount))
			.unwrap_or(Some(self.total));
		let total = base
			.and_then(|base| base.checked_add(amount))
			.ok_or_else(|| LedgerError::BalanceOverflow {
				key_image: key_image.clone(),
				amount,
			})?;

		self.records.insert(key_image, record);
		self.total = total;
		Ok(true)
	}

	/// Remove the record for `key_image`. Absent key images are ignored.
	pub fn retract(&mut self, key_image: &KeyImage) -> Option<KeyImageRecord> {
		let removed = self.records.remove(key_image)?;
		// The total is the exact sum of the records, so it always covers one of them.
		self.total = self.total.checked_sub(removed.amount).unwrap_or(Amount::ZERO);
		Some(removed)
	}

	pub fn contains(&self, key_image: &KeyImage) -> bool {
		self.records.contains_key(key_image)
	}

	pub fn get(&self, key_image: &KeyImage) -> Option<&KeyImageRecord> {
		self.records.get(key_image)
	}

	pub fn len(&self) -> usize {
		self.records.len()
	}

	pub fn is_empty(&self) -> bool {
		self.records.is_empty()
	}

	/// Detached copy of all records.
	pub fn snapshot(&self) -> HashMap<KeyImage, KeyImageRecord> {
		self.records.clone()
	}

	/// Exact sum of all unspent amounts.
	pub fn total(&self) -> Amount {
		self.total
	}

	/// Current balance as a decimal string.
	pub fn balance(&self) -> String {
		self.total.to_string()
	}

	/// Publish the current balance if it changed since the last publication.
	pub fn publish_balance(&self) -> bool {
		self.balance.publish(self.balance())
	}

	/// Subscribe to balance changes, starting with the current balance.
	pub fn balance_changes(&self) -> BalanceStream {
		self.balance.subscribe()
	}

	/// Handle on the balance feed that outlives borrows of the ledger.
	pub fn balance_feed(&self) -> BalanceFeed {
		self.balance.clone()
	}

	/// Apply one decoded transaction observed at `height`.
	///
	/// All owned outputs are credited before any input is retracted, so a key image that is
	/// both created and spent by the same transaction ends up absent. The balance is
	/// published once, after the whole transaction.
	pub fn apply(&mut self, transaction: &DecodedTransaction, height: u64) -> TransactionEffect {
		self.apply_with(transaction, height, false)
	}

	/// Re-apply a transaction that was already applied once.
	///
	/// Only outputs whose key image is still unspent in the ledger are credited; an output that
	/// has since been spent stays retracted. Inputs retract as in [`KeyImageLedger::apply`].
	pub fn reconcile(&mut self, transaction: &DecodedTransaction, height: u64) -> TransactionEffect {
		self.apply_with(transaction, height, true)
	}

	fn apply_with(
		&mut self,
		transaction: &DecodedTransaction,
		height: u64,
		known_only: bool,
	) -> TransactionEffect {
		let mut effect = TransactionEffect::default();

		for output in &transaction.outputs {
			if known_only && !self.contains(&output.key_image) {
				debug!(
					"Key image {} of {} is no longer unspent, not crediting it again",
					output.key_image, transaction.tx_hash
				);
				continue;
			}
			match self.upsert(output.key_image.clone(), output.amount, height) {
				Ok(true) => effect.credited += 1,
				Ok(false) => {}
				Err(e) => warn!("Skipping output of transaction {}: {}", transaction.tx_hash, e),
			}
		}

		for key_image in &transaction.input_key_images {
			if let Some(record) = self.retract(key_image) {
				debug!(
					"Key image {} spent by {} (credited {} at height {})",
					key_image, transaction.tx_hash, record.amount, record.height
				);
				effect.retracted += 1;
			}
		}

		self.publish_balance();
		effect
	}
}
