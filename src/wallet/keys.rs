//! Account key material and key images.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const KEY_BYTES: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
	#[error("{what} must be {expected} bytes of hex, got {actual:?}")]
	InvalidHex {
		what: &'static str,
		expected: usize,
		actual: String,
	},

	#[error("Account address is empty")]
	EmptyAddress,
}

fn normalize_key(what: &'static str, raw: &str) -> Result<String, KeyError> {
	let invalid = || KeyError::InvalidHex {
		what,
		expected: KEY_BYTES,
		actual: raw.to_string(),
	};
	let bytes = hex::decode(raw).map_err(|_| invalid())?;
	if bytes.len() != KEY_BYTES {
		return Err(invalid());
	}
	Ok(hex::encode(bytes))
}

/// Deterministic identifier of an owned output, revealed when the output is spent.
///
/// Always 32 bytes, stored as lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyImage(String);

impl KeyImage {
	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl FromStr for KeyImage {
	type Err = KeyError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		normalize_key("key image", s).map(KeyImage)
	}
}

impl TryFrom<String> for KeyImage {
	type Error = KeyError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}

impl From<KeyImage> for String {
	fn from(value: KeyImage) -> Self {
		value.0
	}
}

impl fmt::Display for KeyImage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

/// Account context: public address plus private view and (optional) spend keys.
///
/// Without a spend key owned outputs are still recognised, but their key images cannot
/// be derived, so they never enter the ledger.
#[derive(Clone)]
pub struct AccountKeys {
	address: String,
	view_secret_key: String,
	spend_secret_key: Option<String>,
}

impl AccountKeys {
	pub fn new(
		address: impl Into<String>,
		view_secret_key: &str,
		spend_secret_key: Option<&str>,
	) -> Result<Self, KeyError> {
		let address = address.into();
		if address.trim().is_empty() {
			return Err(KeyError::EmptyAddress);
		}

		Ok(Self {
			address,
			view_secret_key: normalize_key("view secret key", view_secret_key)?,
			spend_secret_key: spend_secret_key
				.map(|key| normalize_key("spend secret key", key))
				.transpose()?,
		})
	}

	pub fn address(&self) -> &str {
		&self.address
	}

	pub fn view_secret_key(&self) -> &str {
		&self.view_secret_key
	}

	pub fn spend_secret_key(&self) -> Option<&str> {
		self.spend_secret_key.as_deref()
	}

	pub fn can_spend(&self) -> bool {
		self.spend_secret_key.is_some()
	}
}

impl fmt::Debug for AccountKeys {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("AccountKeys")
			.field("address", &self.address)
			.field("view_secret_key", &"<redacted>")
			.field(
				"spend_secret_key",
				&self.spend_secret_key.as_ref().map(|_| "<redacted>"),
			)
			.finish()
	}
}
