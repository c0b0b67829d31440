//! Contract of the cryptographic oracle.
//!
//! The elliptic-curve work that decides output ownership lives outside this crate. The decoder
//! only relies on the pure functions below; every value is exchanged as lowercase hex text,
//! exactly as it appears in the node's transaction JSON.

/// Public keys encoded in an account address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddressKeys {
	pub view_public_key: String,
	pub spend_public_key: String,
}

/// Pure cryptographic functions used to recognise owned outputs.
///
/// Implementations must be deterministic and free of hidden state; `None` means the
/// inputs were not valid curve points or scalars.
pub trait CryptoOracle: Send + Sync {
	/// Extract the view and spend public keys from an address.
	fn keys_from_address(&self, address: &str) -> Option<AddressKeys>;

	/// Stealth address an output at `index` would carry if it paid this account.
	fn stealth_address(
		&self,
		tx_public_key: &str,
		view_secret_key: &str,
		spend_public_key: &str,
		index: usize,
	) -> Option<String>;

	/// Concealing point an output at `index` would carry if it paid this account.
	fn concealing_point(
		&self,
		view_secret_key: &str,
		tx_public_key: &str,
		view_public_key: &str,
		index: usize,
	) -> Option<String>;

	/// Blinded native asset id an output at `index` would carry if it paid this account.
	fn blinded_asset_id(
		&self,
		view_secret_key: &str,
		tx_public_key: &str,
		index: usize,
	) -> Option<String>;

	/// Decrypt the committed amount of an owned output, in minimal units.
	fn decrypt_amount(
		&self,
		view_secret_key: &str,
		tx_public_key: &str,
		encrypted_amount: &str,
		index: usize,
	) -> Option<i128>;

	/// Derive the key image of an owned output. Requires the spend secret key.
	fn derive_key_image(
		&self,
		tx_public_key: &str,
		view_secret_key: &str,
		spend_public_key: &str,
		index: usize,
		spend_secret_key: &str,
	) -> Option<String>;
}
