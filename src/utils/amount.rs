//! Exact fixed-point amounts.
//!
//! Node amounts are integers in minimal units; the display unit is 10^12 minimal units.
//! Every conversion and sum here is exact: amounts are kept as `u128` minimal units and
//! only turned into decimal strings at the edges.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Number of decimal places between minimal units and display units.
pub const DISPLAY_DECIMALS: u32 = 12;

const UNITS_PER_COIN: u128 = 10u128.pow(DISPLAY_DECIMALS);

/// Error types for amount parsing and conversion
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AmountError {
	#[error("Amount cannot be negative: {0}")]
	Negative(String),

	#[error("Invalid decimal amount: {0:?}")]
	Invalid(String),

	#[error("Amount {0} has more than 12 fractional digits")]
	TooPrecise(String),

	#[error("Amount {0} does not fit in 128 bits of minimal units")]
	Overflow(String),
}

/// A non-negative amount with 12 decimal places, stored as minimal units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u128);

impl Amount {
	pub const ZERO: Amount = Amount(0);

	/// Wrap a count of minimal units.
	pub const fn from_atomic(units: u128) -> Self {
		Self(units)
	}

	/// Convert a signed minimal-unit value, rejecting negatives.
	pub fn from_signed_atomic(units: i128) -> Result<Self, AmountError> {
		u128::try_from(units)
			.map(Self)
			.map_err(|_| AmountError::Negative(units.to_string()))
	}

	/// The amount in minimal units.
	pub const fn atomic(self) -> u128 {
		self.0
	}

	pub fn is_zero(self) -> bool {
		self.0 == 0
	}

	pub fn checked_add(self, other: Amount) -> Option<Amount> {
		self.0.checked_add(other.0).map(Amount)
	}

	pub fn checked_sub(self, other: Amount) -> Option<Amount> {
		self.0.checked_sub(other.0).map(Amount)
	}

	/// Sum amounts exactly, returning `None` on overflow.
	pub fn checked_sum<I: IntoIterator<Item = Amount>>(amounts: I) -> Option<Amount> {
		amounts
			.into_iter()
			.try_fold(Amount::ZERO, |acc, amount| acc.checked_add(amount))
	}
}

impl fmt::Display for Amount {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let whole = self.0 / UNITS_PER_COIN;
		let fraction = self.0 % UNITS_PER_COIN;
		if fraction == 0 {
			return write!(f, "{}", whole);
		}

		let digits = format!("{:0width$}", fraction, width = DISPLAY_DECIMALS as usize);
		write!(f, "{}.{}", whole, digits.trim_end_matches('0'))
	}
}

impl FromStr for Amount {
	type Err = AmountError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let (negative, unsigned) = match s.strip_prefix('-') {
			Some(rest) => (true, rest),
			None => (false, s),
		};

		let (whole, fraction) = match unsigned.split_once('.') {
			Some((whole, fraction)) => (whole, fraction),
			None => (unsigned, ""),
		};

		let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
		if whole.is_empty()
			|| !all_digits(whole)
			|| !all_digits(fraction)
			|| (unsigned.contains('.') && fraction.is_empty())
		{
			return Err(AmountError::Invalid(s.to_string()));
		}

		if fraction.len() > DISPLAY_DECIMALS as usize {
			return Err(AmountError::TooPrecise(s.to_string()));
		}

		let overflow = || AmountError::Overflow(s.to_string());
		let whole_units = whole
			.parse::<u128>()
			.map_err(|_| overflow())?
			.checked_mul(UNITS_PER_COIN)
			.ok_or_else(overflow)?;

		let fraction_units = if fraction.is_empty() {
			0
		} else {
			let padded = format!("{:0<width$}", fraction, width = DISPLAY_DECIMALS as usize);
			padded.parse::<u128>().map_err(|_| AmountError::Invalid(s.to_string()))?
		};

		let units = whole_units.checked_add(fraction_units).ok_or_else(overflow)?;
		if negative && units != 0 {
			return Err(AmountError::Negative(s.to_string()));
		}

		Ok(Amount(units))
	}
}

impl Serialize for Amount {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		serializer.collect_str(self)
	}
}

impl<'de> Deserialize<'de> for Amount {
	fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
		let raw = String::deserialize(deserializer)?;
		raw.parse().map_err(serde::de::Error::custom)
	}
}

/// Convert a minimal-unit value into a display-unit decimal string.
///
/// Zero is rendered as the literal `"0"`; negative values are rejected.
pub fn satoshi_to_display(units: i128) -> Result<String, AmountError> {
	if units == 0 {
		return Ok("0".to_string());
	}
	Amount::from_signed_atomic(units).map(|amount| amount.to_string())
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn satoshi_to_display_shifts_twelve_places() {
		assert_eq!(satoshi_to_display(0).unwrap(), "0");
		assert_eq!(satoshi_to_display(1_000_000_000_000).unwrap(), "1");
		assert_eq!(satoshi_to_display(1).unwrap(), "0.000000000001");
		assert_eq!(satoshi_to_display(1_500_000_000_000).unwrap(), "1.5");
		assert_eq!(
			satoshi_to_display(123_456_789_000_000_000).unwrap(),
			"123456.789"
		);
	}

	#[test]
	fn satoshi_to_display_rejects_negative() {
		assert!(matches!(
			satoshi_to_display(-1),
			Err(AmountError::Negative(_))
		));
	}

	#[test]
	fn parses_and_prints_exact_decimals() {
		let amount: Amount = "12.000000000034".parse().unwrap();
		assert_eq!(amount.atomic(), 12_000_000_000_034);
		assert_eq!(amount.to_string(), "12.000000000034");

		assert_eq!("0".parse::<Amount>().unwrap(), Amount::ZERO);
		assert_eq!("0.10".parse::<Amount>().unwrap().to_string(), "0.1");
		assert_eq!("-0".parse::<Amount>().unwrap(), Amount::ZERO);
	}

	#[test]
	fn rejects_malformed_decimals() {
		for input in ["", ".5", "1.", "1e3", "+1", "1.2.3", " 1"] {
			assert!(
				matches!(input.parse::<Amount>(), Err(AmountError::Invalid(_))),
				"{input:?} should be invalid"
			);
		}
		assert!(matches!(
			"0.0000000000001".parse::<Amount>(),
			Err(AmountError::TooPrecise(_))
		));
		assert!(matches!(
			"-2.5".parse::<Amount>(),
			Err(AmountError::Negative(_))
		));
		assert!(matches!(
			"999999999999999999999999999999".parse::<Amount>(),
			Err(AmountError::Overflow(_))
		));
	}

	#[test]
	fn serde_uses_decimal_strings() {
		let amount: Amount = "7.25".parse().unwrap();
		let json = serde_json::to_string(&amount).unwrap();
		assert_eq!(json, "\"7.25\"");
		let back: Amount = serde_json::from_str(&json).unwrap();
		assert_eq!(back, amount);
	}

	#[test]
	fn checked_sum_is_exact() {
		let parts = ["0.1", "0.2", "0.000000000001"]
			.iter()
			.map(|s| s.parse::<Amount>().unwrap());
		let total = Amount::checked_sum(parts).unwrap();
		assert_eq!(total.to_string(), "0.300000000001");

		let max = Amount::from_atomic(u128::MAX);
		assert_eq!(Amount::checked_sum([max, Amount::from_atomic(1)]), None);
	}
}
