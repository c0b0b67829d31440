//!
//! Utility module for the key-image synchronizer.
//!
//! Re-exports exact amount arithmetic and timestamp helpers for use throughout the codebase.
/// Fixed-point amounts and minimal-unit conversion
pub mod amount;
/// Block timestamp conversion
pub mod time;

pub use amount::{Amount, AmountError, DISPLAY_DECIMALS, satoshi_to_display};
pub use time::timestamp_to_datetime;
