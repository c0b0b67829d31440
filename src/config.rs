//! Runtime configuration for the node transport and the sync engine.

use crate::wallet::SyncError;
use std::time::Duration;

/// Default per-request timeout applied by the transport.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Default budget for retrying transient node failures.
pub const DEFAULT_RETRY_MAX_ELAPSED: Duration = Duration::from_secs(30);
/// Default number of blocks after which a transaction counts as final.
pub const DEFAULT_CONFIRMATION_THRESHOLD: u64 = 6;

/// Connection options for the chain node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
	/// Base URL of the node, e.g. `http://127.0.0.1:11211`.
	pub url: String,
	/// Timeout for each HTTP request.
	pub request_timeout: Duration,
	/// Total time spent retrying a transient failure before giving up.
	pub retry_max_elapsed: Duration,
	/// Extra headers sent with every request.
	pub headers: Vec<(String, String)>,
	/// Query parameters appended to every request URL.
	pub query: Vec<(String, String)>,
}

impl NodeConfig {
	pub fn new(url: impl Into<String>) -> Self {
		Self {
			url: url.into(),
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			retry_max_elapsed: DEFAULT_RETRY_MAX_ELAPSED,
			headers: Vec::new(),
			query: Vec::new(),
		}
	}
}

/// Configuration for the sync engine
#[derive(Debug, Clone)]
pub struct SyncConfig {
	/// Interval between scan passes
	pub polling_interval: Duration,
	/// Blocks required before a transaction is reported as finished
	pub confirmation_threshold: u64,
	/// Height the scan cursor starts from
	pub start_height: u64,
}

impl Default for SyncConfig {
	fn default() -> Self {
		Self {
			polling_interval: Duration::from_secs(5),
			confirmation_threshold: DEFAULT_CONFIRMATION_THRESHOLD,
			start_height: 0,
		}
	}
}

impl SyncConfig {
	pub fn validate(&self) -> Result<(), SyncError> {
		if self.polling_interval.is_zero() {
			return Err(SyncError::ConfigError(
				"polling interval must be greater than zero".to_string(),
			));
		}
		Ok(())
	}
}

/// Full configuration of one synchronizer instance.
#[derive(Debug, Clone)]
pub struct WalletSyncConfig {
	pub node: NodeConfig,
	pub sync: SyncConfig,
}

impl WalletSyncConfig {
	/// Read the configuration from `KIS_*` environment variables.
	///
	/// `KIS_NODE_URL` is required; `KIS_POLL_INTERVAL_SECS`, `KIS_CONFIRMATIONS`,
	/// `KIS_START_HEIGHT` and `KIS_REQUEST_TIMEOUT_SECS` fall back to defaults.
	pub fn from_env() -> Result<Self, SyncError> {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Build the configuration from an arbitrary key lookup.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let url = lookup("KIS_NODE_URL")
			.filter(|url| !url.trim().is_empty())
			.ok_or_else(|| SyncError::ConfigError("KIS_NODE_URL is not set".to_string()))?;

		let parse_u64 = |key: &str| -> Result<Option<u64>, SyncError> {
			lookup(key)
				.map(|raw| {
					raw.trim().parse::<u64>().map_err(|e| {
						SyncError::ConfigError(format!("{} must be an integer: {}", key, e))
					})
				})
				.transpose()
		};

		let mut node = NodeConfig::new(url);
		if let Some(secs) = parse_u64("KIS_REQUEST_TIMEOUT_SECS")? {
			node.request_timeout = Duration::from_secs(secs);
		}

		let mut sync = SyncConfig::default();
		if let Some(secs) = parse_u64("KIS_POLL_INTERVAL_SECS")? {
			sync.polling_interval = Duration::from_secs(secs);
		}
		if let Some(confirmations) = parse_u64("KIS_CONFIRMATIONS")? {
			sync.confirmation_threshold = confirmations;
		}
		if let Some(height) = parse_u64("KIS_START_HEIGHT")? {
			sync.start_height = height;
		}
		sync.validate()?;

		Ok(Self { node, sync })
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::collections::HashMap;

	fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
		let map: HashMap<String, String> = pairs
			.iter()
			.map(|(k, v)| (k.to_string(), v.to_string()))
			.collect();
		move |key| map.get(key).cloned()
	}

	#[test]
	fn reads_values_and_defaults() {
		let config = WalletSyncConfig::from_lookup(lookup_from(&[
			("KIS_NODE_URL", "http://localhost:11211"),
			("KIS_START_HEIGHT", "2968722"),
			("KIS_POLL_INTERVAL_SECS", "30"),
		]))
		.unwrap();

		assert_eq!(config.node.url, "http://localhost:11211");
		assert_eq!(config.node.request_timeout, DEFAULT_REQUEST_TIMEOUT);
		assert_eq!(config.sync.start_height, 2_968_722);
		assert_eq!(config.sync.polling_interval, Duration::from_secs(30));
		assert_eq!(config.sync.confirmation_threshold, 6);
	}

	#[test]
	fn rejects_missing_url_and_bad_numbers() {
		assert!(matches!(
			WalletSyncConfig::from_lookup(lookup_from(&[])),
			Err(SyncError::ConfigError(_))
		));
		assert!(matches!(
			WalletSyncConfig::from_lookup(lookup_from(&[
				("KIS_NODE_URL", "http://n"),
				("KIS_CONFIRMATIONS", "six"),
			])),
			Err(SyncError::ConfigError(_))
		));
		assert!(matches!(
			WalletSyncConfig::from_lookup(lookup_from(&[
				("KIS_NODE_URL", "http://n"),
				("KIS_POLL_INTERVAL_SECS", "0"),
			])),
			Err(SyncError::ConfigError(_))
		));
	}
}
