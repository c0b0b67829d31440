//!
//! JSON-RPC client for the chain node.
//!
//! This module defines the `ChainNode` collaborator consumed by the chain reader and its
//! HTTP implementation. The client knows only the three request/response shapes the
//! synchronizer needs: chain height, block details by height and transaction details by hash.
//! Transient failures (node busy, connection errors) are retried with exponential backoff;
//! everything else is returned to the caller unchanged.

use super::types::*;
use crate::config::NodeConfig;

use backoff::{ExponentialBackoff, future::retry};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::json;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

const GET_HEIGHT_PATH: &str = "getheight";
const JSON_RPC_PATH: &str = "json_rpc";
const GET_BLOCKS_DETAILS: &str = "get_blocks_details";
const GET_TX_DETAILS: &str = "get_tx_details";

/// The chain-node operations the synchronizer depends on.
///
/// Implementations are transport-agnostic from the engine's point of view; they only need
/// to report failures as `NodeError` values.
#[async_trait::async_trait]
pub trait ChainNode: Send + Sync {
	/// Current height of the chain tip.
	async fn get_height(&self) -> Result<u64, NodeError>;

	/// Header details of the block at `height`, including its transaction hashes.
	async fn get_block_details(&self, height: u64) -> Result<BlockDetails, NodeError>;

	/// Full details of a single transaction.
	async fn get_transaction_details(
		&self,
		tx_hash: &str,
	) -> Result<TransactionDetailsResponse, NodeError>;
}

/// Chain-node client speaking the daemon's HTTP and JSON-RPC endpoints
#[derive(Clone)]
pub struct DaemonRpcClient {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the daemon, without trailing slash.
	base_url: String,
	/// Query parameters appended to every request.
	query: Vec<(String, String)>,
	/// Retry budget for transient failures.
	retry_max_elapsed: Duration,
	/// Monotonic JSON-RPC request id.
	next_id: Arc<AtomicU64>,
}

impl DaemonRpcClient {
	/// Create a new node client.
	///
	/// # Arguments
	/// * `config` - Node URL, timeouts, headers and query parameters.
	///
	/// # Returns
	/// A new `DaemonRpcClient`, or `NodeError::InvalidConfig` if a header is not valid HTTP.
	pub fn new(config: &NodeConfig) -> Result<Self, NodeError> {
		let mut headers = HeaderMap::new();
		headers.insert(
			reqwest::header::ACCEPT,
			HeaderValue::from_static("application/json"),
		);
		for (name, value) in &config.headers {
			let name = HeaderName::from_bytes(name.as_bytes())
				.map_err(|e| NodeError::InvalidConfig(format!("header name {}: {}", name, e)))?;
			let value = HeaderValue::from_str(value)
				.map_err(|e| NodeError::InvalidConfig(format!("header value for {}: {}", name, e)))?;
			headers.insert(name, value);
		}

		let http_client = Client::builder()
			.timeout(config.request_timeout)
			.default_headers(headers)
			.build()?;

		Ok(Self {
			http_client,
			base_url: config.url.trim_end_matches('/').to_string(),
			query: config.query.clone(),
			retry_max_elapsed: config.retry_max_elapsed,
			next_id: Arc::new(AtomicU64::new(1)),
		})
	}

	fn endpoint(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path)
	}

	fn next_request_id(&self) -> u64 {
		self.next_id.fetch_add(1, Ordering::Relaxed)
	}

	/// Run `operation`, retrying transient failures with exponential backoff.
	async fn with_retry<T, F, Fut>(&self, what: &str, mut operation: F) -> Result<T, NodeError>
	where
		F: FnMut() -> Fut,
		Fut: Future<Output = Result<T, NodeError>>,
	{
		let policy = ExponentialBackoff {
			max_elapsed_time: Some(self.retry_max_elapsed),
			..ExponentialBackoff::default()
		};

		retry(policy, || {
			let attempt = operation();
			async move {
				attempt.await.map_err(|e| {
					if e.is_transient() {
						warn!("Transient node error during {}: {}", what, e);
						backoff::Error::transient(e)
					} else {
						backoff::Error::permanent(e)
					}
				})
			}
		})
		.await
	}

	/// POST a JSON body to `path` and decode the JSON response.
	async fn post<B, T>(&self, path: &str, body: &B) -> Result<T, NodeError>
	where
		B: Serialize + ?Sized,
		T: DeserializeOwned,
	{
		let response = self
			.http_client
			.post(self.endpoint(path))
			.query(&self.query)
			.json(body)
			.send()
			.await?;

		let status = response.status();
		if status == StatusCode::SERVICE_UNAVAILABLE || status == StatusCode::TOO_MANY_REQUESTS {
			return Err(NodeError::Busy);
		}
		if !status.is_success() {
			return Err(NodeError::Unavailable(format!("HTTP error: {}", status)));
		}

		response
			.json::<T>()
			.await
			.map_err(|e| NodeError::MalformedResponse(format!("{} response: {}", path, e)))
	}

	/// Execute a JSON-RPC method.
	async fn rpc<P, T>(&self, method: &str, params: &P) -> Result<T, NodeError>
	where
		P: Serialize,
		T: DeserializeOwned,
	{
		let request = JsonRpcRequest::new(self.next_request_id(), method, params);
		debug!("Calling {} (id {})", method, request.id);
		let response: JsonRpcResponse<T> = self.post(JSON_RPC_PATH, &request).await?;
		response.into_result(method)
	}

	async fn fetch_height(&self) -> Result<u64, NodeError> {
		let response: HeightResponse = self.post(GET_HEIGHT_PATH, &json!({})).await?;
		NodeError::from_status(response.status.as_deref(), "chain height")?;
		match response.height {
			Some(height) if height > 0 => Ok(height),
			_ => Err(NodeError::MalformedResponse("height not found".to_string())),
		}
	}

	async fn fetch_block(&self, height: u64) -> Result<BlockDetails, NodeError> {
		let params = BlocksDetailsParams {
			count: 1,
			height_start: height,
			ignore_transactions: false,
		};
		let response: BlocksDetailsResponse = self.rpc(GET_BLOCKS_DETAILS, &params).await?;
		let subject = format!("block {}", height);
		NodeError::from_status(response.status.as_deref(), &subject)?;

		response
			.blocks
			.into_iter()
			.next()
			.ok_or(NodeError::NotFound(subject))
	}

	async fn fetch_transaction(
		&self,
		tx_hash: &str,
	) -> Result<TransactionDetailsResponse, NodeError> {
		let params = TransactionDetailsParams { tx_hash };
		let response: TransactionDetailsResponse = self.rpc(GET_TX_DETAILS, &params).await?;
		match response.status.as_deref() {
			Some(STATUS_BUSY) => Err(NodeError::Busy),
			// Other statuses are judged by the decoder's validation gate.
			_ => Ok(response),
		}
	}
}

#[async_trait::async_trait]
impl ChainNode for DaemonRpcClient {
	async fn get_height(&self) -> Result<u64, NodeError> {
		self.with_retry("getheight", || self.fetch_height()).await
	}

	async fn get_block_details(&self, height: u64) -> Result<BlockDetails, NodeError> {
		self.with_retry(GET_BLOCKS_DETAILS, || self.fetch_block(height))
			.await
	}

	async fn get_transaction_details(
		&self,
		tx_hash: &str,
	) -> Result<TransactionDetailsResponse, NodeError> {
		self.with_retry(GET_TX_DETAILS, || self.fetch_transaction(tx_hash))
			.await
	}
}
