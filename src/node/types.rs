//! Wire types for the chain-node JSON-RPC interface.

use serde::{Deserialize, Serialize};

/// Node status string reported for a successful call.
pub const STATUS_OK: &str = "OK";
/// Node status string reported while the daemon is syncing or overloaded.
pub const STATUS_BUSY: &str = "BUSY";
/// Node status string reported when the requested object does not exist.
pub const STATUS_NOT_FOUND: &str = "NOT_FOUND";

/// JSON-RPC 2.0 request envelope
#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a, P> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    pub params: P,
}

impl<'a, P> JsonRpcRequest<'a, P> {
    pub fn new(id: u64, method: &'a str, params: P) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

/// Error object embedded in a JSON-RPC response
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
}

/// JSON-RPC 2.0 response envelope
#[derive(Debug, Deserialize)]
pub struct JsonRpcResponse<T> {
    pub result: Option<T>,
    pub error: Option<JsonRpcError>,
}

impl<T> JsonRpcResponse<T> {
    /// Unwrap the envelope, mapping embedded errors and empty results.
    pub fn into_result(self, method: &str) -> Result<T, NodeError> {
        if let Some(error) = self.error {
            return Err(NodeError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        self.result.ok_or_else(|| {
            NodeError::MalformedResponse(format!("Node returned empty result for method {}", method))
        })
    }
}

/// Response of the `getheight` endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct HeightResponse {
    pub height: Option<u64>,
    pub status: Option<String>,
}

/// Parameters of the `get_blocks_details` RPC method.
#[derive(Debug, Clone, Serialize)]
pub struct BlocksDetailsParams {
    pub count: u64,
    pub height_start: u64,
    pub ignore_transactions: bool,
}

/// Result of the `get_blocks_details` RPC method.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlocksDetailsResponse {
    #[serde(default)]
    pub blocks: Vec<BlockDetails>,
    pub status: Option<String>,
}

/// Header-level details of one block, including the hashes of its transactions.
#[derive(Debug, Clone, Deserialize)]
pub struct BlockDetails {
    pub height: u64,
    /// Block timestamp in seconds.
    pub timestamp: u64,
    #[serde(default)]
    pub transactions_details: Vec<TransactionSummary>,
}

/// Transaction reference inside a block detail.
#[derive(Debug, Clone, Deserialize)]
pub struct TransactionSummary {
    pub id: String,
}

/// Parameters of the `get_tx_details` RPC method.
#[derive(Debug, Clone, Serialize)]
pub struct TransactionDetailsParams<'a> {
    pub tx_hash: &'a str,
}

/// Result of the `get_tx_details` RPC method.
///
/// Every field is optional so that structural validation happens in the decoder,
/// where a failing transaction is skipped instead of failing the whole block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionDetailsResponse {
    pub status: Option<String>,
    pub tx_info: Option<TransactionInfo>,
}

/// Full detail of one transaction as returned by the node.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionInfo {
    pub amount: Option<u64>,
    pub blob: Option<String>,
    pub blob_size: Option<u64>,
    pub id: Option<String>,
    pub keeper_block: Option<u64>,
    /// The transaction body serialized as a JSON document.
    pub object_in_json: Option<String>,
    pub pub_key: Option<String>,
    pub timestamp: Option<u64>,
}

/// The parsed `object_in_json` document of a transaction.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionObject {
    #[serde(default)]
    pub vin: Vec<TransactionInput>,
    #[serde(default)]
    pub vout: Vec<TransactionOutput>,
    /// Extra fields are heterogeneous; only `pub_key` entries are of interest.
    #[serde(default)]
    pub extra: Vec<serde_json::Value>,
}

impl TransactionObject {
    /// The transaction public key: the first non-empty `pub_key` found in `extra`.
    pub fn public_key(&self) -> Option<&str> {
        self.extra
            .iter()
            .filter_map(|item| item.get("pub_key").and_then(|key| key.as_str()))
            .find(|key| !key.is_empty())
    }
}

/// One transaction input. Only zero-knowledge inputs carry a key image.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionInput {
    pub txin_zc_input: Option<ZcInput>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZcInput {
    pub k_image: Option<String>,
}

/// One transaction output. Only confidential outputs can belong to the account.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransactionOutput {
    pub tx_out_zarcanum: Option<ZarcanumOutput>,
}

/// Confidential output with stealth address and encrypted amount.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ZarcanumOutput {
    pub stealth_address: Option<String>,
    pub concealing_point: Option<String>,
    pub amount_commitment: Option<String>,
    pub blinded_asset_id: Option<String>,
    /// Nodes render this either as a JSON number or a string.
    pub encrypted_amount: Option<serde_json::Value>,
}

impl ZarcanumOutput {
    /// The encrypted amount as text, whichever JSON form the node used.
    pub fn encrypted_amount_text(&self) -> Option<String> {
        match self.encrypted_amount.as_ref()? {
            serde_json::Value::String(text) if !text.is_empty() => Some(text.clone()),
            serde_json::Value::Number(number) => Some(number.to_string()),
            _ => None,
        }
    }
}

/// Error types for chain-node operations
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Node unavailable: {0}")]
    Unavailable(String),

    #[error("Node is busy")]
    Busy,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid node configuration: {0}")]
    InvalidConfig(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),
}

impl NodeError {
    /// Whether retrying the same request later can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            NodeError::Unavailable(_) | NodeError::Busy => true,
            NodeError::HttpError(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            _ => false,
        }
    }

    /// Map a node `status` field to an error, if it is not `OK`.
    pub fn from_status(status: Option<&str>, subject: &str) -> Result<(), NodeError> {
        match status {
            None | Some(STATUS_OK) => Ok(()),
            Some(STATUS_BUSY) => Err(NodeError::Busy),
            Some(STATUS_NOT_FOUND) => Err(NodeError::NotFound(subject.to_string())),
            Some(other) => Err(NodeError::MalformedResponse(format!(
                "Unexpected status {} for {}",
                other, subject
            ))),
        }
    }
}
