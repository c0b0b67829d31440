//! Chain-node integration module
//!
//! This module provides the `ChainNode` collaborator contract and its JSON-RPC implementation,
//! together with the wire types returned by the node. The node is assumed honest and available;
//! the transport is responsible for timeouts and retries of transient failures.

/// JSON-RPC client for the chain node
mod client;
/// Type definitions for node responses
mod types;

pub use client::{ChainNode, DaemonRpcClient};
pub use types::*;
