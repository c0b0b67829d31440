//! Wallet-side synchronization: account keys, transaction decoding, the key-image ledger and
//! the engine that keeps it in step with the chain.

pub mod balance;
pub mod chain_reader;
pub mod controller;
pub mod decoder;
pub mod keys;
pub mod ledger;
pub mod oracle;
pub mod sync;
pub mod types;

pub use balance::{BalanceFeed, BalanceStream};
pub use chain_reader::ChainReader;
pub use controller::Controller;
pub use decoder::{DecodeRejected, TransactionDecoder};
pub use keys::{AccountKeys, KeyError, KeyImage};
pub use ledger::{KeyImageLedger, KeyImageRecord, LedgerError, TransactionEffect};
pub use oracle::{AddressKeys, CryptoOracle};
pub use sync::{EngineStatus, ResyncReport, ScanOutcome};
pub use types::*;
