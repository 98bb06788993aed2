//! # Wallet Engine
//!
//! Light wallet engine for a Bitcoin-derived chain with cold staking,
//! budget proposals, exchange addresses and an optional shielded pool.
//!
//! The engine keeps the wallet's own transactions in a ledger
//! ([`mempool::Mempool`]), derives and watches addresses
//! ([`scanner::AddressScanner`]), builds and signs transactions
//! ([`builder::TransactionBuilder`]) and talks to explorers and nodes through
//! a failover manager ([`network::NetworkManager`]).
//!
//! ## Architecture
//!
//! - Wire format: `codec`, `transaction`, `script`
//! - Keys and addresses: `keys`, `address`, `scanner`
//! - Ledger: `mempool`, `historical`
//! - I/O seams: `network` + `backends`, `store`, `shield`
//! - Orchestration: `wallet`
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use wallet_engine::{
//!     HdMasterKey, MemoryStore, NetworkManager, Wallet, WalletConfig, WalletContext,
//! };
//!
//! let config = WalletConfig::for_testing();
//! let context = WalletContext {
//!     network: Arc::new(NetworkManager::new(&config, Vec::new())),
//!     store: Arc::new(MemoryStore::new()),
//!     config,
//! };
//! let key = HdMasterKey::from_seed(&[7u8; 32], &context.config.chain).unwrap();
//! let wallet = Wallet::new(context, Arc::new(key), None).unwrap();
//! assert!(wallet.is_hd());
//! assert!(!wallet.get_current_address().unwrap().is_empty());
//! ```

pub mod address;
pub mod backends;
pub mod builder;
pub mod codec;
pub mod config;
pub mod constants;
pub mod error;
pub mod hashes;
pub mod historical;
pub mod keys;
pub mod logging;
pub mod mempool;
pub mod network;
pub mod scanner;
pub mod script;
pub mod shield;
pub mod store;
pub mod transaction;
pub mod types;
pub mod wallet;

// Re-export commonly used types
pub use builder::TransactionBuilder;
pub use config::{ChainParams, WalletConfig};
pub use constants::*;
pub use error::{BackendError, Result, WalletError};
pub use historical::{HistoricalTx, HistoricalTxType};
pub use keys::{HdMasterKey, LegacyMasterKey, MasterKey};
pub use mempool::{Mempool, OutpointState, UtxoQuery};
pub use network::{Backend, BackendKind, NetworkManager};
pub use scanner::AddressScanner;
pub use shield::ShieldProver;
pub use store::{MemoryStore, WalletStore};
pub use transaction::Transaction;
pub use types::{Outpoint, RawBlock, TxIn, TxOut, Txid, Utxo};
pub use wallet::{CreateTxOptions, Wallet, WalletContext};
