//! Persistent wallet storage
//!
//! The concrete database lives outside this crate. [`WalletStore`] is the
//! typed surface the engine needs; [`MemoryStore`] backs tests and
//! ephemeral wallets.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::Result;
use crate::transaction::Transaction;
use crate::types::Txid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub label: String,
    pub address: String,
}

/// The single account record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Key used to tell whether persisted data belongs to the loaded wallet
    pub public_key: String,
    /// Encrypted backup of the secret, empty when not encrypted
    #[serde(default)]
    pub enc_secret: String,
    #[serde(default)]
    pub contacts: Vec<Contact>,
    /// Opaque save blob of the shield prover
    #[serde(default)]
    pub shield_data: Option<String>,
}

/// A confirmed transaction as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredTx {
    pub txid: Txid,
    pub hex: String,
    pub block_height: i64,
    pub block_time: i64,
}

impl StoredTx {
    pub fn from_transaction(tx: &Transaction) -> Self {
        Self {
            txid: tx.txid(),
            hex: tx.to_hex(),
            block_height: tx.block_height,
            block_time: tx.block_time,
        }
    }

    pub fn to_transaction(&self) -> Result<Transaction> {
        let mut tx = Transaction::from_hex(&self.hex)?;
        tx.block_height = self.block_height;
        tx.block_time = self.block_time;
        Ok(tx)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    pub explorer: Option<String>,
    pub node: Option<String>,
    #[serde(default)]
    pub auto_switch: bool,
    /// Default cold staker for delegations
    pub cold_staking_address: Option<String>,
}

#[async_trait]
pub trait WalletStore: Send + Sync {
    async fn get_account(&self) -> Result<Option<Account>>;

    async fn put_account(&self, account: Account) -> Result<()>;

    async fn remove_account(&self) -> Result<()>;

    async fn get_txs(&self) -> Result<Vec<StoredTx>>;

    async fn store_tx(&self, tx: StoredTx) -> Result<()>;

    async fn remove_all_txs(&self) -> Result<()>;

    async fn get_settings(&self) -> Result<Settings>;

    async fn set_settings(&self, settings: Settings) -> Result<()>;
}

#[derive(Default)]
struct MemoryTables {
    account: Option<Account>,
    txs: BTreeMap<Txid, StoredTx>,
    settings: Settings,
}

/// In-memory store
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<MemoryTables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tx_count(&self) -> usize {
        self.tables.lock().txs.len()
    }
}

#[async_trait]
impl WalletStore for MemoryStore {
    async fn get_account(&self) -> Result<Option<Account>> {
        Ok(self.tables.lock().account.clone())
    }

    async fn put_account(&self, account: Account) -> Result<()> {
        self.tables.lock().account = Some(account);
        Ok(())
    }

    async fn remove_account(&self) -> Result<()> {
        self.tables.lock().account = None;
        Ok(())
    }

    async fn get_txs(&self) -> Result<Vec<StoredTx>> {
        Ok(self.tables.lock().txs.values().cloned().collect())
    }

    async fn store_tx(&self, tx: StoredTx) -> Result<()> {
        self.tables.lock().txs.insert(tx.txid, tx);
        Ok(())
    }

    async fn remove_all_txs(&self) -> Result<()> {
        self.tables.lock().txs.clear();
        Ok(())
    }

    async fn get_settings(&self) -> Result<Settings> {
        Ok(self.tables.lock().settings.clone())
    }

    async fn set_settings(&self, settings: Settings) -> Result<()> {
        self.tables.lock().settings = settings;
        Ok(())
    }
}
