//! Backend failover
//!
//! Every call starts at the currently selected backend of its class and,
//! when `auto_switch` is on, walks the remaining backends round-robin until
//! one answers. `safe_fetch` wraps that walk in an outer retry loop for
//! explorers that return transient internal errors.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::config::WalletConfig;
use crate::error::{BackendError, Result, WalletError};
use crate::transaction::Transaction;
use crate::types::{RawBlock, Txid};

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackendKind {
    /// Indexing explorer (history, UTXOs, xpub lookups)
    Explorer,
    /// Full node RPC (blocks, broadcast, shield data)
    Node,
}

/// UTXO as reported by an explorer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerUtxo {
    pub txid: String,
    pub vout: u32,
    /// Satoshis, as a decimal string
    pub value: String,
    #[serde(default)]
    pub height: Option<u32>,
    #[serde(default)]
    pub confirmations: u32,
}

/// Address derived from an xpub that has seen activity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpubAddress {
    pub name: String,
    pub path: String,
    #[serde(default)]
    pub transfers: u32,
    #[serde(default)]
    pub balance: String,
}

/// Aggregated xpub information
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpubInfo {
    pub address: String,
    #[serde(default)]
    pub balance: String,
    #[serde(default)]
    pub total_received: String,
    #[serde(default)]
    pub total_sent: String,
    #[serde(default)]
    pub unconfirmed_balance: String,
    #[serde(default)]
    pub txs: u32,
    #[serde(default)]
    pub used_tokens: Option<u32>,
    #[serde(default)]
    pub tokens: Option<Vec<XpubAddress>>,
}

/// Explorer view of a single transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TxInfo {
    pub txid: String,
    #[serde(default)]
    pub hex: String,
    #[serde(default = "unconfirmed")]
    pub block_height: i64,
    #[serde(default = "unconfirmed")]
    pub block_time: i64,
    #[serde(default)]
    pub confirmations: u32,
}

fn unconfirmed() -> i64 {
    -1
}

/// A chain data source. Every operation defaults to
/// [`BackendError::Unsupported`] so the manager can skip backends that do
/// not serve a call.
#[async_trait]
pub trait Backend: Send + Sync {
    fn url(&self) -> &str;

    fn kind(&self) -> BackendKind;

    async fn get_block(&self, _height: u32) -> BackendResult<RawBlock> {
        Err(BackendError::Unsupported("get_block"))
    }

    async fn get_block_count(&self) -> BackendResult<u32> {
        Err(BackendError::Unsupported("get_block_count"))
    }

    async fn get_best_block_hash(&self) -> BackendResult<String> {
        Err(BackendError::Unsupported("get_best_block_hash"))
    }

    async fn get_utxos(&self, _address: &str) -> BackendResult<Vec<ExplorerUtxo>> {
        Err(BackendError::Unsupported("get_utxos"))
    }

    /// Page `page` (1-based) of the transactions of `address` (an address
    /// or xpub) confirmed at or above `start_height`
    async fn get_tx_page(&self, _start_height: i64, _address: &str, _page: u32) -> BackendResult<Vec<Transaction>> {
        Err(BackendError::Unsupported("get_tx_page"))
    }

    async fn get_num_pages(&self, _start_height: i64, _address: &str) -> BackendResult<u32> {
        Err(BackendError::Unsupported("get_num_pages"))
    }

    async fn get_xpub_info(&self, _xpub: &str) -> BackendResult<XpubInfo> {
        Err(BackendError::Unsupported("get_xpub_info"))
    }

    /// Broadcast a raw transaction, returning whatever the backend reports
    /// as the txid
    async fn send_transaction(&self, _hex: &str) -> BackendResult<String> {
        Err(BackendError::Unsupported("send_transaction"))
    }

    /// Heights of the blocks holding at least one shield transaction
    async fn get_shield_block_list(&self) -> BackendResult<Vec<u32>> {
        Err(BackendError::Unsupported("get_shield_block_list"))
    }

    async fn get_tx_info(&self, _txid: &str) -> BackendResult<TxInfo> {
        Err(BackendError::Unsupported("get_tx_info"))
    }
}

struct Selection {
    backends: Vec<Arc<dyn Backend>>,
    explorer: Option<usize>,
    node: Option<usize>,
}

impl Selection {
    fn new(backends: Vec<Arc<dyn Backend>>) -> Self {
        let explorer = backends.iter().position(|b| b.kind() == BackendKind::Explorer);
        let node = backends.iter().position(|b| b.kind() == BackendKind::Node);
        Self {
            backends,
            explorer,
            node,
        }
    }

    fn current(&self, kind: BackendKind) -> Option<usize> {
        match kind {
            BackendKind::Explorer => self.explorer,
            BackendKind::Node => self.node,
        }
    }
}

pub struct NetworkManager {
    initial: Vec<Arc<dyn Backend>>,
    selection: RwLock<Selection>,
    auto_switch: bool,
    safe_fetch_attempts: usize,
    safe_fetch_delay: Duration,
}

impl NetworkManager {
    pub fn new(config: &WalletConfig, backends: Vec<Arc<dyn Backend>>) -> Self {
        Self {
            initial: backends.clone(),
            selection: RwLock::new(Selection::new(backends)),
            auto_switch: config.auto_switch,
            safe_fetch_attempts: config.safe_fetch_attempts,
            safe_fetch_delay: config.safe_fetch_delay(),
        }
    }

    pub fn backends(&self) -> Vec<Arc<dyn Backend>> {
        self.selection.read().backends.clone()
    }

    /// Select the backend at `url` as the current one of `kind`
    pub fn set_network(&self, url: &str, kind: BackendKind) -> Result<()> {
        let mut selection = self.selection.write();
        let index = selection
            .backends
            .iter()
            .position(|b| b.url() == url)
            .ok_or_else(|| WalletError::StateInvariant(format!("unknown backend {}", url)))?;
        match kind {
            BackendKind::Explorer => selection.explorer = Some(index),
            BackendKind::Node => selection.node = Some(index),
        }
        tracing::debug!("Selected {} as {:?}", url, kind);
        Ok(())
    }

    /// Restore the configured backend list and default selections
    pub fn reset(&self) {
        *self.selection.write() = Selection::new(self.initial.clone());
    }

    /// Run `op` against the current backend of `kind`, failing over to the
    /// next backend (wrapping around) on error. Makes at most one attempt
    /// per backend, or a single attempt when auto switching is disabled.
    pub async fn retry_wrapper<T, F, Fut>(&self, operation: &'static str, kind: BackendKind, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let (backends, current) = {
            let selection = self.selection.read();
            (selection.backends.clone(), selection.current(kind))
        };
        if backends.is_empty() {
            return Err(WalletError::NetworkExhausted {
                operation,
                last_error: "no backend configured".to_string(),
            });
        }
        let start = current.unwrap_or_else(|| {
            tracing::warn!("No current {:?} backend, starting from the first one", kind);
            0
        });

        let max_tries = backends.len();
        let mut last_error = BackendError::Unsupported(operation);
        for attempt in 0..max_tries {
            let backend = Arc::clone(&backends[(start + attempt) % max_tries]);
            tracing::debug!("Attempting {} on {}", operation, backend.url());
            match op(Arc::clone(&backend)).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::debug!("{} failed on {}: {}", backend.url(), operation, e);
                    last_error = e;
                    if !self.auto_switch {
                        break;
                    }
                }
            }
        }

        Err(WalletError::NetworkExhausted {
            operation,
            last_error: last_error.to_string(),
        })
    }

    /// [`Self::retry_wrapper`] repeated up to `safe_fetch_attempts` times,
    /// pausing `safe_fetch_delay` between rounds
    pub async fn safe_fetch<T, F, Fut>(&self, operation: &'static str, kind: BackendKind, op: F) -> Result<T>
    where
        F: Fn(Arc<dyn Backend>) -> Fut,
        Fut: Future<Output = BackendResult<T>>,
    {
        let mut last_error = String::new();
        for attempt in 1..=self.safe_fetch_attempts {
            match self.retry_wrapper(operation, kind, &op).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    last_error = e.to_string();
                    if attempt < self.safe_fetch_attempts {
                        tracing::warn!(
                            "{} failed on every backend, sleeping for {:?} before retrying",
                            operation,
                            self.safe_fetch_delay
                        );
                        tokio::time::sleep(self.safe_fetch_delay).await;
                    }
                }
            }
        }
        Err(WalletError::NetworkExhausted {
            operation,
            last_error,
        })
    }

    // ========================================================================
    // OPERATIONS
    // ========================================================================

    pub async fn get_block(&self, height: u32) -> Result<RawBlock> {
        self.safe_fetch("get_block", BackendKind::Node, |b| async move {
            b.get_block(height).await
        })
        .await
    }

    pub async fn get_tx_page(&self, start_height: i64, address: &str, page: u32) -> Result<Vec<Transaction>> {
        self.safe_fetch("get_tx_page", BackendKind::Explorer, |b| async move {
            b.get_tx_page(start_height, address, page).await
        })
        .await
    }

    pub async fn get_num_pages(&self, start_height: i64, address: &str) -> Result<u32> {
        self.safe_fetch("get_num_pages", BackendKind::Explorer, |b| async move {
            b.get_num_pages(start_height, address).await
        })
        .await
    }

    pub async fn get_utxos(&self, address: &str) -> Result<Vec<ExplorerUtxo>> {
        self.retry_wrapper("get_utxos", BackendKind::Explorer, |b| async move {
            b.get_utxos(address).await
        })
        .await
    }

    pub async fn get_xpub_info(&self, xpub: &str) -> Result<XpubInfo> {
        self.retry_wrapper("get_xpub_info", BackendKind::Explorer, |b| async move {
            b.get_xpub_info(xpub).await
        })
        .await
    }

    pub async fn get_shield_block_list(&self) -> Result<Vec<u32>> {
        self.retry_wrapper("get_shield_block_list", BackendKind::Node, |b| async move {
            b.get_shield_block_list().await
        })
        .await
    }

    pub async fn get_block_count(&self) -> Result<u32> {
        self.retry_wrapper("get_block_count", BackendKind::Node, |b| async move {
            b.get_block_count().await
        })
        .await
    }

    pub async fn get_best_block_hash(&self) -> Result<String> {
        self.retry_wrapper("get_best_block_hash", BackendKind::Node, |b| async move {
            b.get_best_block_hash().await
        })
        .await
    }

    pub async fn get_tx_info(&self, txid: &str) -> Result<TxInfo> {
        self.retry_wrapper("get_tx_info", BackendKind::Explorer, |b| async move {
            b.get_tx_info(txid).await
        })
        .await
    }

    /// Broadcast `hex`. A reply that is not a txid counts as a rejection.
    pub async fn send_transaction(&self, hex: &str) -> Result<Txid> {
        let reply = self
            .retry_wrapper("send_transaction", BackendKind::Node, |b| async move {
                b.send_transaction(hex).await
            })
            .await?;
        if reply.len() != 64 {
            return Err(BackendError::InvalidResponse(format!("transaction rejected: {}", reply)).into());
        }
        let txid: Txid = reply.parse()?;
        tracing::info!("Transaction sent: {}", txid);
        Ok(txid)
    }
}
