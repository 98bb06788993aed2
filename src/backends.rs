//! HTTP backends: a Blockbook explorer and a REST-wrapped RPC node

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use crate::config::ChainParams;
use crate::constants::TX_PAGE_SIZE;
use crate::error::BackendError;
use crate::network::{Backend, BackendKind, BackendResult, ExplorerUtxo, TxInfo, XpubInfo};
use crate::transaction::Transaction;
use crate::types::RawBlock;

/// Every explorer then every node of `params`, in that order
pub fn from_chain_params(params: &ChainParams) -> Vec<Arc<dyn Backend>> {
    let client = Client::new();
    let explorers = params
        .explorers
        .iter()
        .map(|url| Arc::new(ExplorerBackend::with_client(url, client.clone())) as Arc<dyn Backend>);
    let nodes = params
        .nodes
        .iter()
        .map(|url| Arc::new(RpcNodeBackend::with_client(url, client.clone())) as Arc<dyn Backend>);
    explorers.chain(nodes).collect()
}

fn is_xpub(address: &str) -> bool {
    address.starts_with("xpub")
}

/// RPC replies quote plain string results
fn strip_quotes(text: &str) -> String {
    text.trim().replace('"', "")
}

async fn fetch_text(client: &Client, url: &str) -> BackendResult<String> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(BackendError::Request(format!("{} returned {}", url, response.status())));
    }
    Ok(response.text().await?)
}

fn parse_json<T: for<'de> Deserialize<'de>>(text: &str) -> BackendResult<T> {
    serde_json::from_str(text).map_err(|e| BackendError::InvalidResponse(e.to_string()))
}

// ============================================================================
// EXPLORER
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBackend {
    blocks: u32,
    best_block_hash: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    backend: StatusBackend,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageTx {
    hex: String,
    #[serde(default = "unconfirmed")]
    block_height: i64,
    #[serde(default = "unconfirmed")]
    block_time: i64,
}

fn unconfirmed() -> i64 {
    -1
}

#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    page: u32,
    #[serde(default)]
    txs: u32,
    #[serde(default)]
    transactions: Vec<PageTx>,
}

#[derive(Debug, Deserialize)]
struct SendReply {
    result: Option<String>,
    error: Option<String>,
}

/// Blockbook style indexer
pub struct ExplorerBackend {
    url: String,
    client: Client,
}

impl ExplorerBackend {
    pub fn new(url: &str) -> Self {
        Self::with_client(url, Client::new())
    }

    pub fn with_client(url: &str, client: Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn fetch<T: for<'de> Deserialize<'de>>(&self, api: &str) -> BackendResult<T> {
        parse_json(&fetch_text(&self.client, &format!("{}{}", self.url, api)).await?)
    }

    async fn status(&self) -> BackendResult<Status> {
        self.fetch("/api/v2/api").await
    }

    async fn page(&self, start_height: i64, address: &str, page: u32, page_size: u32) -> BackendResult<Page> {
        self.fetch(&page_path(start_height, address, page, page_size)).await
    }
}

fn page_path(start_height: i64, address: &str, page: u32, page_size: u32) -> String {
    let root = if is_xpub(address) { "xpub" } else { "address" };
    format!(
        "/api/v2/{}/{}?details=txs&from={}&pageSize={}&page={}",
        root,
        address,
        start_height.max(0),
        page_size,
        page
    )
}

fn page_transactions(page: Page) -> BackendResult<Vec<Transaction>> {
    page.transactions
        .into_iter()
        .map(|entry| {
            let mut tx = Transaction::from_hex(&entry.hex).map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
            tx.block_height = entry.block_height;
            tx.block_time = entry.block_time;
            Ok(tx)
        })
        .collect()
}

#[async_trait]
impl Backend for ExplorerBackend {
    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Explorer
    }

    async fn get_block_count(&self) -> BackendResult<u32> {
        Ok(self.status().await?.backend.blocks)
    }

    async fn get_best_block_hash(&self) -> BackendResult<String> {
        Ok(self.status().await?.backend.best_block_hash)
    }

    async fn get_utxos(&self, address: &str) -> BackendResult<Vec<ExplorerUtxo>> {
        self.fetch(&format!("/api/v2/utxo/{}", address)).await
    }

    async fn get_tx_page(&self, start_height: i64, address: &str, page: u32) -> BackendResult<Vec<Transaction>> {
        page_transactions(self.page(start_height, address, page, TX_PAGE_SIZE).await?)
    }

    /// Blockbook answers an out of range page with its last page, so asking
    /// for one past the transaction count reveals the page count at size 1
    async fn get_num_pages(&self, start_height: i64, address: &str) -> BackendResult<u32> {
        let total = self.page(start_height, address, 1, 1).await?.txs;
        let overflow = total + 2;
        let last = self.page(start_height, address, overflow, 1).await?.page;
        if last >= overflow {
            return Err(BackendError::InvalidResponse(format!(
                "page {} reported for a request of page {}",
                last, overflow
            )));
        }
        Ok(last.div_ceil(TX_PAGE_SIZE))
    }

    async fn get_xpub_info(&self, xpub: &str) -> BackendResult<XpubInfo> {
        self.fetch(&format!("/api/v2/xpub/{}", xpub)).await
    }

    async fn send_transaction(&self, hex: &str) -> BackendResult<String> {
        let response = self
            .client
            .post(format!("{}/api/v2/sendtx/", self.url))
            .body(hex.to_string())
            .send()
            .await?;
        let reply: SendReply = parse_json(&response.text().await?)?;
        match (reply.result, reply.error) {
            (Some(txid), _) => Ok(txid),
            (None, Some(error)) => Err(BackendError::InvalidResponse(error)),
            (None, None) => Err(BackendError::InvalidResponse("empty reply".to_string())),
        }
    }

    async fn get_tx_info(&self, txid: &str) -> BackendResult<TxInfo> {
        self.fetch(&format!("/api/v2/tx/{}", txid)).await
    }
}

// ============================================================================
// RPC NODE
// ============================================================================

/// Node exposing its RPC methods as `GET /<method>?params=...`
pub struct RpcNodeBackend {
    url: String,
    client: Client,
}

impl RpcNodeBackend {
    pub fn new(url: &str) -> Self {
        Self::with_client(url, Client::new())
    }

    pub fn with_client(url: &str, client: Client) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            client,
        }
    }

    async fn call_text(&self, api: &str) -> BackendResult<String> {
        fetch_text(&self.client, &format!("{}{}", self.url, api)).await
    }

    async fn call<T: for<'de> Deserialize<'de>>(&self, api: &str) -> BackendResult<T> {
        parse_json(&self.call_text(api).await?)
    }
}

/// jq filter reducing a verbose block to `{height, time, txs: [{hex, txid}], finalsaplingroot}`
const BLOCK_FILTER: &str = "&filter=.%20%7C%20.txs%20%3D%20%5B.tx%5B%5D%20%7C%20%7B%20hex%3A%20.hex%2C%20txid%3A%20.txid%7D%5D%20%7C%20del(.tx)";

#[async_trait]
impl Backend for RpcNodeBackend {
    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Node
    }

    async fn get_block(&self, height: u32) -> BackendResult<RawBlock> {
        let hash = strip_quotes(&self.call_text(&format!("/getblockhash?params={}", height)).await?);
        self.call(&format!("/getblock?params={},2{}", hash, BLOCK_FILTER)).await
    }

    async fn get_block_count(&self) -> BackendResult<u32> {
        let text = self.call_text("/getblockcount").await?;
        strip_quotes(&text)
            .parse()
            .map_err(|_| BackendError::InvalidResponse(format!("block count {}", text)))
    }

    async fn get_best_block_hash(&self) -> BackendResult<String> {
        Ok(strip_quotes(&self.call_text("/getbestblockhash").await?))
    }

    async fn send_transaction(&self, hex: &str) -> BackendResult<String> {
        Ok(strip_quotes(
            &self.call_text(&format!("/sendrawtransaction?params={}", hex)).await?,
        ))
    }

    async fn get_shield_block_list(&self) -> BackendResult<Vec<u32>> {
        self.call("/getshieldblocks").await
    }
}
