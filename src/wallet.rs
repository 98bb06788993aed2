//! Wallet orchestration
//!
//! [`Wallet`] ties a master key, the ledger, the address scanner, the
//! network and an optional shield prover together. It owns every piece of
//! mutable state; collaborators are reached through [`WalletContext`].

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::address;
use crate::builder::TransactionBuilder;
use crate::config::WalletConfig;
use crate::constants::*;
use crate::error::{Result, WalletError};
use crate::historical::{HistoricalTx, HistoricalTxList, ShieldAmounts};
use crate::keys::MasterKey;
use crate::mempool::{Mempool, OutpointState, UtxoQuery};
use crate::network::{BackendKind, NetworkManager};
use crate::scanner::{AddressScanner, EXTERNAL};
use crate::script::{self, ScriptKind};
use crate::shield::{ShieldInput, ShieldProver, ShieldTxRequest};
use crate::store::{Account, StoredTx, WalletStore};
use crate::transaction::Transaction;
use crate::types::{Outpoint, RawBlock, Txid, Utxo};

/// Collaborators shared by a wallet instance
#[derive(Clone)]
pub struct WalletContext {
    pub config: WalletConfig,
    pub network: Arc<NetworkManager>,
    pub store: Arc<dyn WalletStore>,
}

/// Options of [`Wallet::create_transaction`]
#[derive(Debug, Clone)]
pub struct CreateTxOptions {
    /// Delegate the value to the cold staker `address`
    pub is_delegation: bool,
    /// Spend delegated outputs (undelegation)
    pub use_delegated_inputs: bool,
    pub use_shield_inputs: bool,
    /// Delegate the change to `change_delegation_address`
    pub delegate_change: bool,
    pub change_delegation_address: Option<String>,
    /// `address` is the hex hash of a budget proposal
    pub is_proposal: bool,
    /// Take a missing fee out of the sent amount instead of failing
    pub subtract_fee_from_amount: bool,
    pub change_address: Option<String>,
    /// Owner of a delegation, a fresh change address when unset
    pub return_address: Option<String>,
}

impl Default for CreateTxOptions {
    fn default() -> Self {
        Self {
            is_delegation: false,
            use_delegated_inputs: false,
            use_shield_inputs: false,
            delegate_change: false,
            change_delegation_address: None,
            is_proposal: false,
            subtract_fee_from_amount: true,
            change_address: None,
            return_address: None,
        }
    }
}

pub struct Wallet {
    context: WalletContext,
    scanner: AddressScanner,
    mempool: Mempool,
    shield: Option<Arc<dyn ShieldProver>>,
    historical: HistoricalTxList,
    /// Chain height as last reported by the network
    block_count: u32,
    last_processed_block: u32,
    is_synced: bool,
    syncing: bool,
}

impl Wallet {
    pub fn new(
        context: WalletContext,
        master_key: Arc<dyn MasterKey>,
        shield: Option<Arc<dyn ShieldProver>>,
    ) -> Result<Self> {
        let scanner = AddressScanner::new(
            master_key,
            context.config.chain.clone(),
            context.config.account,
        )?;
        Ok(Self {
            context,
            scanner,
            mempool: Mempool::new(),
            shield,
            historical: HistoricalTxList::new(),
            block_count: 0,
            last_processed_block: 0,
            is_synced: false,
            syncing: false,
        })
    }

    fn master_key(&self) -> &Arc<dyn MasterKey> {
        self.scanner.master_key()
    }

    pub fn is_view_only(&self) -> bool {
        self.master_key().is_view_only()
    }

    pub fn is_hd(&self) -> bool {
        self.master_key().is_hd()
    }

    pub fn has_shield(&self) -> bool {
        self.shield.is_some()
    }

    pub fn is_synced(&self) -> bool {
        self.is_synced
    }

    pub fn block_count(&self) -> u32 {
        self.block_count
    }

    pub fn get_key_to_export(&self) -> Result<String> {
        self.master_key().key_to_export(self.context.config.account)
    }

    pub fn get_current_address(&self) -> Result<String> {
        self.scanner.get_current_address()
    }

    pub fn get_new_address(&mut self) -> Result<(String, String)> {
        self.scanner.get_new_address(EXTERNAL)
    }

    pub fn get_new_change_address(&mut self) -> Result<String> {
        self.scanner.get_new_change_address()
    }

    pub fn is_own_address(&self, address: &str) -> bool {
        self.scanner.is_own_address(address).is_some()
    }

    // ========================================================================
    // SYNC
    // ========================================================================

    /// Load persisted state, then catch up with the network. A wallet syncs
    /// once; later blocks arrive through [`Self::handle_new_block`].
    pub async fn sync(&mut self) -> Result<()> {
        if self.is_synced {
            return Err(WalletError::StateInvariant("attempting to sync when already synced".to_string()));
        }
        if self.syncing {
            return Err(WalletError::StateInvariant("a sync is already running".to_string()));
        }
        self.syncing = true;
        let result = self.run_sync().await;
        self.syncing = false;
        result
    }

    async fn run_sync(&mut self) -> Result<()> {
        self.apply_settings().await?;
        self.block_count = self.context.network.get_block_count().await?;
        tracing::info!("Syncing wallet up to block {}", self.block_count);

        self.load_shield_from_disk().await?;
        self.load_from_disk().await?;

        // explorers tend to miss the most recent blocks; fetch them directly
        self.last_processed_block = self.block_count.saturating_sub(EXPLORER_TIP_LAG);
        self.transparent_sync().await?;
        if self.has_shield() {
            self.sync_shield().await?;
        }
        self.is_synced = true;
        self.get_latest_blocks(self.block_count).await?;
        self.scanner.update_current_address();
        self.mempool.save_to_disk(self.context.store.as_ref()).await?;

        tracing::info!(
            "Wallet synced: {} transactions, balance {}",
            self.mempool.len(),
            self.balance()
        );
        Ok(())
    }

    /// Select the explorer and node stored in the settings
    async fn apply_settings(&self) -> Result<()> {
        let settings = self.context.store.get_settings().await?;
        let selections = [
            (settings.explorer, BackendKind::Explorer),
            (settings.node, BackendKind::Node),
        ];
        for (url, kind) in selections {
            if let Some(url) = url {
                if let Err(e) = self.context.network.set_network(&url, kind) {
                    tracing::warn!("Ignoring stored {:?} selection: {}", kind, e);
                }
            }
        }
        Ok(())
    }

    /// Walk the explorer history of the exported key, oldest page first
    pub async fn transparent_sync(&mut self) -> Result<()> {
        if self.is_synced {
            return Ok(());
        }
        let address = self.get_key_to_export()?;
        let start_height = self
            .mempool
            .get_transactions()
            .iter()
            .map(|tx| tx.block_height)
            .max()
            .unwrap_or(0)
            .max(0);

        let network = Arc::clone(&self.context.network);
        let pages = network.get_num_pages(start_height, &address).await?;
        for page in (1..=pages).rev() {
            tracing::debug!("Transparent sync page {} of {}", pages - page + 1, pages);
            let txs = network.get_tx_page(start_height, &address, page).await?;
            for tx in txs.into_iter().rev() {
                self.track_transaction(tx, false).await?;
            }
        }
        Ok(())
    }

    /// Feed every block holding shield transactions to the prover, then
    /// check its commitment tree against the network. A mismatch wipes the
    /// ledger and the prover state and syncs both again.
    pub async fn sync_shield(&mut self) -> Result<()> {
        if self.shield.is_none() || self.is_synced {
            return Ok(());
        }
        self.download_shield_blocks().await?;
        self.save_shield_on_disk().await?;

        let Some(shield) = self.shield.clone() else {
            return Ok(());
        };
        let last_synced = shield.get_last_synced_block().await?;
        let block = self.context.network.get_block(last_synced).await?;
        if let Some(root) = block.final_sapling_root {
            if !self.check_sapling_root(&root).await? {
                self.transparent_sync().await?;
                self.download_shield_blocks().await?;
                self.save_shield_on_disk().await?;
            }
        }
        Ok(())
    }

    /// Download the pending shield blocks concurrently and apply them in
    /// strictly increasing height
    async fn download_shield_blocks(&mut self) -> Result<()> {
        let Some(shield) = self.shield.clone() else {
            return Ok(());
        };
        let network = Arc::clone(&self.context.network);
        let last_synced = shield.get_last_synced_block().await?;
        let mut heights: Vec<u32> = network
            .get_shield_block_list()
            .await?
            .into_iter()
            .filter(|height| *height > last_synced)
            .collect();
        heights.sort_unstable();
        heights.dedup();
        tracing::info!("Shield sync: {} blocks after {}", heights.len(), last_synced);

        let network = &network;
        let mut downloads = stream::iter(heights.clone())
            .map(|height| async move { (height, network.get_block(height).await) })
            .buffer_unordered(self.context.config.shield_batch_size.max(1));

        let mut pending: BTreeMap<u32, RawBlock> = BTreeMap::new();
        let mut next = 0usize;
        while let Some((height, result)) = downloads.next().await {
            match result {
                Ok(block) => {
                    pending.insert(height, block);
                }
                Err(e) => {
                    tracing::warn!("Shield sync stopped at block {}: {}", height, e);
                    break;
                }
            }
            while let Some(block) = heights.get(next).and_then(|h| pending.remove(h)) {
                self.handle_block(&block, false).await?;
                next += 1;
            }
        }
        Ok(())
    }

    /// Compare the prover's root with `network_root`. On mismatch the ledger
    /// and the prover are reset and `false` is returned.
    async fn check_sapling_root(&mut self, network_root: &str) -> Result<bool> {
        let Some(shield) = self.shield.clone() else {
            return Ok(true);
        };
        let root = shield.get_sapling_root().await?;
        if root == network_root {
            return Ok(true);
        }
        tracing::warn!("Sapling root mismatch: ours {} network {}", root, network_root);
        self.mempool = Mempool::new();
        self.historical.clear();
        self.scanner.reset()?;
        self.reset_shield().await?;
        self.is_synced = false;
        Ok(false)
    }

    /// Process blocks after the last processed one up to `block_count`,
    /// stopping at the first failure
    pub async fn get_latest_blocks(&mut self, block_count: u32) -> Result<()> {
        let network = Arc::clone(&self.context.network);
        let mut sapling_root = None;
        for height in self.last_processed_block + 1..=block_count {
            let block = match network.get_block(height).await {
                Ok(block) => block,
                Err(e) => {
                    tracing::warn!("Could not fetch block {}: {}", height, e);
                    break;
                }
            };
            if let Err(e) = self.handle_block(&block, true).await {
                tracing::warn!("Could not process block {}: {}", height, e);
                break;
            }
            self.last_processed_block = height;
            sapling_root = block.final_sapling_root;
        }

        if self.has_shield() {
            if let Some(root) = sapling_root {
                if !self.check_sapling_root(&root).await? {
                    self.transparent_sync().await?;
                    self.download_shield_blocks().await?;
                    self.is_synced = true;
                }
            }
            self.save_shield_on_disk().await?;
        }
        Ok(())
    }

    /// A new chain tip was announced
    pub async fn handle_new_block(&mut self, block_count: u32) -> Result<()> {
        self.block_count = self.block_count.max(block_count);
        if self.is_synced {
            self.get_latest_blocks(block_count).await?;
            self.mempool.save_to_disk(self.context.store.as_ref()).await?;
        }
        // maturity depends on the height
        self.mempool.invalidate_balance_cache();
        Ok(())
    }

    /// Track the transactions of `block` that concern the wallet. With
    /// `allow_own` unset only transactions the prover claims are kept.
    pub async fn handle_block(&mut self, block: &RawBlock, allow_own: bool) -> Result<()> {
        let mut shield_txs = Vec::new();
        if let Some(shield) = &self.shield {
            if block.height > shield.get_last_synced_block().await? {
                shield_txs = shield.handle_block(block).await?;
            }
        }
        for raw in &block.txs {
            let mut tx = Transaction::from_hex(&raw.hex)?;
            tx.block_height = block.height as i64;
            tx.block_time = block.time;
            let owned = allow_own && self.own_transaction(&tx);
            if owned || shield_txs.contains(&raw.hex) {
                self.track_transaction(tx, false).await?;
            }
        }
        Ok(())
    }

    /// Whether any input spends our coins or any output pays us
    fn own_transaction(&mut self, tx: &Transaction) -> bool {
        let pays_us = tx
            .vout()
            .iter()
            .any(|output| self.scanner.script_state(&output.script).contains(OutpointState::OURS));
        pays_us
            || tx.vin().iter().any(|input| {
                self.mempool
                    .get_outpoint_status(&input.outpoint)
                    .contains(OutpointState::OURS)
            })
    }

    // ========================================================================
    // TRANSACTIONS
    // ========================================================================

    /// Track a transaction and persist it
    pub async fn add_transaction(&mut self, tx: Transaction) -> Result<()> {
        self.track_transaction(tx, true).await
    }

    async fn track_transaction(&mut self, tx: Transaction, persist: bool) -> Result<()> {
        let txid = tx.txid();
        let shield_amounts = self.extract_shield_amounts(&tx).await?;
        if tx.has_shield_data() {
            if let Some(shield) = &self.shield {
                shield.finalize_transaction(&txid.to_string()).await?;
            }
        }
        if persist {
            self.context.store.store_tx(StoredTx::from_transaction(&tx)).await?;
        }

        self.mempool.add_transaction(tx, &mut self.scanner)?;
        if self.is_synced {
            self.scanner.update_current_address();
        }
        if let Some(tracked) = self.mempool.get_transaction(&txid) {
            let entry = HistoricalTx::from_transaction(tracked, &self.mempool, &mut self.scanner, shield_amounts);
            self.historical.insert(entry);
        }
        Ok(())
    }

    async fn extract_shield_amounts(&self, tx: &Transaction) -> Result<ShieldAmounts> {
        let mut amounts = ShieldAmounts::default();
        let Some(shield) = &self.shield else {
            return Ok(amounts);
        };
        if !tx.has_shield_data() {
            return Ok(amounts);
        }
        for spend in tx.shield_spend() {
            if let Some(note) = shield.get_note_from_nullifier(&hex::encode(spend.nullifier)).await? {
                amounts.debit += note.value;
            }
        }
        for note in shield.decrypt_transaction_outputs(&tx.to_hex()).await? {
            amounts.credit += note.value;
            amounts.receivers.push(note.recipient);
        }
        Ok(amounts)
    }

    /// Build an unsigned transaction paying `value` to `address`
    pub async fn create_transaction(
        &mut self,
        address: &str,
        value: u64,
        options: CreateTxOptions,
    ) -> Result<Transaction> {
        let available = if options.use_delegated_inputs {
            self.cold_balance()
        } else if options.use_shield_inputs {
            self.shield_balance().await?
        } else {
            self.balance()
        };
        if available < value {
            return Err(WalletError::InsufficientBalance {
                requested: value,
                available,
            });
        }
        if options.delegate_change && options.change_delegation_address.is_none() {
            return Err(WalletError::StateInvariant(
                "delegate_change is set without a change delegation address".to_string(),
            ));
        }

        let params = self.context.config.chain.clone();
        let is_shield_tx = options.use_shield_inputs || address::is_shield_address(address, &params);
        let mut builder = TransactionBuilder::new(params.clone());

        if options.is_delegation {
            let owner = match &options.return_address {
                Some(owner) => owner.clone(),
                None => self.get_new_change_address()?,
            };
            let target = params.stake_split_target;
            if value < COIN {
                return Err(WalletError::StateInvariant(format!(
                    "delegation of {} is below the minimum of {}",
                    value, COIN
                )));
            } else if value < target {
                builder.add_cold_stake_output(&owner, address, value, false)?;
            } else {
                for i in 0..value / target {
                    let amount = if i == 0 { target + value % target } else { target };
                    builder.add_cold_stake_output(&owner, address, amount, false)?;
                }
            }
        } else if options.is_proposal {
            let hash: [u8; 32] = hex::decode(address)?
                .try_into()
                .map_err(|_| WalletError::Parse(format!("{} is not a proposal hash", address)))?;
            builder.add_proposal_output(&hash, value)?;
        } else {
            builder.add_destination(address, value)?;
        }

        if !options.use_shield_inputs {
            let kind = if options.use_delegated_inputs {
                OutpointState::P2CS
            } else {
                OutpointState::P2PKH
            };
            let utxos = self.mempool.get_utxos(
                UtxoQuery::new(kind | OutpointState::OURS, self.block_count as i64).with_target(value),
            );
            builder.add_utxos(&utxos)?;

            // the prover handles change of shield transactions
            if !is_shield_tx {
                let fee = builder.get_fee()?;
                let change = builder.value() - fee as i64;
                if change < 0 {
                    if !options.subtract_fee_from_amount {
                        return Err(WalletError::InsufficientBalance {
                            requested: builder.value_out() + fee,
                            available: builder.value_in(),
                        });
                    }
                    builder.equally_subtract_amount(change.unsigned_abs())?;
                } else if change > 0 {
                    let change = change as u64;
                    let change_address = match &options.change_address {
                        Some(address) => address.clone(),
                        None => self.get_new_change_address()?,
                    };
                    match (&options.change_delegation_address, options.delegate_change) {
                        (Some(staker), true) if change >= COIN => {
                            builder.add_cold_stake_output(&change_address, staker, change, true)?;
                        }
                        _ => {
                            builder.add_change_output(&change_address, change)?;
                        }
                    }
                }
            }
        }

        builder
            .build()
            .ok_or_else(|| WalletError::StateInvariant("transaction builder already consumed".to_string()))
    }

    /// Sign every input of `tx`, or hand shield transactions to the prover
    pub async fn sign(&mut self, mut tx: Transaction) -> Result<Transaction> {
        if self.is_view_only() {
            return Err(WalletError::StateInvariant(
                "cannot sign with a view only wallet".to_string(),
            ));
        }
        if self.master_key().is_hardware_wallet() {
            return Err(WalletError::StateInvariant(
                "hardware wallets sign on the device".to_string(),
            ));
        }
        if tx.vin().is_empty() || !tx.shield_recipients().is_empty() {
            return self.sign_shield(&tx).await;
        }

        for index in 0..tx.vin().len() {
            let prevout_script = tx.vin()[index].script_sig.clone();
            let is_cold_stake = matches!(script::inspect(&prevout_script), ScriptKind::ColdStake { .. });
            let path = self
                .scanner
                .get_path(&prevout_script)
                .ok_or_else(|| WalletError::Key(format!("no key for input {}", index)))?;
            let secret = self.master_key().private_key(&path)?;
            tx.sign_input(index, &secret, is_cold_stake)?;
        }
        Ok(tx)
    }

    async fn sign_shield(&mut self, tx: &Transaction) -> Result<Transaction> {
        let Some(shield) = self.shield.clone() else {
            return Err(WalletError::Shield("shield is not enabled for this wallet".to_string()));
        };
        if !tx.has_sapling_version() {
            return Err(WalletError::Shield(format!(
                "transaction version {} cannot carry shield data",
                tx.version()
            )));
        }

        let (address, amount) = match (tx.shield_recipients().first(), tx.vout().first()) {
            (Some(recipient), _) => (recipient.address.clone(), recipient.value),
            (None, Some(output)) => {
                let (_, addresses) = self.scanner.addresses_from_script(&output.script);
                let address = addresses
                    .into_iter()
                    .next()
                    .ok_or_else(|| WalletError::Shield("output has no address".to_string()))?;
                (address, output.value)
            }
            (None, None) => return Err(WalletError::Shield("transaction has no destination".to_string())),
        };

        let mut inputs = Vec::with_capacity(tx.vin().len());
        for input in tx.vin() {
            let utxo = self
                .mempool
                .outpoint_to_utxo(&input.outpoint)
                .ok_or_else(|| WalletError::StateInvariant(format!("unknown input {}", input.outpoint)))?;
            let path = self
                .scanner
                .get_path(&utxo.script)
                .ok_or_else(|| WalletError::Key(format!("no key for {}", utxo.outpoint)))?;
            let secret = self.master_key().private_key(&path)?;
            inputs.push(ShieldInput { utxo, secret });
        }

        let request = ShieldTxRequest {
            address,
            amount,
            block_height: self.block_count + 1,
            use_shield_inputs: tx.vin().is_empty(),
            utxos: inputs,
            transparent_change_address: self.get_new_change_address()?,
        };
        let hex = shield.create_transaction(request).await?;
        Transaction::from_hex(&hex)
    }

    /// Send a signed transaction and track it. A rejected transaction is
    /// discarded.
    pub async fn broadcast(&mut self, tx: Transaction) -> Result<Txid> {
        match self.context.network.send_transaction(&tx.to_hex()).await {
            Ok(txid) => {
                self.add_transaction(tx).await?;
                Ok(txid)
            }
            Err(e) => {
                self.discard_transaction(&tx).await?;
                Err(e)
            }
        }
    }

    /// Release whatever the prover reserved for `tx`
    pub async fn discard_transaction(&self, tx: &Transaction) -> Result<()> {
        if let Some(shield) = &self.shield {
            shield.discard_transaction(&tx.txid().to_string()).await?;
        }
        Ok(())
    }

    // ========================================================================
    // BALANCES AND COINS
    // ========================================================================

    pub fn balance(&self) -> u64 {
        self.mempool.balance(self.block_count as i64)
    }

    pub fn cold_balance(&self) -> u64 {
        self.mempool.cold_balance(self.block_count as i64)
    }

    pub fn immature_balance(&self) -> u64 {
        self.mempool.immature_balance(self.block_count as i64)
    }

    pub async fn shield_balance(&self) -> Result<u64> {
        match &self.shield {
            Some(shield) => shield.get_balance().await,
            None => Ok(0),
        }
    }

    pub async fn pending_shield_balance(&self) -> Result<u64> {
        match &self.shield {
            Some(shield) => shield.get_pending_balance().await,
            None => Ok(0),
        }
    }

    pub fn lock_coin(&mut self, outpoint: Outpoint) {
        self.mempool.lock_coin(outpoint);
    }

    pub fn unlock_coin(&mut self, outpoint: Outpoint) {
        self.mempool.unlock_coin(outpoint);
    }

    pub fn is_coin_locked(&self, outpoint: &Outpoint) -> bool {
        self.mempool.is_coin_locked(outpoint)
    }

    pub fn outpoint_to_utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        self.mempool.outpoint_to_utxo(outpoint)
    }

    /// Standard coins of exactly the masternode collateral value
    pub fn get_masternode_utxos(&self) -> Vec<Utxo> {
        let collateral = self.context.config.chain.masternode_collateral;
        self.mempool
            .get_utxos(UtxoQuery::new(
                OutpointState::P2PKH | OutpointState::OURS,
                self.block_count as i64,
            ))
            .into_iter()
            .filter(|utxo| utxo.value == collateral)
            .collect()
    }

    pub fn historical_txs(&self) -> &[HistoricalTx] {
        self.historical.get()
    }

    pub fn mempool(&self) -> &Mempool {
        &self.mempool
    }

    // ========================================================================
    // PERSISTENCE
    // ========================================================================

    /// Replay stored transactions when they belong to this key; otherwise
    /// wipe them and claim the store
    async fn load_from_disk(&mut self) -> Result<()> {
        let store = Arc::clone(&self.context.store);
        let public_key = self.get_key_to_export()?;
        let account = store.get_account().await?;
        if account.as_ref().map(|a| a.public_key.as_str()) != Some(public_key.as_str()) {
            tracing::info!("Stored transactions belong to another key, wiping them");
            store.remove_all_txs().await?;
            if account.is_none() {
                store
                    .put_account(Account {
                        public_key,
                        ..Default::default()
                    })
                    .await?;
            }
            return Ok(());
        }

        self.mempool.load_from_disk(store.as_ref(), &mut self.scanner).await?;
        let txids: Vec<Txid> = self.mempool.get_transactions().iter().map(|tx| tx.txid()).collect();
        for txid in txids {
            let Some(tx) = self.mempool.get_transaction(&txid) else {
                continue;
            };
            let shield_amounts = self.extract_shield_amounts(tx).await?;
            if let Some(tx) = self.mempool.get_transaction(&txid) {
                let entry = HistoricalTx::from_transaction(tx, &self.mempool, &mut self.scanner, shield_amounts);
                self.historical.insert(entry);
            }
        }
        Ok(())
    }

    async fn load_shield_from_disk(&mut self) -> Result<()> {
        let Some(shield) = self.shield.clone() else {
            return Ok(());
        };
        let Some(account) = self.context.store.get_account().await? else {
            return Ok(());
        };
        let Some(data) = account.shield_data.filter(|data| !data.is_empty()) else {
            return Ok(());
        };
        if !shield.load(&data).await? {
            tracing::info!("Stored shield data is not compatible with the prover, rescanning");
            self.reset_shield().await?;
        }
        Ok(())
    }

    async fn save_shield_on_disk(&self) -> Result<()> {
        let Some(shield) = &self.shield else {
            return Ok(());
        };
        let store = &self.context.store;
        let Some(mut account) = store.get_account().await? else {
            return Ok(());
        };
        account.shield_data = Some(shield.save().await?);
        store.put_account(account).await
    }

    async fn reset_shield(&self) -> Result<()> {
        if let Some(shield) = &self.shield {
            shield.reload_from_checkpoint(SHIELD_CHECKPOINT_HEIGHT).await?;
            self.save_shield_on_disk().await?;
        }
        Ok(())
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Forget everything learned from the chain
    pub fn reset(&mut self) -> Result<()> {
        self.mempool = Mempool::new();
        self.historical.clear();
        self.scanner.reset()?;
        self.block_count = 0;
        self.last_processed_block = 0;
        self.is_synced = false;
        self.context.network.reset();
        Ok(())
    }

    /// Reset and release the prover
    pub fn dispose(&mut self) -> Result<()> {
        self.reset()?;
        self.shield = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::LegacyMasterKey;
    use crate::store::MemoryStore;

    fn wallet() -> Wallet {
        let config = WalletConfig::for_testing();
        let context = WalletContext {
            network: Arc::new(NetworkManager::new(&config, Vec::new())),
            store: Arc::new(MemoryStore::new()),
            config,
        };
        let key = LegacyMasterKey::from_bytes(&[0x42; 32], &context.config.chain).unwrap();
        Wallet::new(context, Arc::new(key), None).unwrap()
    }

    #[test]
    fn test_create_tx_options_default() {
        let options = CreateTxOptions::default();
        assert!(options.subtract_fee_from_amount);
        assert!(!options.is_delegation);
    }

    #[tokio::test]
    async fn test_create_transaction_without_funds() {
        let mut wallet = wallet();
        let address = wallet.get_current_address().unwrap();
        let err = wallet
            .create_transaction(&address, 1000, CreateTxOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            WalletError::InsufficientBalance {
                requested: 1000,
                available: 0
            }
        ));
    }

    #[tokio::test]
    async fn test_sync_without_backends_fails() {
        let mut wallet = wallet();
        assert!(matches!(
            wallet.sync().await,
            Err(WalletError::NetworkExhausted { .. })
        ));
        assert!(!wallet.is_synced());
    }

    #[tokio::test]
    async fn test_sign_view_only_fails() {
        let config = WalletConfig::for_testing();
        let context = WalletContext {
            network: Arc::new(NetworkManager::new(&config, Vec::new())),
            store: Arc::new(MemoryStore::new()),
            config,
        };
        let key = LegacyMasterKey::from_address("xxt8326teaczifTFhqH49P9b29m7a845EH", &context.config.chain).unwrap();
        let mut wallet = Wallet::new(context, Arc::new(key), None).unwrap();
        assert!(wallet.is_view_only());
        assert!(matches!(
            wallet.sign(Transaction::new(1, Vec::new(), Vec::new())).await,
            Err(WalletError::StateInvariant(_))
        ));
    }
}
