//! Wallet ledger: known transactions, per-outpoint state and balances
//!
//! Balances are a pure function of the stored transactions, the outpoint
//! states and the height supplied by the caller. Maturity is never stored,
//! it is derived from the owning transaction at query time.

use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::{BitAnd, BitOr, BitOrAssign, Not};

use crate::constants::*;
use crate::error::Result;
use crate::store::{StoredTx, WalletStore};
use crate::transaction::Transaction;
use crate::types::*;

/// Bit flags tracked per outpoint
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct OutpointState(u8);

impl OutpointState {
    pub const NONE: Self = Self(0);
    /// Pays to one of our addresses
    pub const OURS: Self = Self(1 << 0);
    pub const P2PKH: Self = Self(1 << 1);
    pub const P2CS: Self = Self(1 << 2);
    pub const SPENT: Self = Self(1 << 3);
    /// Only meaningful in filters; never stored
    pub const IMMATURE: Self = Self(1 << 4);
    /// Excluded from coin selection by the user
    pub const LOCKED: Self = Self(1 << 5);

    /// Bits a balance filter requires to be present
    const REQUIRED_MASK: Self = Self(Self::OURS.0 | Self::P2PKH.0 | Self::P2CS.0);

    pub const fn bits(self) -> u8 {
        self.0
    }

    pub const fn from_bits(bits: u8) -> Self {
        Self(bits)
    }

    /// Every bit of `other` is set
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

impl BitOr for OutpointState {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for OutpointState {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for OutpointState {
    type Output = Self;
    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

impl Not for OutpointState {
    type Output = Self;
    fn not(self) -> Self {
        Self(!self.0)
    }
}

impl fmt::Debug for OutpointState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const NAMES: [(OutpointState, &str); 6] = [
            (OutpointState::OURS, "OURS"),
            (OutpointState::P2PKH, "P2PKH"),
            (OutpointState::P2CS, "P2CS"),
            (OutpointState::SPENT, "SPENT"),
            (OutpointState::IMMATURE, "IMMATURE"),
            (OutpointState::LOCKED, "LOCKED"),
        ];
        let names: Vec<&str> = NAMES
            .iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| *name)
            .collect();
        write!(f, "OutpointState({})", names.join("|"))
    }
}

/// Decides which outputs belong to the wallet. Implemented by the address
/// scanner, which also advances its watch window on every call.
pub trait OutputClassifier {
    fn observe_output(&mut self, output: &TxOut) -> Result<OutpointState>;
}

/// Parameters of [`Mempool::get_utxos`]
#[derive(Debug, Clone, Copy)]
pub struct UtxoQuery {
    pub filter: OutpointState,
    /// Stop once the selection covers this value plus the safety margin
    pub target: Option<u64>,
    pub only_confirmed: bool,
    pub include_locked: bool,
    /// Chain height used for maturity
    pub height: i64,
}

impl UtxoQuery {
    pub fn new(filter: OutpointState, height: i64) -> Self {
        Self {
            filter,
            target: None,
            only_confirmed: false,
            include_locked: false,
            height,
        }
    }

    pub fn with_target(mut self, target: u64) -> Self {
        self.target = Some(target);
        self
    }

    pub fn only_confirmed(mut self) -> Self {
        self.only_confirmed = true;
        self
    }

    pub fn include_locked(mut self) -> Self {
        self.include_locked = true;
        self
    }
}

/// The wallet's transaction ledger
#[derive(Default)]
pub struct Mempool {
    txmap: HashMap<Txid, Transaction>,
    outpoint_status: BTreeMap<Outpoint, OutpointState>,
    /// Confirmed transactions by block height
    height_index: BTreeMap<i64, Vec<Txid>>,
    /// (filter bits, height) -> balance
    balance_cache: Mutex<HashMap<(u8, i64), u64>>,
    /// Highest height already written by `save_to_disk`
    saved_height: Option<i64>,
}

impl Mempool {
    pub fn new() -> Self {
        Self::default()
    }

    // ============================================================================
    // TRANSACTIONS
    // ============================================================================

    /// Track a transaction. Confirmed transactions are final: adding one that
    /// is already known and confirmed does nothing.
    pub fn add_transaction(
        &mut self,
        tx: Transaction,
        classifier: &mut dyn OutputClassifier,
    ) -> Result<()> {
        let txid = tx.txid();
        if let Some(existing) = self.txmap.get(&txid) {
            if existing.is_confirmed() {
                return Ok(());
            }
        }

        let states = tx
            .vout()
            .iter()
            .map(|output| classifier.observe_output(output))
            .collect::<Result<Vec<_>>>()?;

        if !tx.is_coinbase() {
            for input in tx.vin() {
                if !self.is_spent(&input.outpoint) {
                    let status = self.outpoint_status.entry(input.outpoint).or_default();
                    status.insert(OutpointState::SPENT);
                    status.remove(OutpointState::LOCKED);
                }
            }
        }

        for (n, state) in states.into_iter().enumerate() {
            if state.contains(OutpointState::OURS) {
                *self
                    .outpoint_status
                    .entry(Outpoint::new(txid, n as u32))
                    .or_default() |= state;
            }
        }

        if tx.is_confirmed() {
            let entry = self.height_index.entry(tx.block_height).or_default();
            if !entry.contains(&txid) {
                entry.push(txid);
            }
        }
        self.txmap.insert(txid, tx);
        self.invalidate_balance_cache();
        Ok(())
    }

    pub fn get_transaction(&self, txid: &Txid) -> Option<&Transaction> {
        self.txmap.get(txid)
    }

    /// All transactions, most recent first, unconfirmed ones leading
    pub fn get_transactions(&self) -> Vec<&Transaction> {
        let mut txs: Vec<&Transaction> = self.txmap.values().collect();
        txs.sort_by_key(|tx| {
            let height = if tx.is_confirmed() { tx.block_height } else { i64::MAX };
            std::cmp::Reverse((height, tx.txid()))
        });
        txs
    }

    pub fn len(&self) -> usize {
        self.txmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.txmap.is_empty()
    }

    /// Highest confirmed height known
    pub fn last_height(&self) -> Option<i64> {
        self.height_index.keys().next_back().copied()
    }

    pub fn is_mature(&self, tx: &Transaction, height: i64) -> bool {
        if !tx.is_coinbase() && !tx.is_coinstake() {
            return true;
        }
        tx.is_confirmed() && height - tx.block_height > COINBASE_MATURITY
    }

    // ============================================================================
    // OUTPOINT STATE
    // ============================================================================

    pub fn get_outpoint_status(&self, outpoint: &Outpoint) -> OutpointState {
        self.outpoint_status.get(outpoint).copied().unwrap_or_default()
    }

    /// Overwrite the state of an outpoint
    pub fn set_outpoint_status(&mut self, outpoint: Outpoint, status: OutpointState) {
        self.outpoint_status.insert(outpoint, status);
        self.invalidate_balance_cache();
    }

    pub fn add_outpoint_status(&mut self, outpoint: Outpoint, status: OutpointState) {
        *self.outpoint_status.entry(outpoint).or_default() |= status;
        self.invalidate_balance_cache();
    }

    pub fn remove_outpoint_status(&mut self, outpoint: Outpoint, status: OutpointState) {
        self.outpoint_status.entry(outpoint).or_default().remove(status);
        self.invalidate_balance_cache();
    }

    pub fn set_spent(&mut self, outpoint: Outpoint) {
        self.add_outpoint_status(outpoint, OutpointState::SPENT);
    }

    pub fn is_spent(&self, outpoint: &Outpoint) -> bool {
        self.get_outpoint_status(outpoint).contains(OutpointState::SPENT)
    }

    /// Lock a coin against selection. Spent coins stay as they are.
    pub fn lock_coin(&mut self, outpoint: Outpoint) {
        if !self.is_spent(&outpoint) {
            self.add_outpoint_status(outpoint, OutpointState::LOCKED);
        }
    }

    pub fn unlock_coin(&mut self, outpoint: Outpoint) {
        if self.is_coin_locked(&outpoint) {
            self.remove_outpoint_status(outpoint, OutpointState::LOCKED);
        }
    }

    pub fn is_coin_locked(&self, outpoint: &Outpoint) -> bool {
        self.get_outpoint_status(outpoint).contains(OutpointState::LOCKED)
    }

    pub fn outpoint_to_utxo(&self, outpoint: &Outpoint) -> Option<Utxo> {
        let output = self.txmap.get(&outpoint.txid)?.vout().get(outpoint.n as usize)?;
        Some(Utxo {
            outpoint: *outpoint,
            script: output.script.clone(),
            value: output.value,
        })
    }

    // ============================================================================
    // OWNERSHIP
    // ============================================================================

    /// Inputs of `tx` spending our outputs
    pub fn owned_vin(&self, tx: &Transaction) -> Vec<Utxo> {
        tx.vin()
            .iter()
            .filter(|input| {
                self.get_outpoint_status(&input.outpoint)
                    .contains(OutpointState::OURS)
            })
            .filter_map(|input| self.outpoint_to_utxo(&input.outpoint))
            .collect()
    }

    /// Outputs of `tx` paying us
    pub fn owned_vout<'a>(&self, tx: &'a Transaction) -> Vec<&'a TxOut> {
        let txid = tx.txid();
        tx.vout()
            .iter()
            .enumerate()
            .filter(|(n, _)| {
                self.get_outpoint_status(&Outpoint::new(txid, *n as u32))
                    .contains(OutpointState::OURS)
            })
            .map(|(_, output)| output)
            .collect()
    }

    pub fn own_transaction(&self, tx: &Transaction) -> bool {
        !self.owned_vout(tx).is_empty() || !self.owned_vin(tx).is_empty()
    }

    /// Value we spent in `tx`
    pub fn get_debit(&self, tx: &Transaction) -> u64 {
        self.owned_vin(tx).iter().map(|utxo| utxo.value).sum()
    }

    /// Value `tx` paid us
    pub fn get_credit(&self, tx: &Transaction) -> u64 {
        self.owned_vout(tx).iter().map(|output| output.value).sum()
    }

    /// Value of our outputs in `tx` whose state also contains `filter`
    pub fn get_filtered_credit(&self, tx: &Transaction, filter: OutpointState) -> u64 {
        let txid = tx.txid();
        tx.vout()
            .iter()
            .enumerate()
            .filter(|(n, _)| {
                self.get_outpoint_status(&Outpoint::new(txid, *n as u32))
                    .contains(filter | OutpointState::OURS)
            })
            .map(|(_, output)| output.value)
            .sum()
    }

    // ============================================================================
    // BALANCES
    // ============================================================================

    /// Whether an outpoint passes `filter` at `height`: not spent, carrying
    /// every ownership/script bit of the filter, mature unless IMMATURE is
    /// requested, unlocked unless LOCKED is requested.
    fn selectable(
        &self,
        status: OutpointState,
        tx: &Transaction,
        filter: OutpointState,
        height: i64,
        include_locked: bool,
    ) -> bool {
        if status.contains(OutpointState::SPENT) {
            return false;
        }
        if !status.contains(filter & OutpointState::REQUIRED_MASK) {
            return false;
        }
        let locked_ok = include_locked || filter.contains(OutpointState::LOCKED);
        if status.contains(OutpointState::LOCKED) && !locked_ok {
            return false;
        }
        filter.contains(OutpointState::IMMATURE) || self.is_mature(tx, height)
    }

    fn unspent_outputs(
        &self,
        filter: OutpointState,
        height: i64,
        include_locked: bool,
    ) -> impl Iterator<Item = (&Outpoint, &Transaction, &TxOut)> + '_ {
        self.outpoint_status.iter().filter_map(move |(outpoint, status)| {
            let tx = self.txmap.get(&outpoint.txid)?;
            let output = tx.vout().get(outpoint.n as usize)?;
            self.selectable(*status, tx, filter, height, include_locked)
                .then_some((outpoint, tx, output))
        })
    }

    pub fn get_balance(&self, filter: OutpointState, height: i64) -> u64 {
        let key = (filter.bits(), height);
        if let Some(balance) = self.balance_cache.lock().get(&key) {
            return *balance;
        }
        let balance = self
            .unspent_outputs(filter, height, false)
            .map(|(_, _, output)| output.value)
            .sum();
        self.balance_cache.lock().insert(key, balance);
        balance
    }

    /// Spendable standard balance
    pub fn balance(&self, height: i64) -> u64 {
        self.get_balance(OutpointState::OURS | OutpointState::P2PKH, height)
    }

    /// Delegated balance
    pub fn cold_balance(&self, height: i64) -> u64 {
        self.get_balance(OutpointState::OURS | OutpointState::P2CS, height)
    }

    /// Standard balance still waiting for coinbase/coinstake maturity
    pub fn immature_balance(&self, height: i64) -> u64 {
        let with_immature = self.get_balance(
            OutpointState::OURS | OutpointState::P2PKH | OutpointState::IMMATURE,
            height,
        );
        with_immature.saturating_sub(self.balance(height))
    }

    pub fn invalidate_balance_cache(&self) {
        self.balance_cache.lock().clear();
    }

    /// First-fit selection in outpoint order, stopping once the selection
    /// reaches `target * 11 / 10`
    pub fn get_utxos(&self, query: UtxoQuery) -> Vec<Utxo> {
        let limit = query
            .target
            .map(|target| target.saturating_mul(UTXO_TARGET_MARGIN_NUM) / UTXO_TARGET_MARGIN_DEN);

        let mut utxos = Vec::new();
        let mut value = 0u64;
        for (outpoint, tx, output) in
            self.unspent_outputs(query.filter, query.height, query.include_locked)
        {
            if query.only_confirmed && !tx.is_confirmed() {
                continue;
            }
            utxos.push(Utxo {
                outpoint: *outpoint,
                script: output.script.clone(),
                value: output.value,
            });
            value += output.value;
            if limit.is_some_and(|limit| value >= limit) {
                break;
            }
        }
        utxos
    }

    // ============================================================================
    // PERSISTENCE
    // ============================================================================

    /// Write confirmed transactions newer than the last save
    pub async fn save_to_disk(&mut self, store: &dyn WalletStore) -> Result<()> {
        let mut written = 0usize;
        for (height, txids) in self.height_index.iter().rev() {
            if self.saved_height.is_some_and(|saved| *height <= saved) {
                break;
            }
            for txid in txids {
                if let Some(tx) = self.txmap.get(txid) {
                    store.store_tx(StoredTx::from_transaction(tx)).await?;
                    written += 1;
                }
            }
        }
        if let Some(last) = self.last_height() {
            self.saved_height = Some(last);
        }
        tracing::debug!("Saved {} transactions, high-water mark {:?}", written, self.saved_height);
        Ok(())
    }

    /// Replay persisted transactions in ascending height order
    pub async fn load_from_disk(
        &mut self,
        store: &dyn WalletStore,
        classifier: &mut dyn OutputClassifier,
    ) -> Result<()> {
        let mut stored = store.get_txs().await?;
        stored.sort_by_key(|tx| tx.block_height);
        for stored_tx in &stored {
            self.add_transaction(stored_tx.to_transaction()?, classifier)?;
        }
        self.saved_height = self.last_height();
        tracing::debug!("Loaded {} transactions from disk", stored.len());
        Ok(())
    }
}
