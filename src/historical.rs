//! Wallet activity entries
//!
//! Each transaction in the ledger maps to one [`HistoricalTx`] describing
//! what it did to the wallet. The list is kept newest first with
//! unconfirmed entries on top.

use serde::{Deserialize, Serialize};

use crate::address::Destination;
use crate::mempool::{Mempool, OutpointState};
use crate::scanner::AddressScanner;
use crate::transaction::Transaction;
use crate::types::{Outpoint, Txid};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HistoricalTxType {
    Unknown = 0,
    Stake = 1,
    Delegation = 2,
    Undelegation = 3,
    Received = 4,
    Sent = 5,
    ProposalFee = 6,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoricalTx {
    pub tx_type: HistoricalTxType,
    pub txid: Txid,
    /// Addresses paid by the outputs
    pub receivers: Vec<String>,
    /// Decrypted recipients of our shield outputs
    pub shield_receivers: Vec<String>,
    pub time: i64,
    pub block_height: i64,
    /// Net transparent change of the balance, in satoshis
    pub amount: i64,
    /// Net shield change of the balance, in satoshis
    pub shield_amount: i64,
    pub is_to_self: bool,
}

/// Shield side of a transaction as decrypted by the prover
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShieldAmounts {
    pub credit: u64,
    pub debit: u64,
    pub receivers: Vec<String>,
}

impl HistoricalTx {
    /// Describe `tx`, which must already be in `mempool`
    pub fn from_transaction(
        tx: &Transaction,
        mempool: &Mempool,
        scanner: &mut AddressScanner,
        shield: ShieldAmounts,
    ) -> Self {
        let txid = tx.txid();
        let owned_vin = mempool.owned_vin(tx).len();
        let owned_vout = mempool.owned_vout(tx).len();
        let own_all_vin = owned_vin == tx.vin().len();
        let own_all_vout = owned_vout == tx.vout().len();
        let own_all_shield = shield.debit as i64 - shield.credit as i64 == tx.value_balance();

        let mut amount = mempool.get_credit(tx) as i64 - mempool.get_debit(tx) as i64;
        let shield_amount = shield.credit as i64 - shield.debit as i64;
        let mut receivers: Vec<String> = tx
            .vout()
            .iter()
            .flat_map(|output| scanner.addresses_from_script(&output.script).1)
            .collect();

        let spends_delegation = tx
            .vin()
            .iter()
            .any(|input| mempool.get_outpoint_status(&input.outpoint).contains(OutpointState::P2CS));
        let creates_delegation = (0..tx.vout().len()).any(|n| {
            mempool
                .get_outpoint_status(&Outpoint::new(txid, n as u32))
                .contains(OutpointState::P2CS)
        });

        let tx_type = if tx.is_coinstake() {
            HistoricalTxType::Stake
        } else if tx.is_proposal_fee() {
            HistoricalTxType::ProposalFee
        } else if spends_delegation {
            amount = mempool.get_filtered_credit(tx, OutpointState::P2PKH) as i64;
            HistoricalTxType::Undelegation
        } else if creates_delegation {
            let params = scanner.params();
            receivers.retain(|address| matches!(Destination::parse(address, params), Ok(Destination::Staking(_))));
            amount = mempool.get_filtered_credit(tx, OutpointState::P2CS) as i64;
            HistoricalTxType::Delegation
        } else if amount + shield_amount > 0 {
            HistoricalTxType::Received
        } else if amount + shield_amount < 0 {
            HistoricalTxType::Sent
        } else {
            HistoricalTxType::Unknown
        };

        Self {
            tx_type,
            txid,
            receivers,
            shield_receivers: shield.receivers,
            time: tx.block_time,
            block_height: tx.block_height,
            amount,
            shield_amount,
            is_to_self: own_all_vin && own_all_vout && own_all_shield,
        }
    }
}

/// Activity list, unconfirmed first then by descending height
#[derive(Debug, Clone, Default)]
pub struct HistoricalTxList {
    entries: Vec<HistoricalTx>,
}

fn sort_key(entry: &HistoricalTx) -> i64 {
    if entry.block_height < 0 {
        i64::MAX
    } else {
        entry.block_height
    }
}

impl HistoricalTxList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `entry`, replacing any previous entry of the same transaction
    pub fn insert(&mut self, entry: HistoricalTx) {
        self.remove(&entry.txid);
        let key = sort_key(&entry);
        let at = self.entries.partition_point(|e| sort_key(e) >= key);
        self.entries.insert(at, entry);
    }

    pub fn remove(&mut self, txid: &Txid) {
        self.entries.retain(|e| e.txid != *txid);
    }

    pub fn get(&self) -> &[HistoricalTx] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
