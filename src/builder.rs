//! Unsigned transaction builder
//!
//! Inputs carry the previous output script as their scriptSig until the
//! transaction is signed, so `get_fee` measures roughly what will be sent.

use crate::address::{self, Destination};
use crate::config::ChainParams;
use crate::constants::*;
use crate::error::{Result, WalletError};
use crate::hashes::{Hash, KeyHash};
use crate::script;
use crate::transaction::Transaction;
use crate::types::{ShieldRecipient, TxIn, TxOut, Utxo};

pub struct TransactionBuilder {
    params: ChainParams,
    transaction: Option<Transaction>,
    /// Parallel to `vout`; marks outputs paying back to the wallet
    change: Vec<bool>,
    value_in: u64,
    value_out: u64,
}

impl TransactionBuilder {
    pub fn new(params: ChainParams) -> Self {
        Self {
            params,
            transaction: Some(Transaction::default()),
            change: Vec::new(),
            value_in: 0,
            value_out: 0,
        }
    }

    fn tx_mut(&mut self) -> Result<&mut Transaction> {
        self.transaction
            .as_mut()
            .ok_or_else(|| WalletError::StateInvariant("transaction builder already consumed".to_string()))
    }

    fn tx(&self) -> Result<&Transaction> {
        self.transaction
            .as_ref()
            .ok_or_else(|| WalletError::StateInvariant("transaction builder already consumed".to_string()))
    }

    pub fn value_in(&self) -> u64 {
        self.value_in
    }

    pub fn value_out(&self) -> u64 {
        self.value_out
    }

    /// Value left for fee and change; negative when outputs exceed inputs
    pub fn value(&self) -> i64 {
        self.value_in as i64 - self.value_out as i64
    }

    /// Fee for the transaction as currently staged
    pub fn get_fee(&self) -> Result<u64> {
        Ok(self.tx()?.size() as u64 * FEE_PER_BYTE)
    }

    pub fn is_change(&self, index: usize) -> bool {
        self.change.get(index).copied().unwrap_or(false)
    }

    // ========================================================================
    // INPUTS
    // ========================================================================

    pub fn add_utxo(&mut self, utxo: &Utxo) -> Result<&mut Self> {
        self.tx_mut()?
            .vin_mut()
            .push(TxIn::new(utxo.outpoint, utxo.script.clone()));
        self.value_in += utxo.value;
        Ok(self)
    }

    pub fn add_utxos(&mut self, utxos: &[Utxo]) -> Result<&mut Self> {
        for utxo in utxos {
            self.add_utxo(utxo)?;
        }
        Ok(self)
    }

    // ========================================================================
    // OUTPUTS
    // ========================================================================

    fn push_output(&mut self, script: Vec<u8>, value: u64, is_change: bool) -> Result<&mut Self> {
        if is_change && value < DUST_THRESHOLD {
            tracing::debug!("Dropping dust change of {} into the fee", value);
            return Ok(self);
        }
        self.tx_mut()?.vout_mut().push(TxOut::new(script, value));
        self.change.push(is_change);
        self.value_out += value;
        Ok(self)
    }

    fn standard_hash(&self, address: &str) -> Result<KeyHash> {
        match Destination::parse(address, &self.params)? {
            Destination::Standard(hash) => Ok(hash),
            _ => Err(WalletError::InvalidAddress(format!("{} is not a standard address", address))),
        }
    }

    /// P2PKH output to a standard address
    pub fn add_output(&mut self, address: &str, value: u64) -> Result<&mut Self> {
        let hash = self.standard_hash(address)?;
        self.push_output(script::p2pkh(&hash), value, false)
    }

    /// P2PKH output back to the wallet; skipped when it would be dust
    pub fn add_change_output(&mut self, address: &str, value: u64) -> Result<&mut Self> {
        let hash = self.standard_hash(address)?;
        self.push_output(script::p2pkh(&hash), value, true)
    }

    /// Delegation of `value` to `staker`, spendable by `owner`
    pub fn add_cold_stake_output(
        &mut self,
        owner: &str,
        staker: &str,
        value: u64,
        is_change: bool,
    ) -> Result<&mut Self> {
        let owner_hash = self.standard_hash(owner)?;
        let staker_hash = match Destination::parse(staker, &self.params)? {
            Destination::Staking(hash) => hash,
            _ => {
                return Err(WalletError::InvalidAddress(format!(
                    "{} is not a cold staking address",
                    staker
                )))
            }
        };
        self.push_output(script::cold_stake(&staker_hash, &owner_hash), value, is_change)
    }

    pub fn add_exchange_output(&mut self, address: &str, value: u64) -> Result<&mut Self> {
        match Destination::parse(address, &self.params)? {
            Destination::Exchange(hash) => self.push_output(script::exchange(&hash), value, false),
            _ => Err(WalletError::InvalidAddress(format!("{} is not an exchange address", address))),
        }
    }

    /// Stage a shielded recipient. The prover fills in the shielded section
    /// when the transaction is signed.
    pub fn add_shield_output(&mut self, address: &str, value: u64) -> Result<&mut Self> {
        if !address::is_shield_address(address, &self.params) {
            return Err(WalletError::InvalidAddress(format!("{} is not a shield address", address)));
        }
        let tx = self.tx_mut()?;
        if tx.version() < SAPLING_TX_VERSION {
            tx.set_version(SAPLING_TX_VERSION)?;
        }
        tx.push_shield_recipient(ShieldRecipient {
            address: address.to_string(),
            value,
        });
        self.value_out += value;
        Ok(self)
    }

    /// Budget proposal fee burned to `OP_RETURN <hash>`
    pub fn add_proposal_output(&mut self, hash: &Hash, value: u64) -> Result<&mut Self> {
        self.push_output(script::proposal(hash), value, false)
    }

    /// Output of whatever kind `address` encodes
    pub fn add_destination(&mut self, address: &str, value: u64) -> Result<&mut Self> {
        match Destination::parse(address, &self.params)? {
            Destination::Standard(hash) => self.push_output(script::p2pkh(&hash), value, false),
            Destination::Exchange(hash) => self.push_output(script::exchange(&hash), value, false),
            Destination::Shield(address) => self.add_shield_output(&address, value),
            Destination::Staking(_) => Err(WalletError::InvalidAddress(format!(
                "{} is a cold staking address and needs an owner",
                address
            ))),
        }
    }

    /// Spread `amount` over the non-change outputs, the first one absorbing
    /// the remainder. Used to take the fee out of the sent amount.
    pub fn equally_subtract_amount(&mut self, amount: u64) -> Result<&mut Self> {
        let targets: Vec<usize> = (0..self.change.len()).filter(|i| !self.change[*i]).collect();
        if targets.is_empty() {
            return Err(WalletError::StateInvariant("no output to subtract from".to_string()));
        }
        let share = amount / targets.len() as u64;
        let remainder = amount % targets.len() as u64;

        let vout = self.tx()?.vout();
        for (position, index) in targets.iter().enumerate() {
            let cut = if position == 0 { share + remainder } else { share };
            if vout[*index].value < cut {
                return Err(WalletError::InsufficientBalance {
                    requested: cut,
                    available: vout[*index].value,
                });
            }
        }

        let vout = self.tx_mut()?.vout_mut();
        for (position, index) in targets.into_iter().enumerate() {
            let cut = if position == 0 { share + remainder } else { share };
            vout[index].value -= cut;
        }
        self.value_out -= amount;
        Ok(self)
    }

    /// Hand out the staged transaction. The builder is single use; later
    /// calls return `None`.
    pub fn build(&mut self) -> Option<Transaction> {
        self.transaction.take()
    }
}
