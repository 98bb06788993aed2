//! Transaction model: wire fields, cached txid, sighash and input signing

use std::sync::OnceLock;

use secp256k1::{Message, PublicKey, Secp256k1, SecretKey};

use crate::codec::{decode_transaction, encode_transaction};
use crate::constants::*;
use crate::error::{Result, WalletError};
use crate::hashes::double_sha256;
use crate::script;
use crate::types::*;

/// A transaction as seen by the wallet.
///
/// Wire fields are private and only reachable through setters, each of which
/// drops the cached txid. `block_height` and `block_time` are sync metadata,
/// they do not affect the serialized bytes and never invalidate the cache.
#[derive(Debug, Clone)]
pub struct Transaction {
    pub(crate) version: u32,
    pub(crate) vin: Vec<TxIn>,
    pub(crate) vout: Vec<TxOut>,
    pub(crate) lock_time: u32,
    pub(crate) value_balance: i64,
    pub(crate) shield_spend: Vec<ShieldSpend>,
    pub(crate) shield_output: Vec<ShieldOutput>,
    pub(crate) binding_sig: Option<[u8; SHIELD_SIG_SIZE]>,
    pub(crate) shield_recipients: Vec<ShieldRecipient>,
    /// Height of the containing block, -1 while unconfirmed
    pub block_height: i64,
    /// Time of the containing block, -1 when unknown
    pub block_time: i64,
    txid: OnceLock<Txid>,
}

impl Default for Transaction {
    fn default() -> Self {
        Self {
            version: 1,
            vin: Vec::new(),
            vout: Vec::new(),
            lock_time: 0,
            value_balance: 0,
            shield_spend: Vec::new(),
            shield_output: Vec::new(),
            binding_sig: None,
            shield_recipients: Vec::new(),
            block_height: -1,
            block_time: -1,
            txid: OnceLock::new(),
        }
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.vin == other.vin
            && self.vout == other.vout
            && self.lock_time == other.lock_time
            && self.value_balance == other.value_balance
            && self.shield_spend == other.shield_spend
            && self.shield_output == other.shield_output
            && self.binding_sig == other.binding_sig
            && self.shield_recipients == other.shield_recipients
            && self.block_height == other.block_height
            && self.block_time == other.block_time
    }
}

impl Eq for Transaction {}

impl Transaction {
    pub fn new(version: u32, vin: Vec<TxIn>, vout: Vec<TxOut>) -> Self {
        Self {
            version,
            vin,
            vout,
            ..Default::default()
        }
    }

    // ============================================================================
    // WIRE
    // ============================================================================

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        decode_transaction(bytes)
    }

    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Self::from_bytes(&hex::decode(hex_str)?)
    }

    pub fn serialize(&self) -> Vec<u8> {
        encode_transaction(self)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Serialized size in bytes
    pub fn size(&self) -> usize {
        self.serialize().len()
    }

    /// Lazily computed and cached until the next mutation
    pub fn txid(&self) -> Txid {
        *self
            .txid
            .get_or_init(|| Txid::from_wire_hash(double_sha256(&self.serialize())))
    }

    /// Txid of raw transaction hex, without decoding it
    pub fn txid_from_hex(hex_str: &str) -> Result<Txid> {
        Ok(Txid::from_wire_hash(double_sha256(&hex::decode(hex_str)?)))
    }

    fn invalidate(&mut self) {
        self.txid = OnceLock::new();
    }

    // ============================================================================
    // ACCESSORS
    // ============================================================================

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Versions below sapling are refused while a shielded section is set
    pub fn set_version(&mut self, version: u32) -> Result<()> {
        if version < SAPLING_TX_VERSION && self.has_shield_data() {
            return Err(WalletError::StateInvariant(format!(
                "version {} cannot carry the shielded section",
                version
            )));
        }
        self.invalidate();
        self.version = version;
        Ok(())
    }

    pub fn vin(&self) -> &[TxIn] {
        &self.vin
    }

    pub fn vin_mut(&mut self) -> &mut Vec<TxIn> {
        self.invalidate();
        &mut self.vin
    }

    pub fn vout(&self) -> &[TxOut] {
        &self.vout
    }

    pub fn vout_mut(&mut self) -> &mut Vec<TxOut> {
        self.invalidate();
        &mut self.vout
    }

    pub fn lock_time(&self) -> u32 {
        self.lock_time
    }

    pub fn set_lock_time(&mut self, lock_time: u32) {
        self.invalidate();
        self.lock_time = lock_time;
    }

    pub fn value_balance(&self) -> i64 {
        self.value_balance
    }

    pub fn shield_spend(&self) -> &[ShieldSpend] {
        &self.shield_spend
    }

    pub fn shield_output(&self) -> &[ShieldOutput] {
        &self.shield_output
    }

    pub fn binding_sig(&self) -> Option<&[u8; SHIELD_SIG_SIZE]> {
        self.binding_sig.as_ref()
    }

    /// Replace the whole shielded section. Spends, outputs and a value
    /// balance only exist on the wire behind a binding signature.
    pub fn set_shield_data(
        &mut self,
        value_balance: i64,
        spends: Vec<ShieldSpend>,
        outputs: Vec<ShieldOutput>,
        binding_sig: Option<[u8; SHIELD_SIG_SIZE]>,
    ) -> Result<()> {
        let has_content = value_balance != 0 || !spends.is_empty() || !outputs.is_empty();
        if binding_sig.is_some() && !self.has_sapling_version() {
            return Err(WalletError::StateInvariant(format!(
                "version {} transactions carry no shield data",
                self.version
            )));
        }
        if has_content && binding_sig.is_none() {
            return Err(WalletError::StateInvariant(
                "shield data needs a binding signature".to_string(),
            ));
        }
        self.invalidate();
        self.value_balance = value_balance;
        self.shield_spend = spends;
        self.shield_output = outputs;
        self.binding_sig = binding_sig;
        Ok(())
    }

    pub fn shield_recipients(&self) -> &[ShieldRecipient] {
        &self.shield_recipients
    }

    pub fn push_shield_recipient(&mut self, recipient: ShieldRecipient) {
        self.shield_recipients.push(recipient);
    }

    // ============================================================================
    // CLASSIFICATION
    // ============================================================================

    pub fn is_confirmed(&self) -> bool {
        self.block_height != -1
    }

    pub fn has_sapling_version(&self) -> bool {
        self.version >= SAPLING_TX_VERSION
    }

    pub fn has_shield_data(&self) -> bool {
        self.binding_sig.is_some()
    }

    /// A single input spending the null outpoint
    pub fn is_coinbase(&self) -> bool {
        self.vin.len() == 1 && self.vin[0].outpoint.is_null()
    }

    /// First output empty, at least one more following it
    pub fn is_coinstake(&self) -> bool {
        self.vout.len() >= 2 && self.vout[0].is_empty()
    }

    pub fn is_proposal_fee(&self) -> bool {
        self.vout.iter().any(|out| script::is_proposal_fee(&out.script))
    }

    pub fn value_out(&self) -> u64 {
        self.vout.iter().map(|out| out.value).sum()
    }

    // ============================================================================
    // SIGNING
    // ============================================================================

    /// SIGHASH_ALL digest for input `index`: every other input's scriptSig is
    /// blanked, the signed input keeps the script it is redeeming.
    pub fn transaction_hash(&self, index: usize) -> Result<[u8; 32]> {
        if self.has_sapling_version() {
            return Err(WalletError::StateInvariant(
                "tx version too high, cannot use base tx hash".to_string(),
            ));
        }
        if index >= self.vin.len() {
            return Err(WalletError::StateInvariant(format!(
                "input {} out of range ({} inputs)",
                index,
                self.vin.len()
            )));
        }

        let mut copy = self.clone();
        for (i, input) in copy.vin.iter_mut().enumerate() {
            if i != index {
                input.script_sig.clear();
            }
        }
        let mut preimage = copy.serialize();
        preimage.extend_from_slice(&SIGHASH_ALL.to_le_bytes());
        Ok(double_sha256(&preimage))
    }

    /// Sign input `index` and replace its scriptSig with
    /// `<sig+hashtype> [OP_FALSE] <pubkey>`. OP_FALSE selects the owner
    /// branch when redeeming a cold-stake delegation.
    pub fn sign_input(&mut self, index: usize, secret: &SecretKey, is_cold_stake: bool) -> Result<()> {
        let sighash = self.transaction_hash(index)?;
        let secp = Secp256k1::signing_only();
        let message = Message::from_digest_slice(&sighash)
            .map_err(|e| WalletError::Key(e.to_string()))?;

        let mut signature = secp.sign_ecdsa(&message, secret).serialize_der().to_vec();
        signature.push(SIGHASH_ALL as u8);
        let pubkey = PublicKey::from_secret_key(&secp, secret).serialize();

        let mut script_sig = Vec::with_capacity(signature.len() + pubkey.len() + 3);
        script_sig.push(signature.len() as u8);
        script_sig.extend_from_slice(&signature);
        if is_cold_stake {
            script_sig.push(script::OP_FALSE);
        }
        script_sig.push(pubkey.len() as u8);
        script_sig.extend_from_slice(&pubkey);

        self.vin_mut()[index].script_sig = script_sig;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secp256k1::ecdsa::Signature;

    fn sample_tx() -> Transaction {
        Transaction::new(
            1,
            vec![TxIn::new(
                Outpoint::new(Txid([0x11; 32]), 0),
                script::p2pkh(&[0x22; 20]),
            )],
            vec![
                TxOut::new(script::p2pkh(&[0x33; 20]), 4_992_400),
                TxOut::new(script::p2pkh(&[0x44; 20]), 5_000_000),
            ],
        )
    }

    #[test]
    fn test_default_is_unconfirmed() {
        let tx = Transaction::default();
        assert_eq!(tx.version(), 1);
        assert_eq!(tx.block_height, -1);
        assert_eq!(tx.block_time, -1);
        assert!(!tx.is_confirmed());
    }

    #[test]
    fn test_hex_round_trip() {
        let tx = sample_tx();
        let decoded = Transaction::from_hex(&tx.to_hex()).unwrap();
        assert_eq!(decoded, tx);
        assert_eq!(decoded.txid(), tx.txid());
    }

    #[test]
    fn test_txid_is_stable() {
        let tx = sample_tx();
        assert_eq!(tx.txid(), tx.txid());
        assert_eq!(tx.txid(), Transaction::txid_from_hex(&tx.to_hex()).unwrap());
    }

    #[test]
    fn test_txid_invalidated_by_mutation() {
        let mut tx = sample_tx();
        let before = tx.txid();
        tx.vout_mut()[0].value += 1;
        assert_ne!(tx.txid(), before);

        let before = tx.txid();
        tx.set_lock_time(500);
        assert_ne!(tx.txid(), before);
    }

    #[test]
    fn test_txid_survives_metadata_change() {
        let mut tx = sample_tx();
        let before = tx.txid();
        tx.block_height = 1000;
        tx.block_time = 1_700_000_000;
        assert_eq!(tx.txid(), before);
    }

    #[test]
    fn test_coinbase_and_coinstake() {
        let coinbase = Transaction::new(
            1,
            vec![TxIn::new(Outpoint::new(Txid::default(), 0xffffffff), vec![0x51])],
            vec![TxOut::new(vec![0x51], 100)],
        );
        assert!(coinbase.is_coinbase());
        assert!(!coinbase.is_coinstake());

        let coinstake = Transaction::new(
            1,
            vec![TxIn::new(Outpoint::new(Txid([1; 32]), 0), vec![])],
            vec![TxOut::empty(), TxOut::new(vec![0x51], 100)],
        );
        assert!(coinstake.is_coinstake());
        assert!(!coinstake.is_coinbase());
        assert!(!sample_tx().is_coinstake());
    }

    #[test]
    fn test_proposal_fee_detection() {
        let mut tx = sample_tx();
        assert!(!tx.is_proposal_fee());
        tx.vout_mut().push(TxOut::new(script::proposal(&[0x55; 32]), 50 * COIN));
        assert!(tx.is_proposal_fee());
    }

    #[test]
    fn test_sighash_rejects_sapling_version() {
        let mut tx = sample_tx();
        tx.set_version(SAPLING_TX_VERSION).unwrap();
        assert!(matches!(tx.transaction_hash(0), Err(WalletError::StateInvariant(_))));
    }

    #[test]
    fn test_shield_data_requires_binding_sig() {
        let mut tx = sample_tx();
        tx.set_version(SAPLING_TX_VERSION).unwrap();
        assert!(matches!(
            tx.set_shield_data(-5_000, Vec::new(), Vec::new(), None),
            Err(WalletError::StateInvariant(_))
        ));
        assert_eq!(tx.value_balance(), 0);
        assert!(!tx.has_shield_data());

        // an empty section is written as a single zero byte
        tx.set_shield_data(0, Vec::new(), Vec::new(), None).unwrap();
        assert_eq!(tx.serialize().last(), Some(&0));

        tx.set_shield_data(-5_000, Vec::new(), Vec::new(), Some([0x77; SHIELD_SIG_SIZE]))
            .unwrap();
        let decoded = Transaction::from_bytes(&tx.serialize()).unwrap();
        assert_eq!(decoded.value_balance(), -5_000);
        assert_eq!(decoded.binding_sig(), Some(&[0x77; SHIELD_SIG_SIZE]));
    }

    #[test]
    fn test_shield_data_pins_sapling_version() {
        let mut tx = sample_tx();
        assert!(tx
            .set_shield_data(0, Vec::new(), Vec::new(), Some([0x01; SHIELD_SIG_SIZE]))
            .is_err());

        tx.set_version(SAPLING_TX_VERSION).unwrap();
        tx.set_shield_data(0, Vec::new(), Vec::new(), Some([0x01; SHIELD_SIG_SIZE]))
            .unwrap();
        assert!(matches!(tx.set_version(1), Err(WalletError::StateInvariant(_))));
        assert_eq!(tx.version(), SAPLING_TX_VERSION);
    }

    #[test]
    fn test_sighash_blanks_other_inputs() {
        let mut tx = sample_tx();
        tx.vin_mut().push(TxIn::new(Outpoint::new(Txid([0x12; 32]), 1), vec![0xaa; 25]));
        let hash = tx.transaction_hash(0).unwrap();

        let mut other = tx.clone();
        other.vin_mut()[1].script_sig = vec![0xbb; 10];
        assert_eq!(other.transaction_hash(0).unwrap(), hash);
        assert_ne!(other.transaction_hash(1).unwrap(), tx.transaction_hash(1).unwrap());
    }

    #[test]
    fn test_sign_input_produces_verifiable_signature() {
        let secret = SecretKey::from_slice(&[0x42; 32]).unwrap();
        let mut tx = sample_tx();
        let sighash = tx.transaction_hash(0).unwrap();
        tx.sign_input(0, &secret, false).unwrap();

        let script_sig = tx.vin()[0].script_sig.clone();
        let sig_len = script_sig[0] as usize;
        let der = &script_sig[1..sig_len];
        assert_eq!(script_sig[sig_len], SIGHASH_ALL as u8);
        assert_eq!(script_sig[sig_len + 1], 33);

        let secp = Secp256k1::new();
        let pubkey = PublicKey::from_slice(&script_sig[sig_len + 2..]).unwrap();
        assert_eq!(pubkey, PublicKey::from_secret_key(&secp, &secret));
        let signature = Signature::from_der(der).unwrap();
        let message = Message::from_digest_slice(&sighash).unwrap();
        assert!(secp.verify_ecdsa(&message, &signature, &pubkey).is_ok());
    }

    #[test]
    fn test_sign_cold_stake_input_inserts_op_false() {
        let secret = SecretKey::from_slice(&[0x42; 32]).unwrap();
        let mut tx = sample_tx();
        tx.sign_input(0, &secret, true).unwrap();
        let script_sig = &tx.vin()[0].script_sig;
        let sig_len = script_sig[0] as usize;
        assert_eq!(script_sig[sig_len + 1], script::OP_FALSE);
        assert_eq!(script_sig[sig_len + 2], 33);
    }
}
