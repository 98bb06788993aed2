//! Core transaction building blocks

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::constants::*;
use crate::error::WalletError;
use crate::hashes::Hash;

/// Byte string type
pub type ByteString = Vec<u8>;

/// Transaction id. Bytes are kept in display order, i.e. the reverse of
/// the double-SHA256 output and of the wire order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Txid(pub Hash);

impl Txid {
    /// Txid of serialized transaction bytes
    pub fn from_wire_hash(mut hash: Hash) -> Self {
        hash.reverse();
        Txid(hash)
    }

    /// Bytes as written on the wire
    pub fn to_wire(&self) -> Hash {
        let mut hash = self.0;
        hash.reverse();
        hash
    }

    pub fn is_null(&self) -> bool {
        self.0.iter().all(|b| *b == 0)
    }
}

impl fmt::Display for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Txid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Txid({})", self)
    }
}

impl FromStr for Txid {
    type Err = WalletError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let hash: Hash = bytes
            .try_into()
            .map_err(|_| WalletError::Parse(format!("txid must be 32 bytes: {}", s)))?;
        Ok(Txid(hash))
    }
}

impl Serialize for Txid {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Txid {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Outpoint: a (txid, output index) pair. Compared by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Outpoint {
    pub txid: Txid,
    pub n: u32,
}

impl Outpoint {
    pub fn new(txid: Txid, n: u32) -> Self {
        Self { txid, n }
    }

    /// Coinbase inputs reference an all-zero txid
    pub fn is_null(&self) -> bool {
        self.txid.is_null()
    }
}

impl fmt::Display for Outpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.n)
    }
}

/// Transaction input
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxIn {
    pub outpoint: Outpoint,
    pub script_sig: ByteString,
    pub sequence: u32,
}

impl TxIn {
    pub fn new(outpoint: Outpoint, script_sig: ByteString) -> Self {
        Self {
            outpoint,
            script_sig,
            sequence: SEQUENCE_FINAL,
        }
    }
}

/// Transaction output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOut {
    pub script: ByteString,
    pub value: u64,
}

impl TxOut {
    pub fn new(script: ByteString, value: u64) -> Self {
        Self { script, value }
    }

    /// The empty output placed first in a coinstake
    pub fn empty() -> Self {
        Self {
            script: vec![],
            value: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.value == 0 && (self.script.is_empty() || self.script == [COINSTAKE_MARKER])
    }
}

/// Read-only view of an unspent output. Always recomputed from the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utxo {
    pub outpoint: Outpoint,
    pub script: ByteString,
    pub value: u64,
}

/// Shielded spend description. The 32-byte fields are kept in display
/// order; the codec reverses them on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldSpend {
    pub cv: Hash,
    pub anchor: Hash,
    pub nullifier: Hash,
    pub rk: Hash,
    pub proof: [u8; SHIELD_PROOF_SIZE],
    pub spend_auth_sig: [u8; SHIELD_SIG_SIZE],
}

/// Shielded output description
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldOutput {
    pub cv: Hash,
    pub cmu: Hash,
    pub ephemeral_key: Hash,
    pub enc_ciphertext: [u8; SHIELD_ENC_CIPHERTEXT_SIZE],
    pub out_ciphertext: [u8; SHIELD_OUT_CIPHERTEXT_SIZE],
    pub proof: [u8; SHIELD_PROOF_SIZE],
}

/// Shielded destination staged by the builder and resolved by the prover
/// at signing time. Never serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShieldRecipient {
    pub address: String,
    pub value: u64,
}

/// A block as returned by a backend: raw transactions plus metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    pub height: u32,
    pub time: i64,
    pub txs: Vec<RawBlockTx>,
    /// Sapling commitment tree root after this block, when the backend reports it
    #[serde(default, alias = "finalsaplingroot")]
    pub final_sapling_root: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlockTx {
    pub txid: Txid,
    pub hex: String,
}
