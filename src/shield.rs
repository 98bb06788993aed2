//! Shielded pool capability
//!
//! Note decryption, proving and the commitment tree live behind
//! [`ShieldProver`]. The wallet feeds it blocks, asks it for balances and
//! hands it transparent inputs when a shield transaction is created.

use async_trait::async_trait;
use secp256k1::SecretKey;

use crate::error::Result;
use crate::types::{RawBlock, Utxo};

/// Transparent input handed to the prover together with its spending key
#[derive(Debug, Clone)]
pub struct ShieldInput {
    pub utxo: Utxo,
    pub secret: SecretKey,
}

#[derive(Debug, Clone)]
pub struct ShieldTxRequest {
    /// Shield or transparent destination
    pub address: String,
    pub amount: u64,
    /// Height the transaction is expected to be mined at
    pub block_height: u32,
    /// Spend notes instead of `utxos`
    pub use_shield_inputs: bool,
    pub utxos: Vec<ShieldInput>,
    pub transparent_change_address: String,
}

/// Decrypted note belonging to the wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShieldNote {
    pub recipient: String,
    pub value: u64,
}

#[async_trait]
pub trait ShieldProver: Send + Sync {
    async fn get_balance(&self) -> Result<u64>;

    /// Value of notes created by broadcast but unconfirmed transactions
    async fn get_pending_balance(&self) -> Result<u64>;

    async fn get_last_synced_block(&self) -> Result<u32>;

    /// Sapling root of the local commitment tree, in display byte order
    async fn get_sapling_root(&self) -> Result<String>;

    /// Scan a block, returning the hex of every transaction that touches
    /// the wallet's notes
    async fn handle_block(&self, block: &RawBlock) -> Result<Vec<String>>;

    /// Build, prove and sign a transaction, returning its hex
    async fn create_transaction(&self, request: ShieldTxRequest) -> Result<String>;

    /// Notes of the wallet created by the outputs of `tx_hex`
    async fn decrypt_transaction_outputs(&self, tx_hex: &str) -> Result<Vec<ShieldNote>>;

    /// Note spent by `nullifier` (display order hex), if it was ours
    async fn get_note_from_nullifier(&self, nullifier: &str) -> Result<Option<ShieldNote>>;

    /// Mark the notes of a broadcast transaction as spent
    async fn finalize_transaction(&self, txid: &str) -> Result<()>;

    /// Release the notes reserved by a transaction the network rejected
    async fn discard_transaction(&self, txid: &str) -> Result<()>;

    /// Drop every scanned block above `height` and resume from there
    async fn reload_from_checkpoint(&self, height: u32) -> Result<()>;

    /// Opaque serialized state
    async fn save(&self) -> Result<String>;

    /// Restore from [`ShieldProver::save`] output. `false` when the data
    /// belongs to an incompatible prover version.
    async fn load(&self, data: &str) -> Result<bool>;
}
