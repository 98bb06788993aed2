//! Wallet and wire-format constants

/// Satoshis per coin
pub const COIN: u64 = 100_000_000;

/// First transaction version able to carry a shielded section
pub const SAPLING_TX_VERSION: u32 = 3;

/// Confirmations a coinbase/coinstake output needs before it can be spent
pub const COINBASE_MATURITY: i64 = 100;

/// Maximum run of unused derived addresses watched past the last used one
pub const GAP_LIMIT: u32 = 20;

/// Placeholder fee rate used by the transaction builder, in satoshis per byte
pub const FEE_PER_BYTE: u64 = 10;

/// Change below this value is not worth an output and is left to the fee
pub const DUST_THRESHOLD: u64 = 10_000;

/// UTXO selection stops once the accumulated value reaches
/// `target * UTXO_TARGET_MARGIN_NUM / UTXO_TARGET_MARGIN_DEN`
pub const UTXO_TARGET_MARGIN_NUM: u64 = 11;
pub const UTXO_TARGET_MARGIN_DEN: u64 = 10;

/// Default input sequence
pub const SEQUENCE_FINAL: u32 = 0xffffffff;

/// Script of the empty output that marks a coinstake
pub const COINSTAKE_MARKER: u8 = 0xf8;

/// Outer attempts made by `safe_fetch` before giving up
pub const SAFE_FETCH_ATTEMPTS: usize = 6;

/// Pause between `safe_fetch` attempts, in milliseconds
pub const SAFE_FETCH_DELAY_MS: u64 = 20_000;

/// Number of shield blocks downloaded concurrently during shield sync
pub const SHIELD_BATCH_SYNC_SIZE: usize = 32;

/// Blocks re-downloaded behind the tip after an explorer history sync,
/// explorers frequently lag on the most recent block
pub const EXPLORER_TIP_LAG: u32 = 5;

/// Height the shield prover rescans from when its state is unusable
pub const SHIELD_CHECKPOINT_HEIGHT: u32 = 4_200_000;

/// Explorer history page size
pub const TX_PAGE_SIZE: u32 = 1000;

/// Sizes of the shielded wire fields
pub const SHIELD_PROOF_SIZE: usize = 192;
pub const SHIELD_SIG_SIZE: usize = 64;
pub const SHIELD_ENC_CIPHERTEXT_SIZE: usize = 580;
pub const SHIELD_OUT_CIPHERTEXT_SIZE: usize = 80;

/// SIGHASH_ALL
pub const SIGHASH_ALL: u32 = 1;
