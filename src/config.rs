//! # Wallet Configuration
//!
//! Chain parameters for the supported networks and the runtime settings of
//! a wallet instance.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::*;
use crate::error::Result;

/// Network-specific parameters.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainParams {
    pub name: String,

    pub is_testnet: bool,

    /// Version byte of standard (P2PKH) addresses.
    pub pubkey_prefix: u8,

    /// Version byte of cold staking addresses.
    pub staking_prefix: u8,

    /// Version bytes of exchange addresses.
    pub exchange_prefix: [u8; 3],

    /// Version byte of WIF private keys.
    pub secret_key_prefix: u8,

    /// Human readable part of shield addresses.
    pub shield_hrp: String,

    /// BIP44 coin type.
    pub bip44_type: u32,

    /// Explorer backends, tried in order.
    pub explorers: Vec<String>,

    /// RPC node backends, tried in order.
    pub nodes: Vec<String>,

    /// Exact value of a masternode collateral output.
    pub masternode_collateral: u64,

    /// Delegations larger than this are split into outputs of roughly this size.
    pub stake_split_target: u64,
}

impl ChainParams {
    pub fn mainnet() -> Self {
        Self {
            name: "mainnet".to_string(),
            is_testnet: false,
            pubkey_prefix: 30,
            staking_prefix: 63,
            exchange_prefix: [0x01, 0xb9, 0xa2],
            secret_key_prefix: 212,
            shield_hrp: "ps".to_string(),
            bip44_type: 119,
            explorers: vec![
                "https://explorer.duddino.com".to_string(),
                "https://zkbitcoin.com".to_string(),
            ],
            nodes: vec![
                "https://rpc.duddino.com/mainnet".to_string(),
                "https://rpc2.duddino.com/mainnet".to_string(),
            ],
            masternode_collateral: 10_000 * COIN,
            stake_split_target: 500 * COIN,
        }
    }

    pub fn testnet() -> Self {
        Self {
            name: "testnet".to_string(),
            is_testnet: true,
            pubkey_prefix: 139,
            staking_prefix: 73,
            exchange_prefix: [0x01, 0xb9, 0xb1],
            secret_key_prefix: 239,
            shield_hrp: "ptestsapling".to_string(),
            bip44_type: 1,
            explorers: vec!["https://testnet.rockdev.org".to_string()],
            nodes: vec!["https://rpc.duddino.com/testnet".to_string()],
            masternode_collateral: 10_000 * COIN,
            stake_split_target: 500 * COIN,
        }
    }
}

/// Runtime settings of a wallet instance.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WalletConfig {
    pub chain: ChainParams,

    /// HD account index.
    pub account: u32,

    /// Fail over to the next backend when the current one errors.
    pub auto_switch: bool,

    /// Outer attempts of `safe_fetch`.
    pub safe_fetch_attempts: usize,

    /// Pause between `safe_fetch` attempts, in milliseconds.
    pub safe_fetch_delay_ms: u64,

    /// Shield blocks downloaded concurrently.
    pub shield_batch_size: usize,
}

impl Default for WalletConfig {
    fn default() -> Self {
        Self {
            chain: ChainParams::mainnet(),
            account: 0,
            auto_switch: true,
            safe_fetch_attempts: SAFE_FETCH_ATTEMPTS,
            safe_fetch_delay_ms: SAFE_FETCH_DELAY_MS,
            shield_batch_size: SHIELD_BATCH_SYNC_SIZE,
        }
    }
}

impl WalletConfig {
    /// Create a config for testing (testnet, no retry pauses).
    pub fn for_testing() -> Self {
        Self {
            chain: ChainParams::testnet(),
            account: 0,
            auto_switch: true,
            safe_fetch_attempts: 2,
            safe_fetch_delay_ms: 0,
            shield_batch_size: 4,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn safe_fetch_delay(&self) -> Duration {
        Duration::from_millis(self.safe_fetch_delay_ms)
    }
}
