//! Address encoding and classification
//!
//! Transparent addresses are Base58Check over `prefix || hash160`. Shield
//! addresses are bech32 with a per-network human readable part.

use bech32::Hrp;

use crate::config::ChainParams;
use crate::error::{Result, WalletError};
use crate::hashes::KeyHash;

/// Transparent address flavours, by version prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressKind {
    Standard,
    Staking,
    Exchange,
}

/// Where a payment goes, classified once from the address string
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Standard(KeyHash),
    /// A cold staker; only meaningful as the staker half of a delegation
    Staking(KeyHash),
    Exchange(KeyHash),
    Shield(String),
}

impl Destination {
    pub fn parse(address: &str, params: &ChainParams) -> Result<Self> {
        if is_shield_address(address, params) {
            return Ok(Destination::Shield(address.to_string()));
        }

        let payload = decode_base58(address)?;
        let exchange = &params.exchange_prefix[..];
        match payload.len() {
            21 if payload[0] == params.pubkey_prefix => Ok(Destination::Standard(key_hash(&payload[1..]))),
            21 if payload[0] == params.staking_prefix => Ok(Destination::Staking(key_hash(&payload[1..]))),
            23 if &payload[..3] == exchange => Ok(Destination::Exchange(key_hash(&payload[3..]))),
            _ => Err(WalletError::InvalidAddress(format!(
                "{} is not an address of {}",
                address, params.name
            ))),
        }
    }
}

fn key_hash(bytes: &[u8]) -> KeyHash {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(bytes);
    hash
}

/// Base58 decode and verify the trailing 4-byte double-SHA256 checksum.
/// Returns the payload without the checksum.
pub fn decode_base58(address: &str) -> Result<Vec<u8>> {
    bs58::decode(address)
        .with_check(None)
        .into_vec()
        .map_err(|e| WalletError::InvalidAddress(format!("{}: {}", address, e)))
}

pub fn encode_base58(payload: &[u8]) -> String {
    bs58::encode(payload).with_check().into_string()
}

/// Address of the given flavour for a key hash
pub fn address_from_hash(params: &ChainParams, hash: &KeyHash, kind: AddressKind) -> String {
    let mut payload = Vec::with_capacity(23);
    match kind {
        AddressKind::Standard => payload.push(params.pubkey_prefix),
        AddressKind::Staking => payload.push(params.staking_prefix),
        AddressKind::Exchange => payload.extend_from_slice(&params.exchange_prefix),
    }
    payload.extend_from_slice(hash);
    encode_base58(&payload)
}

pub fn is_shield_address(address: &str, params: &ChainParams) -> bool {
    let Ok(expected) = Hrp::parse(&params.shield_hrp) else {
        return false;
    };
    match bech32::decode(address) {
        Ok((hrp, data)) => hrp == expected && data.len() == 43,
        Err(_) => false,
    }
}

pub fn is_valid_address(address: &str, params: &ChainParams) -> bool {
    Destination::parse(address, params).is_ok()
}
