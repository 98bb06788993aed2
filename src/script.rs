//! Output scripts the wallet builds and recognises
//!
//! No script execution happens here. Outputs are matched against a handful
//! of fixed templates and the embedded key hashes are extracted.

use crate::hashes::{Hash, KeyHash};
use crate::types::ByteString;

pub const OP_FALSE: u8 = 0x00;
pub const OP_RETURN: u8 = 0x6a;
pub const OP_IF: u8 = 0x63;
pub const OP_ELSE: u8 = 0x67;
pub const OP_ENDIF: u8 = 0x68;
pub const OP_ROT: u8 = 0x7b;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
/// Cold staking check, staker branch of a delegation
pub const OP_CHECKCOLDSTAKEVERIFY_LOF: u8 = 0xd1;
pub const OP_CHECKCOLDSTAKEVERIFY: u8 = 0xd2;
/// Marks a P2PKH output as an exchange deposit
pub const OP_EXCHANGEADDR: u8 = 0xe0;

/// Push of a 20-byte hash
const PUSH_20: u8 = 0x14;
/// Push of a 32-byte hash
const PUSH_32: u8 = 0x20;

/// Key hash offset inside a P2PKH script
pub const P2PKH_HASH_INDEX: usize = 3;
/// Staker key hash offset inside a P2CS script
pub const P2CS_STAKER_INDEX: usize = 6;
/// Owner key hash offset inside a P2CS script
pub const P2CS_OWNER_INDEX: usize = 28;

const P2PKH_LEN: usize = 25;
const P2CS_LEN: usize = 51;
const P2EXC_LEN: usize = 26;
const PROPOSAL_LEN: usize = 34;

/// What an output script pays to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    P2pkh(KeyHash),
    ColdStake { staker: KeyHash, owner: KeyHash },
    Exchange(KeyHash),
    Proposal(Hash),
    Unknown,
}

// ============================================================================
// BUILDERS
// ============================================================================

/// `OP_DUP OP_HASH160 <hash> OP_EQUALVERIFY OP_CHECKSIG`
pub fn p2pkh(hash: &KeyHash) -> ByteString {
    let mut script = Vec::with_capacity(P2PKH_LEN);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, PUSH_20]);
    script.extend_from_slice(hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// `OP_DUP OP_HASH160 OP_ROT OP_IF OP_CHECKCOLDSTAKEVERIFY_LOF <staker>
/// OP_ELSE <owner> OP_ENDIF OP_EQUALVERIFY OP_CHECKSIG`
pub fn cold_stake(staker: &KeyHash, owner: &KeyHash) -> ByteString {
    let mut script = Vec::with_capacity(P2CS_LEN);
    script.extend_from_slice(&[
        OP_DUP,
        OP_HASH160,
        OP_ROT,
        OP_IF,
        OP_CHECKCOLDSTAKEVERIFY_LOF,
        PUSH_20,
    ]);
    script.extend_from_slice(staker);
    script.extend_from_slice(&[OP_ELSE, PUSH_20]);
    script.extend_from_slice(owner);
    script.extend_from_slice(&[OP_ENDIF, OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// P2PKH prefixed with `OP_EXCHANGEADDR`
pub fn exchange(hash: &KeyHash) -> ByteString {
    let mut script = Vec::with_capacity(P2EXC_LEN);
    script.push(OP_EXCHANGEADDR);
    script.extend_from_slice(&p2pkh(hash));
    script
}

/// Unspendable `OP_RETURN <proposal hash>`
pub fn proposal(hash: &Hash) -> ByteString {
    let mut script = Vec::with_capacity(PROPOSAL_LEN);
    script.extend_from_slice(&[OP_RETURN, PUSH_32]);
    script.extend_from_slice(hash);
    script
}

// ============================================================================
// INSPECTION
// ============================================================================

pub fn is_p2pkh(script: &[u8]) -> bool {
    script.len() == P2PKH_LEN
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == PUSH_20
        && script[23] == OP_EQUALVERIFY
        && script[24] == OP_CHECKSIG
}

pub fn is_p2cs(script: &[u8]) -> bool {
    script.len() == P2CS_LEN
        && script[0] == OP_DUP
        && script[1] == OP_HASH160
        && script[2] == OP_ROT
        && script[3] == OP_IF
        && (script[4] == OP_CHECKCOLDSTAKEVERIFY_LOF || script[4] == OP_CHECKCOLDSTAKEVERIFY)
        && script[5] == PUSH_20
        && script[26] == OP_ELSE
        && script[27] == PUSH_20
        && script[48] == OP_ENDIF
        && script[49] == OP_EQUALVERIFY
        && script[50] == OP_CHECKSIG
}

pub fn is_p2exc(script: &[u8]) -> bool {
    script.len() == P2EXC_LEN && script[0] == OP_EXCHANGEADDR && is_p2pkh(&script[1..])
}

pub fn is_proposal_fee(script: &[u8]) -> bool {
    script.len() == PROPOSAL_LEN && script[0] == OP_RETURN && script[1] == PUSH_32
}

fn key_hash_at(script: &[u8], start: usize) -> KeyHash {
    let mut hash = [0u8; 20];
    hash.copy_from_slice(&script[start..start + 20]);
    hash
}

/// Match a script against the known templates
pub fn inspect(script: &[u8]) -> ScriptKind {
    if is_p2pkh(script) {
        ScriptKind::P2pkh(key_hash_at(script, P2PKH_HASH_INDEX))
    } else if is_p2cs(script) {
        ScriptKind::ColdStake {
            staker: key_hash_at(script, P2CS_STAKER_INDEX),
            owner: key_hash_at(script, P2CS_OWNER_INDEX),
        }
    } else if is_p2exc(script) {
        ScriptKind::Exchange(key_hash_at(script, P2PKH_HASH_INDEX + 1))
    } else if is_proposal_fee(script) {
        let mut hash = [0u8; 32];
        hash.copy_from_slice(&script[2..]);
        ScriptKind::Proposal(hash)
    } else {
        ScriptKind::Unknown
    }
}
