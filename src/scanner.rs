//! Gap-limited watch window over HD addresses
//!
//! For every derivation chain the scanner keeps the addresses
//! `[0, loaded_index]` registered as our own, and keeps `loaded_index` at
//! least `GAP_LIMIT` past the highest index seen in a real output.

use std::collections::HashMap;
use std::sync::Arc;

use crate::address::{self, AddressKind};
use crate::config::ChainParams;
use crate::constants::GAP_LIMIT;
use crate::error::{Result, WalletError};
use crate::hashes::KeyHash;
use crate::keys::{self, MasterKey};
use crate::mempool::{OutpointState, OutputClassifier};
use crate::script::{self, ScriptKind};
use crate::types::TxOut;

/// Receive addresses
pub const EXTERNAL: u32 = 0;
/// Change addresses
pub const INTERNAL: u32 = 1;

const CHAINS: [u32; 2] = [EXTERNAL, INTERNAL];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChainState {
    /// Highest index registered in the own-address map
    pub loaded_index: u32,
    /// Highest index seen paying a real output
    pub highest_used_index: u32,
    /// Index of the address currently handed out
    pub address_index: u32,
}

pub struct AddressScanner {
    master_key: Arc<dyn MasterKey>,
    params: ChainParams,
    account: u32,
    chains: [ChainState; 2],
    /// address -> derivation path
    own_addresses: HashMap<String, String>,
    /// (key hash, flavour) -> address
    known_hashes: HashMap<(KeyHash, AddressKind), String>,
}

impl AddressScanner {
    pub fn new(master_key: Arc<dyn MasterKey>, params: ChainParams, account: u32) -> Result<Self> {
        let mut scanner = Self {
            master_key,
            params,
            account,
            chains: [ChainState::default(); 2],
            own_addresses: HashMap::new(),
            known_hashes: HashMap::new(),
        };
        scanner.reset()?;
        Ok(scanner)
    }

    /// Forget everything and register the initial window again
    pub fn reset(&mut self) -> Result<()> {
        self.chains = [ChainState::default(); 2];
        self.own_addresses.clear();
        for chain in CHAINS {
            self.load_addresses(chain)?;
        }
        Ok(())
    }

    pub fn params(&self) -> &ChainParams {
        &self.params
    }

    pub fn master_key(&self) -> &Arc<dyn MasterKey> {
        &self.master_key
    }

    pub fn chain_state(&self, chain: u32) -> Result<ChainState> {
        Ok(self.chains[chain_slot(chain)?])
    }

    /// Register indices `[loaded, loaded + GAP_LIMIT]` of `chain`
    pub fn load_addresses(&mut self, chain: u32) -> Result<()> {
        let slot = chain_slot(chain)?;
        if !self.master_key.is_hd() {
            let path = self.master_key.derivation_path(self.account, chain, 0);
            let address = self.master_key.address(&path)?;
            self.own_addresses.insert(address, path);
            return Ok(());
        }

        let start = self.chains[slot].loaded_index;
        let end = start + GAP_LIMIT;
        for index in start..=end {
            let path = self.master_key.derivation_path(self.account, chain, index);
            let address = self.master_key.address(&path)?;
            self.own_addresses.insert(address, path);
        }
        self.chains[slot].loaded_index = end;
        tracing::trace!("Loaded addresses {}..={} of chain {}", start, end, chain);
        Ok(())
    }

    /// Derivation path of an own address
    pub fn is_own_address(&self, address: &str) -> Option<&str> {
        self.own_addresses.get(address).map(String::as_str)
    }

    fn address_from_hash(&mut self, hash: &KeyHash, kind: AddressKind) -> String {
        self.known_hashes
            .entry((*hash, kind))
            .or_insert_with(|| address::address_from_hash(&self.params, hash, kind))
            .clone()
    }

    /// Addresses a script pays to. Delegations report the staker first,
    /// then the owner.
    pub fn addresses_from_script(&mut self, script: &[u8]) -> (ScriptKind, Vec<String>) {
        let kind = script::inspect(script);
        let addresses = match kind {
            ScriptKind::P2pkh(hash) => vec![self.address_from_hash(&hash, AddressKind::Standard)],
            ScriptKind::ColdStake { staker, owner } => vec![
                self.address_from_hash(&staker, AddressKind::Staking),
                self.address_from_hash(&owner, AddressKind::Standard),
            ],
            ScriptKind::Exchange(hash) => vec![self.address_from_hash(&hash, AddressKind::Exchange)],
            ScriptKind::Proposal(_) | ScriptKind::Unknown => Vec::new(),
        };
        (kind, addresses)
    }

    /// Own address a spendable script pays to: the key of a P2PKH or the
    /// owner of a delegation
    fn spendable_address(&mut self, script: &[u8]) -> Option<String> {
        match script::inspect(script) {
            ScriptKind::P2pkh(hash) => Some(self.address_from_hash(&hash, AddressKind::Standard)),
            ScriptKind::ColdStake { owner, .. } => {
                Some(self.address_from_hash(&owner, AddressKind::Standard))
            }
            _ => None,
        }
    }

    /// Derivation path of the key able to spend `script`
    pub fn get_path(&mut self, script: &[u8]) -> Option<String> {
        let address = self.spendable_address(script)?;
        self.is_own_address(&address).map(str::to_string)
    }

    /// Ownership and script-type bits of a script. Spend, lock and maturity
    /// state live in the ledger.
    pub fn script_state(&mut self, script: &[u8]) -> OutpointState {
        let (kind, addresses) = self.addresses_from_script(script);
        let mut state = OutpointState::NONE;
        if addresses.iter().any(|address| self.is_own_address(address).is_some()) {
            state |= OutpointState::OURS;
        }
        match kind {
            ScriptKind::P2pkh(_) => state |= OutpointState::P2PKH,
            ScriptKind::ColdStake { .. } => state |= OutpointState::P2CS,
            _ => {}
        }
        state
    }

    /// Advance the window when `output` pays one of our HD addresses
    fn update_highest_used_index(&mut self, output: &TxOut) -> Result<()> {
        let Some(path) = self.get_path(&output.script) else {
            return Ok(());
        };
        let Some((chain, index)) = keys::chain_and_index(&path) else {
            return Ok(());
        };
        let slot = chain_slot(chain)?;
        let state = &mut self.chains[slot];
        state.highest_used_index = state.highest_used_index.max(index);
        if state.highest_used_index + GAP_LIMIT >= state.loaded_index {
            self.load_addresses(chain)?;
        }
        Ok(())
    }

    pub fn get_address(&self, chain: u32, index: u32) -> Result<String> {
        self.master_key
            .address(&self.master_key.derivation_path(self.account, chain, index))
    }

    /// Address currently handed out for receiving
    pub fn get_current_address(&self) -> Result<String> {
        self.get_address(EXTERNAL, self.chains[0].address_index)
    }

    /// Hand out the next unused address of `chain`, returning it with its
    /// path. The cursor never moves more than `GAP_LIMIT` past the highest
    /// used index; past that it falls back to the highest used address.
    pub fn get_new_address(&mut self, chain: u32) -> Result<(String, String)> {
        let slot = chain_slot(chain)?;
        let state = &mut self.chains[slot];
        let last = state.highest_used_index;
        state.address_index = state.address_index.max(last) + 1;
        if state.address_index - last > GAP_LIMIT {
            state.address_index = last;
        }
        let index = state.address_index;

        let path = self.master_key.derivation_path(self.account, chain, index);
        let address = self.master_key.address(&path)?;
        Ok((address, path))
    }

    pub fn get_new_change_address(&mut self) -> Result<String> {
        Ok(self.get_new_address(INTERNAL)?.0)
    }

    /// Move the receive cursor past the highest used index after a sync
    pub fn update_current_address(&mut self) {
        let state = &mut self.chains[0];
        if state.address_index <= state.highest_used_index {
            state.address_index = state.highest_used_index + 1;
        }
    }
}

fn chain_slot(chain: u32) -> Result<usize> {
    CHAINS
        .iter()
        .position(|c| *c == chain)
        .ok_or_else(|| WalletError::StateInvariant(format!("unknown derivation chain {}", chain)))
}

impl OutputClassifier for AddressScanner {
    fn observe_output(&mut self, output: &TxOut) -> Result<OutpointState> {
        if self.master_key.is_hd() {
            self.update_highest_used_index(output)?;
        }
        Ok(self.script_state(&output.script))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::Destination;
    use crate::keys::{HdMasterKey, LegacyMasterKey};

    const SEED: &str = "000102030405060708090a0b0c0d0e0f";

    fn hd_scanner() -> AddressScanner {
        let params = ChainParams::testnet();
        let key = HdMasterKey::from_seed(&hex::decode(SEED).unwrap(), &params).unwrap();
        AddressScanner::new(Arc::new(key), params, 0).unwrap()
    }

    fn output_to(scanner: &AddressScanner, chain: u32, index: u32) -> TxOut {
        let address = scanner.get_address(chain, index).unwrap();
        match Destination::parse(&address, &scanner.params).unwrap() {
            Destination::Standard(hash) => TxOut::new(script::p2pkh(&hash), 1000),
            other => panic!("unexpected destination {:?}", other),
        }
    }

    fn assert_gap_invariant(scanner: &AddressScanner) {
        for chain in CHAINS {
            let state = scanner.chain_state(chain).unwrap();
            assert!(state.loaded_index >= state.highest_used_index + GAP_LIMIT);
        }
    }

    #[test]
    fn test_initial_window() {
        let scanner = hd_scanner();
        let state = scanner.chain_state(EXTERNAL).unwrap();
        assert_eq!(state.loaded_index, GAP_LIMIT);
        assert_eq!(state.highest_used_index, 0);
        // indices 0..=20 of both chains
        assert_eq!(scanner.own_addresses.len(), 2 * (GAP_LIMIT as usize + 1));
        assert_eq!(
            scanner.get_address(EXTERNAL, 0).unwrap(),
            "y7VQ7R3SDRxzNuUsUuFzuq2FT1uVtW8iBz"
        );
        assert_gap_invariant(&scanner);
    }

    #[test]
    fn test_observe_output_extends_window() {
        let mut scanner = hd_scanner();
        let output = output_to(&scanner, EXTERNAL, 15);
        let state = scanner.observe_output(&output).unwrap();
        assert_eq!(state, OutpointState::OURS | OutpointState::P2PKH);

        let chain = scanner.chain_state(EXTERNAL).unwrap();
        assert_eq!(chain.highest_used_index, 15);
        assert_eq!(chain.loaded_index, 2 * GAP_LIMIT);
        assert_gap_invariant(&scanner);

        // index 25 only exists after the reload
        let far = output_to(&scanner, EXTERNAL, 25);
        assert!(scanner.observe_output(&far).unwrap().contains(OutpointState::OURS));
        assert_gap_invariant(&scanner);
    }

    #[test]
    fn test_foreign_output_leaves_window() {
        let mut scanner = hd_scanner();
        let before = scanner.chain_state(EXTERNAL).unwrap();
        let state = scanner
            .observe_output(&TxOut::new(script::p2pkh(&[0x55; 20]), 10))
            .unwrap();
        assert_eq!(state, OutpointState::P2PKH);
        assert_eq!(scanner.chain_state(EXTERNAL).unwrap(), before);
    }

    #[test]
    fn test_gap_invariant_over_many_outputs() {
        let mut scanner = hd_scanner();
        for index in [3, 19, 20, 38, 40, 41, 60, 79] {
            let output = output_to(&scanner, INTERNAL, index);
            scanner.observe_output(&output).unwrap();
            assert_gap_invariant(&scanner);
        }
        assert_eq!(scanner.chain_state(INTERNAL).unwrap().highest_used_index, 79);
    }

    #[test]
    fn test_new_address_cursor_clamps() {
        let mut scanner = hd_scanner();
        for expected in 1..=GAP_LIMIT {
            let (_, path) = scanner.get_new_address(EXTERNAL).unwrap();
            assert_eq!(keys::chain_and_index(&path), Some((EXTERNAL, expected)));
        }
        // one past the gap falls back to the highest used index
        let (address, path) = scanner.get_new_address(EXTERNAL).unwrap();
        assert_eq!(keys::chain_and_index(&path), Some((EXTERNAL, 0)));
        assert_eq!(address, scanner.get_address(EXTERNAL, 0).unwrap());
    }

    #[test]
    fn test_update_current_address() {
        let mut scanner = hd_scanner();
        let output = output_to(&scanner, EXTERNAL, 4);
        scanner.observe_output(&output).unwrap();
        scanner.update_current_address();
        assert_eq!(
            scanner.get_current_address().unwrap(),
            scanner.get_address(EXTERNAL, 5).unwrap()
        );
    }

    #[test]
    fn test_cold_stake_script_recovers_addresses() {
        let mut scanner = hd_scanner();
        let owner = scanner.get_address(EXTERNAL, 2).unwrap();
        let Destination::Standard(owner_hash) = Destination::parse(&owner, &scanner.params).unwrap() else {
            panic!("owner must be a standard address");
        };
        let staker = address::address_from_hash(&scanner.params, &[0x77; 20], AddressKind::Staking);

        let script = script::cold_stake(&[0x77; 20], &owner_hash);
        let (_, addresses) = scanner.addresses_from_script(&script);
        assert_eq!(addresses, vec![staker, owner]);
        assert_eq!(
            scanner.script_state(&script),
            OutpointState::OURS | OutpointState::P2CS
        );
        assert_eq!(scanner.get_path(&script).unwrap(), "m/44'/1'/0'/0/2");
    }

    #[test]
    fn test_legacy_key_registers_single_address() {
        let params = ChainParams::testnet();
        let key = LegacyMasterKey::from_bytes(&[0x42; 32], &params).unwrap();
        let mut scanner = AddressScanner::new(Arc::new(key), params, 0).unwrap();
        assert_eq!(scanner.own_addresses.len(), 1);
        assert!(scanner.is_own_address("xxt8326teaczifTFhqH49P9b29m7a845EH").is_some());

        let Destination::Standard(hash) =
            Destination::parse("xxt8326teaczifTFhqH49P9b29m7a845EH", &scanner.params).unwrap()
        else {
            panic!("expected a standard address");
        };
        let state = scanner.observe_output(&TxOut::new(script::p2pkh(&hash), 5)).unwrap();
        assert!(state.contains(OutpointState::OURS));
        assert_eq!(scanner.chain_state(EXTERNAL).unwrap().loaded_index, 0);
    }

    #[test]
    fn test_unknown_chain_is_rejected() {
        let mut scanner = hd_scanner();
        assert!(matches!(scanner.get_new_address(7), Err(WalletError::StateInvariant(_))));
    }
}
