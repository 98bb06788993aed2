//! Ledger scenarios driven through the address scanner

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use proptest::prelude::*;
use wallet_engine::address::{address_from_hash, AddressKind, Destination};
use wallet_engine::historical::{HistoricalTx, ShieldAmounts};
use wallet_engine::scanner::{EXTERNAL, INTERNAL};
use wallet_engine::script::{self, ScriptKind};
use wallet_engine::*;

const SEED: &str = "000102030405060708090a0b0c0d0e0f";

fn scanner() -> AddressScanner {
    let params = ChainParams::testnet();
    let key = HdMasterKey::from_seed(&hex::decode(SEED).unwrap(), &params).unwrap();
    AddressScanner::new(Arc::new(key), params, 0).unwrap()
}

fn p2pkh_to(scanner: &AddressScanner, address: &str, value: u64) -> TxOut {
    match Destination::parse(address, scanner.params()).unwrap() {
        Destination::Standard(hash) => TxOut::new(script::p2pkh(&hash), value),
        other => panic!("unexpected destination {:?}", other),
    }
}

fn confirmed(vin: Vec<TxIn>, vout: Vec<TxOut>, height: i64) -> Transaction {
    let mut tx = Transaction::new(1, vin, vout);
    tx.block_height = height;
    tx.block_time = 1_600_000_000 + height;
    tx
}

fn foreign_input(seed: u8) -> TxIn {
    TxIn::new(Outpoint::new(Txid([seed; 32]), 0), vec![])
}

#[test]
fn test_two_owned_outputs_then_spend() {
    let mut scanner = scanner();
    let mut mempool = Mempool::new();
    let first = scanner.get_address(EXTERNAL, 0).unwrap();
    let second = scanner.get_address(EXTERNAL, 1).unwrap();
    let tx = confirmed(
        vec![foreign_input(1)],
        vec![
            p2pkh_to(&scanner, &first, 4_992_400),
            p2pkh_to(&scanner, &second, 5_000_000),
        ],
        10,
    );
    let txid = tx.txid();
    mempool.add_transaction(tx, &mut scanner).unwrap();

    let filter = OutpointState::OURS | OutpointState::P2PKH;
    assert_eq!(mempool.get_balance(filter, 10), 9_992_400);
    assert_eq!(mempool.get_balance(filter, 5_000), 9_992_400);

    mempool.set_spent(Outpoint::new(txid, 0));
    assert_eq!(mempool.get_balance(filter, 10), 5_000_000);
}

#[test]
fn test_confirmed_add_is_idempotent() {
    let mut scanner = scanner();
    let mut mempool = Mempool::new();
    let address = scanner.get_address(EXTERNAL, 3).unwrap();
    let tx = confirmed(vec![foreign_input(2)], vec![p2pkh_to(&scanner, &address, 70_000)], 20);
    let txid = tx.txid();

    mempool.add_transaction(tx.clone(), &mut scanner).unwrap();
    let status = mempool.get_outpoint_status(&Outpoint::new(txid, 0));
    mempool.add_transaction(tx, &mut scanner).unwrap();

    assert_eq!(mempool.len(), 1);
    assert_eq!(mempool.get_outpoint_status(&Outpoint::new(txid, 0)), status);
    assert_eq!(mempool.balance(20), 70_000);
}

#[test]
fn test_spend_chain_keeps_change() {
    let mut scanner = scanner();
    let mut mempool = Mempool::new();
    let receive = scanner.get_address(EXTERNAL, 0).unwrap();
    let funding = confirmed(vec![foreign_input(3)], vec![p2pkh_to(&scanner, &receive, 10 * COIN)], 100);
    let funding_id = funding.txid();
    mempool.add_transaction(funding, &mut scanner).unwrap();

    let change = scanner.get_address(INTERNAL, 0).unwrap();
    let spend = Transaction::new(
        1,
        vec![TxIn::new(Outpoint::new(funding_id, 0), vec![])],
        vec![
            TxOut::new(vec![script::OP_DUP], 4 * COIN),
            p2pkh_to(&scanner, &change, 6 * COIN - 2_000),
        ],
    );
    mempool.add_transaction(spend.clone(), &mut scanner).unwrap();

    assert!(mempool.is_spent(&Outpoint::new(funding_id, 0)));
    assert_eq!(mempool.balance(101), 6 * COIN - 2_000);
    assert_eq!(mempool.get_debit(&spend), 10 * COIN);
    assert_eq!(mempool.get_credit(&spend), 6 * COIN - 2_000);

    let entry = HistoricalTx::from_transaction(
        mempool.get_transaction(&spend.txid()).unwrap(),
        &mempool,
        &mut scanner,
        ShieldAmounts::default(),
    );
    assert_eq!(entry.tx_type, HistoricalTxType::Sent);
    assert_eq!(entry.amount, -(4 * COIN as i64) - 2_000);
    assert!(!entry.is_to_self);
}

#[test]
fn test_cold_stake_output_recovers_addresses() {
    let mut scanner = scanner();
    let params = scanner.params().clone();
    let owner = scanner.get_address(EXTERNAL, 2).unwrap();
    let staker = address_from_hash(&params, &[0x5a; 20], AddressKind::Staking);

    let mut builder = TransactionBuilder::new(params);
    builder.add_cold_stake_output(&owner, &staker, 3 * COIN, false).unwrap();
    let tx = builder.build().unwrap();
    assert_eq!(tx.vout().len(), 1);

    let (kind, addresses) = scanner.addresses_from_script(&tx.vout()[0].script);
    assert!(matches!(kind, ScriptKind::ColdStake { .. }));
    assert_eq!(addresses, vec![staker, owner]);

    let mut mempool = Mempool::new();
    let mut delegation = tx;
    delegation.block_height = 50;
    mempool.add_transaction(delegation, &mut scanner).unwrap();
    assert_eq!(mempool.cold_balance(60), 3 * COIN);
    assert_eq!(mempool.balance(60), 0);
}

#[test]
fn test_scanner_window_follows_ledger() {
    let mut scanner = scanner();
    let mut mempool = Mempool::new();
    for (i, index) in [5u32, 18, 30, 45].into_iter().enumerate() {
        // each index is inside the window opened by the previous one
        let address = scanner.get_address(EXTERNAL, index).unwrap();
        let tx = confirmed(vec![foreign_input(10 + i as u8)], vec![p2pkh_to(&scanner, &address, 1_000)], 5);
        mempool.add_transaction(tx, &mut scanner).unwrap();

        let state = scanner.chain_state(EXTERNAL).unwrap();
        assert_eq!(state.highest_used_index, index);
        assert!(state.loaded_index >= state.highest_used_index + GAP_LIMIT);
    }
    assert_eq!(mempool.balance(10), 4_000);
}

#[derive(Debug, Clone)]
enum LedgerStep {
    /// Foreign coins paid to one of our receive addresses
    Receive { index: u32, value: u64 },
    /// Spend an output of an earlier transaction, keeping some change
    Spend { pick: usize, vout: u32, change: u64 },
    /// Feed an earlier transaction to the ledger again
    Replay { pick: usize },
}

fn arb_step() -> impl Strategy<Value = LedgerStep> {
    prop_oneof![
        (0u32..10, 1u64..50 * COIN).prop_map(|(index, value)| LedgerStep::Receive { index, value }),
        (any::<usize>(), 0u32..2, 0u64..COIN)
            .prop_map(|(pick, vout, change)| LedgerStep::Spend { pick, vout, change }),
        any::<usize>().prop_map(|pick| LedgerStep::Replay { pick }),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn balance_matches_recomputed_unspent(steps in proptest::collection::vec(arb_step(), 1..24)) {
        let mut scanner = scanner();
        let mut mempool = Mempool::new();
        let mut added: Vec<Transaction> = Vec::new();
        let mut owned: HashMap<Outpoint, u64> = HashMap::new();
        let mut spent: HashSet<Outpoint> = HashSet::new();

        for (i, step) in steps.into_iter().enumerate() {
            let tx = match step {
                LedgerStep::Receive { index, value } => {
                    let address = scanner.get_address(EXTERNAL, index).unwrap();
                    confirmed(
                        vec![TxIn::new(Outpoint::new(Txid([0xee; 32]), i as u32), vec![])],
                        vec![
                            p2pkh_to(&scanner, &address, value),
                            TxOut::new(vec![script::OP_DUP], 1_000),
                        ],
                        10,
                    )
                }
                LedgerStep::Spend { pick, vout, change } => {
                    if added.is_empty() {
                        continue;
                    }
                    let source = added[pick % added.len()].txid();
                    let change_address = scanner.get_address(INTERNAL, i as u32 % 10).unwrap();
                    confirmed(
                        vec![TxIn::new(Outpoint::new(source, vout), vec![])],
                        vec![
                            p2pkh_to(&scanner, &change_address, change + 1),
                            TxOut::new(vec![script::OP_DUP], 2_000 + i as u64),
                        ],
                        10,
                    )
                }
                LedgerStep::Replay { pick } => {
                    if added.is_empty() {
                        continue;
                    }
                    added[pick % added.len()].clone()
                }
            };

            let txid = tx.txid();
            spent.extend(tx.vin().iter().map(|input| input.outpoint));
            owned.insert(Outpoint::new(txid, 0), tx.vout()[0].value);
            mempool.add_transaction(tx.clone(), &mut scanner).unwrap();
            added.push(tx);

            let expected: u64 = owned
                .iter()
                .filter(|(outpoint, _)| !spent.contains(outpoint))
                .map(|(_, value)| value)
                .sum();
            prop_assert_eq!(mempool.balance(1_000), expected);
        }

        let distinct: HashSet<Txid> = added.iter().map(Transaction::txid).collect();
        prop_assert_eq!(mempool.len(), distinct.len());
    }
}
