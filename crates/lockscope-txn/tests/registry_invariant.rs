//! Property tests for the lock table / registry invariant.
//!
//! After any sequence of begin, acquire, release, commit and rollback:
//! 1. every granted lock is owned by an active transaction that records it
//! 2. no key has two incompatible holders
//! 3. every queued request belongs to an active transaction
//! 4. the live transactions report lists two keys per recorded lock

use std::collections::BTreeMap;

use lockscope_common::config::LockscopeConfig;
use lockscope_common::types::{LockKey, TxnId};
use lockscope_txn::{LockMode, TransactionManager, TransactionState, TxnError};
use proptest::prelude::*;

const KEYS: usize = 4;

#[derive(Debug, Clone)]
enum Op {
    Begin,
    Acquire { txn: usize, key: usize, exclusive: bool },
    Release { txn: usize, key: usize },
    Commit { txn: usize },
    Rollback { txn: usize },
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        2 => Just(Op::Begin),
        6 => (0..8usize, 0..KEYS, any::<bool>())
            .prop_map(|(txn, key, exclusive)| Op::Acquire { txn, key, exclusive }),
        2 => (0..8usize, 0..KEYS).prop_map(|(txn, key)| Op::Release { txn, key }),
        1 => (0..8usize).prop_map(|txn| Op::Commit { txn }),
        1 => (0..8usize).prop_map(|txn| Op::Rollback { txn }),
    ]
}

fn key(i: usize) -> LockKey {
    LockKey::from(format!("k{i}"))
}

fn apply(tm: &TransactionManager, txns: &mut Vec<TxnId>, op: &Op) {
    let pick = |txns: &Vec<TxnId>, i: usize| txns.get(i % txns.len().max(1)).copied();
    match *op {
        Op::Begin => txns.push(tm.begin()),
        Op::Acquire { txn, key: k, exclusive } => {
            if let Some(txn) = pick(txns, txn) {
                let mode = if exclusive {
                    LockMode::Exclusive
                } else {
                    LockMode::Shared
                };
                match tm.acquire(txn, key(k), mode) {
                    Ok(_)
                    | Err(TxnError::TransactionNotFound { .. })
                    | Err(TxnError::InvalidState { .. }) => {}
                    Err(err) => panic!("unexpected acquire error: {err}"),
                }
            }
        }
        Op::Release { txn, key: k } => {
            if let Some(txn) = pick(txns, txn) {
                match tm.release(txn, &key(k)) {
                    Ok(()) | Err(TxnError::NotHeld { .. }) => {}
                    Err(err) => panic!("unexpected release error: {err}"),
                }
            }
        }
        Op::Commit { txn } | Op::Rollback { txn } => {
            if let Some(txn) = pick(txns, txn) {
                let result = if matches!(op, Op::Commit { .. }) {
                    tm.commit(txn)
                } else {
                    tm.rollback(txn)
                };
                match result {
                    Ok(()) | Err(TxnError::TransactionNotFound { .. }) => {}
                    Err(err) => panic!("unexpected end error: {err}"),
                }
            }
        }
    }
}

fn check_invariant(tm: &TransactionManager, txns: &[TxnId]) {
    let locks = tm.lock_manager();
    let mut table_locks: BTreeMap<TxnId, usize> = BTreeMap::new();

    for k in 0..KEYS {
        let key = key(k);
        let holders = locks.holders(&key);

        for record in &holders {
            assert_eq!(tm.state(record.owner), Some(TransactionState::Active));
            let recorded = tm.registry().held_locks(record.owner);
            assert!(
                recorded
                    .iter()
                    .any(|r| r.key == key && r.mode == record.mode),
                "holder {} of {key} not recorded in registry",
                record.owner
            );
            *table_locks.entry(record.owner).or_default() += 1;
        }

        for (i, a) in holders.iter().enumerate() {
            for b in &holders[i + 1..] {
                assert!(a.mode.is_compatible_with(&b.mode), "incompatible holders on {key}");
            }
        }

        for entry in locks.waiters(&key) {
            assert_eq!(tm.state(entry.requester), Some(TransactionState::Active));
        }
    }

    for txn in txns {
        let recorded = tm.registry().held_locks(*txn).len();
        assert_eq!(recorded, table_locks.get(txn).copied().unwrap_or(0));
    }

    let report = tm.show_live_transactions(Some(u64::MAX)).unwrap();
    assert!(!report.is_truncated());
    for live in &report.transactions {
        assert_eq!(
            live.row_locks.len(),
            2 * tm.registry().held_locks(live.id).len()
        );
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn registry_matches_lock_table(ops in prop::collection::vec(op_strategy(), 1..80)) {
        let tm = TransactionManager::with_config(LockscopeConfig::for_testing()).unwrap();
        let mut txns = Vec::new();

        for op in &ops {
            apply(&tm, &mut txns, op);
            check_invariant(&tm, &txns);
        }

        // Ending everything leaves no lock state behind.
        for txn in txns.clone() {
            let _ = tm.rollback(txn);
        }
        prop_assert_eq!(tm.lock_manager().lock_count(), 0);
        prop_assert_eq!(tm.active_count(), 0);
    }
}
