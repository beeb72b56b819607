//! Synthetic lock workloads.
//!
//! Builds lock state on an in-process transaction manager so the diagnostic
//! reports have something to describe.

use anyhow::{Context, Result};
use lockscope_common::types::{LockKey, TxnId};
use lockscope_txn::{LockMode, TransactionManager};
use tracing::info;

/// Builds a printable key of exactly `size` bytes, unique per `index`.
pub fn padded_key(index: usize, size: usize) -> LockKey {
    let mut key = format!("{index:08}-").into_bytes();
    key.resize(size.max(key.len()), b'x');
    LockKey::from_vec(key)
}

/// Starts `txns` transactions that each lock `locks` distinct keys.
pub fn hold_row_locks(
    tm: &TransactionManager,
    txns: usize,
    locks: usize,
    key_size: usize,
) -> Result<Vec<TxnId>> {
    let mut started = Vec::with_capacity(txns);
    for t in 0..txns {
        let txn = tm.begin();
        for i in 0..locks {
            tm.lock(txn, padded_key(t * locks + i, key_size), LockMode::Exclusive)
                .with_context(|| format!("transaction {txn} failed to lock row {i}"))?;
        }
        started.push(txn);
    }
    info!(txns, locks, key_size, "row lock workload ready");
    Ok(started)
}

/// Locks one key exclusively and queues `waiters` shared requests behind it.
pub fn queue_waiters(tm: &TransactionManager, waiters: usize, key_size: usize) -> Result<TxnId> {
    let key = padded_key(0, key_size);
    let holder = tm.begin();
    tm.lock(holder, key.clone(), LockMode::Exclusive)
        .context("holder failed to lock the contended key")?;

    for _ in 0..waiters {
        let txn = tm.begin();
        // Non-blocking: the request stays queued.
        tm.acquire(txn, key.clone(), LockMode::Shared)
            .with_context(|| format!("transaction {txn} failed to queue"))?;
    }
    info!(waiters, key_size, "pending request workload ready");
    Ok(holder)
}
