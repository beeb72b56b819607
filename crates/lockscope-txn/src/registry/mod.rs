//! Transaction registry.
//!
//! Maps transaction IDs to their lifecycle state and the set of row locks
//! they hold. Each transaction lives behind its own reader-writer lock so a
//! diagnostic reader sees a transaction either before its locks are detached
//! or after, never in between.
//!
//! # Transaction States
//!
//! ```text
//! ┌───────┐    begin()    ┌────────┐
//! │ Start │──────────────▶│ Active │
//! └───────┘               └────────┘
//!                              │
//!                    ┌─────────┴─────────┐
//!                    │                   │
//!               commit()            rollback()
//!                    │                   │
//!                    ▼                   ▼
//!             ┌────────────┐     ┌────────────┐
//!             │ Committing │     │ RolledBack │
//!             └────────────┘     └────────────┘
//!                    │                   │
//!                    └───── removed ─────┘
//!                     (after locks released)
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use dashmap::DashMap;
use lockscope_common::constants::DEFAULT_LOCK_TABLE_SHARDS;
use lockscope_common::types::{LockKey, TxnId};
use parking_lot::RwLock;

use crate::error::{TxnError, TxnResult};
use crate::lock::{LockMode, LockRecord};

/// The state of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    /// Transaction is active and may acquire locks.
    Active,
    /// Transaction is committing; its locks are being released.
    Committing,
    /// Transaction rolled back; its locks are being released.
    RolledBack,
}

impl TransactionState {
    /// Returns true if the transaction can acquire locks.
    pub fn is_active(&self) -> bool {
        *self == TransactionState::Active
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionState::Active => write!(f, "Active"),
            TransactionState::Committing => write!(f, "Committing"),
            TransactionState::RolledBack => write!(f, "RolledBack"),
        }
    }
}

/// The row locks held by one transaction, ordered by key.
#[derive(Debug, Default)]
pub struct LockSet {
    locks: BTreeMap<LockKey, LockMode>,
}

impl LockSet {
    /// Iterates over held locks in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&LockKey, LockMode)> {
        self.locks.iter().map(|(key, mode)| (key, *mode))
    }

    /// Returns the mode held on `key`.
    pub fn get(&self, key: &LockKey) -> Option<LockMode> {
        self.locks.get(key).copied()
    }

    /// Returns the number of held locks.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Returns true if no locks are held.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    fn insert(&mut self, key: LockKey, mode: LockMode) {
        self.locks
            .entry(key)
            .and_modify(|held| *held = held.stronger(mode))
            .or_insert(mode);
    }

    fn remove(&mut self, key: &LockKey) -> Option<LockMode> {
        self.locks.remove(key)
    }

    fn take_keys(&mut self) -> Vec<LockKey> {
        std::mem::take(&mut self.locks).into_keys().collect()
    }
}

#[derive(Debug)]
struct TxnInner {
    state: TransactionState,
    held: LockSet,
    pending: BTreeSet<LockKey>,
}

/// A registered transaction.
#[derive(Debug)]
pub struct TxnHandle {
    id: TxnId,
    inner: RwLock<TxnInner>,
}

impl TxnHandle {
    fn new(id: TxnId) -> Self {
        Self {
            id,
            inner: RwLock::new(TxnInner {
                state: TransactionState::Active,
                held: LockSet::default(),
                pending: BTreeSet::new(),
            }),
        }
    }

    /// Returns the transaction ID.
    pub fn id(&self) -> TxnId {
        self.id
    }

    /// Returns the current state.
    pub fn state(&self) -> TransactionState {
        self.inner.read().state
    }

    /// Returns the number of locks held.
    pub fn held_count(&self) -> usize {
        self.inner.read().held.len()
    }

    /// Runs `f` over the held locks if the transaction is still active.
    ///
    /// The transaction's read guard is held for the duration of `f`, so the
    /// lock set cannot be detached underneath it.
    pub fn with_active_locks<R>(&self, f: impl FnOnce(&LockSet) -> R) -> Option<R> {
        let inner = self.inner.read();
        if !inner.state.is_active() {
            return None;
        }
        Some(f(&inner.held))
    }
}

/// Locks detached from a transaction, to be released by the lock manager.
#[derive(Debug, Default)]
pub struct DetachedLocks {
    /// Keys the transaction held.
    pub held: Vec<LockKey>,
    /// Keys the transaction was still waiting on.
    pub pending: Vec<LockKey>,
}

/// Statistics about the transaction registry.
#[derive(Debug, Default)]
pub struct TransactionStats {
    /// Total transactions started.
    pub started: AtomicU64,
    /// Total transactions committed.
    pub committed: AtomicU64,
    /// Total transactions rolled back.
    pub rolled_back: AtomicU64,
    /// Currently active transactions.
    pub active: AtomicU64,
}

impl TransactionStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Registry of in-flight transactions.
#[derive(Debug)]
pub struct TransactionRegistry {
    /// Registered transactions.
    txns: DashMap<TxnId, Arc<TxnHandle>>,
    /// Next transaction ID.
    next_txn_id: AtomicU64,
    /// Statistics.
    stats: TransactionStats,
}

impl TransactionRegistry {
    /// Creates a registry with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_LOCK_TABLE_SHARDS)
    }

    /// Creates a registry with `shards` shards (a power of two, at least 2).
    ///
    /// Callers validate `shards` first; see [`LockscopeConfig::validate`].
    ///
    /// [`LockscopeConfig::validate`]: lockscope_common::config::LockscopeConfig::validate
    pub(crate) fn with_shards(shards: usize) -> Self {
        Self {
            txns: DashMap::with_shard_amount(shards),
            next_txn_id: AtomicU64::new(TxnId::MIN.as_u64()),
            stats: TransactionStats::new(),
        }
    }

    /// Registers a new active transaction with no locks.
    pub fn begin(&self) -> TxnId {
        let txn_id = TxnId::new(self.next_txn_id.fetch_add(1, AtomicOrdering::SeqCst));
        self.txns.insert(txn_id, Arc::new(TxnHandle::new(txn_id)));

        self.stats.started.fetch_add(1, AtomicOrdering::Relaxed);
        self.stats.active.fetch_add(1, AtomicOrdering::Relaxed);
        txn_id
    }

    /// Returns the handle of a registered transaction.
    pub fn get(&self, txn_id: TxnId) -> TxnResult<Arc<TxnHandle>> {
        self.txns
            .get(&txn_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(TxnError::TransactionNotFound { txn_id })
    }

    /// Returns the state of a registered transaction.
    pub fn state(&self, txn_id: TxnId) -> Option<TransactionState> {
        self.get(txn_id).ok().map(|txn| txn.state())
    }

    /// Fails unless the transaction exists and is active.
    pub fn ensure_active(&self, txn_id: TxnId) -> TxnResult<()> {
        let state = self.get(txn_id)?.state();
        if state.is_active() {
            Ok(())
        } else {
            Err(invalid_state(txn_id, state))
        }
    }

    /// Records a granted lock in the transaction's held set.
    ///
    /// Fails if the transaction has finished in the meantime; the caller then
    /// owns the grant and must release it.
    pub fn attach_lock(&self, txn_id: TxnId, key: LockKey, mode: LockMode) -> TxnResult<()> {
        let txn = self.get(txn_id)?;
        let mut inner = txn.inner.write();
        if !inner.state.is_active() {
            return Err(invalid_state(txn_id, inner.state));
        }
        inner.pending.remove(&key);
        inner.held.insert(key, mode);
        Ok(())
    }

    /// Removes a lock from the transaction's held set.
    pub fn detach_lock(&self, txn_id: TxnId, key: &LockKey) -> Option<LockMode> {
        let txn = self.get(txn_id).ok()?;
        let mut inner = txn.inner.write();
        inner.held.remove(key)
    }

    /// Records that the transaction is queued on `key`.
    pub fn note_pending(&self, txn_id: TxnId, key: LockKey) -> TxnResult<()> {
        let txn = self.get(txn_id)?;
        let mut inner = txn.inner.write();
        if !inner.state.is_active() {
            return Err(invalid_state(txn_id, inner.state));
        }
        inner.pending.insert(key);
        Ok(())
    }

    /// Forgets that the transaction is queued on `key`.
    pub fn clear_pending(&self, txn_id: TxnId, key: &LockKey) {
        if let Ok(txn) = self.get(txn_id) {
            txn.inner.write().pending.remove(key);
        }
    }

    /// Detaches every held and pending lock of an active transaction,
    /// leaving it active.
    pub fn take_locks(&self, txn_id: TxnId) -> TxnResult<DetachedLocks> {
        let txn = self.get(txn_id)?;
        let mut inner = txn.inner.write();
        if !inner.state.is_active() {
            return Err(invalid_state(txn_id, inner.state));
        }
        Ok(detach(&mut inner))
    }

    /// Ends an active transaction.
    ///
    /// The state flip and the detach of its lock sets happen under one write
    /// guard. The entry stays registered until [`remove`](Self::remove) is
    /// called once the detached locks have been released.
    pub fn finish(&self, txn_id: TxnId, next: TransactionState) -> TxnResult<DetachedLocks> {
        debug_assert!(!next.is_active());
        let txn = self.get(txn_id)?;
        let mut inner = txn.inner.write();
        if !inner.state.is_active() {
            return Err(invalid_state(txn_id, inner.state));
        }
        inner.state = next;
        Ok(detach(&mut inner))
    }

    /// Unregisters a finished transaction.
    pub fn remove(&self, txn_id: TxnId) -> Option<Arc<TxnHandle>> {
        let (_, txn) = self.txns.remove(&txn_id)?;
        match txn.state() {
            TransactionState::Committing => {
                self.stats.committed.fetch_add(1, AtomicOrdering::Relaxed);
            }
            TransactionState::RolledBack => {
                self.stats.rolled_back.fetch_add(1, AtomicOrdering::Relaxed);
            }
            TransactionState::Active => {}
        }
        self.stats.active.fetch_sub(1, AtomicOrdering::Relaxed);
        Some(txn)
    }

    /// Returns the locks a transaction holds.
    pub fn held_locks(&self, txn_id: TxnId) -> Vec<LockRecord> {
        let Ok(txn) = self.get(txn_id) else {
            return Vec::new();
        };
        let inner = txn.inner.read();
        inner
            .held
            .iter()
            .map(|(key, mode)| LockRecord {
                key: key.clone(),
                mode,
                owner: txn_id,
            })
            .collect()
    }

    /// Lists active transactions in ID order.
    ///
    /// Only handles are captured; each transaction's state and locks are read
    /// when the sequence reaches it.
    pub fn list_active(&self) -> ActiveTransactions {
        let mut handles: Vec<Arc<TxnHandle>> = self
            .txns
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        handles.sort_by_key(|txn| txn.id);
        ActiveTransactions { handles }
    }

    /// Returns the number of registered transactions.
    pub fn len(&self) -> usize {
        self.txns.len()
    }

    /// Returns true if no transaction is registered.
    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    /// Returns statistics.
    pub fn stats(&self) -> &TransactionStats {
        &self.stats
    }
}

impl Default for TransactionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_state(txn_id: TxnId, current: TransactionState) -> TxnError {
    TxnError::InvalidState {
        txn_id,
        current,
        expected: "Active",
    }
}

fn detach(inner: &mut TxnInner) -> DetachedLocks {
    DetachedLocks {
        held: inner.held.take_keys(),
        pending: std::mem::take(&mut inner.pending).into_iter().collect(),
    }
}

/// Restartable sequence over the transactions registered at listing time.
///
/// Iteration yields every captured handle; use
/// [`TxnHandle::with_active_locks`] to read one only if it is still active.
#[derive(Debug, Clone)]
pub struct ActiveTransactions {
    handles: Vec<Arc<TxnHandle>>,
}

impl ActiveTransactions {
    /// Iterates over the captured transactions in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<TxnHandle>> {
        self.handles.iter()
    }

    /// Returns the number of captured transactions.
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

impl<'a> IntoIterator for &'a ActiveTransactions {
    type Item = &'a Arc<TxnHandle>;
    type IntoIter = std::slice::Iter<'a, Arc<TxnHandle>>;

    fn into_iter(self) -> Self::IntoIter {
        self.handles.iter()
    }
}
