//! Row lock management.
//!
//! The lock manager grants, blocks and releases row locks:
//! - Granted locks live in the key's [`HolderSet`] and in the owner's
//!   registry entry
//! - Blocked requests wait in the key's FIFO [`WaitQueue`]
//! - Releasing a lock promotes compatible waiters from the head of the queue
//!
//! # Lock Ordering
//!
//! A key's critical section is always entered before a transaction's registry
//! entry, and the registry never calls back into the lock table. Every change
//! to a key's holders is mirrored in the owner's registry entry before the
//! critical section ends, so the two never disagree about an active
//! transaction. A promotion to a transaction that finished while queued is
//! dropped in the same critical section.

mod record;
mod table;
mod wait;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::Duration;

use lockscope_common::types::{LockKey, TxnId};
use tracing::{debug, trace, warn};

use crate::error::{TxnError, TxnResult};
use crate::registry::{DetachedLocks, TransactionRegistry};

pub use record::{HolderSet, LockMode, LockRecord};
pub use table::{LockSlot, LockTable, PendingQueues, SlotState};
pub use wait::{GrantSignal, LockWaiter, WaitEntry, WaitOutcome, WaitQueue};

/// Result of a lock acquisition attempt.
#[derive(Debug, Clone)]
pub enum LockResult {
    /// Lock was granted immediately.
    Granted,
    /// Transaction already holds the lock in a covering mode.
    AlreadyHeld,
    /// Request is queued; park on the waiter to learn the outcome.
    Blocked(LockWaiter),
}

impl LockResult {
    /// Returns true if the lock is held after the call.
    pub fn is_success(&self) -> bool {
        matches!(self, LockResult::Granted | LockResult::AlreadyHeld)
    }

    /// Returns the waiter if the request is blocked.
    pub fn waiter(&self) -> Option<&LockWaiter> {
        match self {
            LockResult::Blocked(waiter) => Some(waiter),
            _ => None,
        }
    }
}

/// Statistics about the lock manager.
#[derive(Debug, Default)]
pub struct LockStats {
    /// Total lock acquisitions granted immediately.
    pub acquisitions: AtomicU64,
    /// Total lock releases.
    pub releases: AtomicU64,
    /// Total requests that had to wait.
    pub waits: AtomicU64,
    /// Total waiters promoted to holders.
    pub promotions: AtomicU64,
    /// Total waits cancelled.
    pub cancellations: AtomicU64,
    /// Total waits that timed out.
    pub timeouts: AtomicU64,
    /// Total releases of locks that were not held.
    pub not_held: AtomicU64,
}

impl LockStats {
    /// Creates new stats.
    pub fn new() -> Self {
        Self::default()
    }

    fn record(counter: &AtomicU64) {
        counter.fetch_add(1, AtomicOrdering::Relaxed);
    }
}

enum Decision {
    Granted,
    AlreadyHeld,
    Blocked(WaitEntry),
}

/// The lock manager for row locks.
pub struct LockManager {
    /// Per-key holders and wait queues.
    table: LockTable,
    /// Owners of granted locks.
    registry: Arc<TransactionRegistry>,
    /// Next wait queue sequence number.
    next_seq: AtomicU64,
    /// Statistics.
    stats: LockStats,
}

impl LockManager {
    /// Creates a lock manager over `registry` with the default shard count.
    pub fn new(registry: Arc<TransactionRegistry>) -> Self {
        Self::with_table(registry, LockTable::new())
    }

    /// Creates a lock manager over `registry` using `table`.
    pub fn with_table(registry: Arc<TransactionRegistry>, table: LockTable) -> Self {
        Self {
            table,
            registry,
            next_seq: AtomicU64::new(1),
            stats: LockStats::new(),
        }
    }

    /// Tries to acquire a lock without blocking.
    ///
    /// Grants immediately when `mode` is compatible with every other holder
    /// of `key` and no earlier request is queued on it. Otherwise appends a
    /// wait entry and returns [`LockResult::Blocked`]; the caller parks with
    /// [`wait_for_grant`](Self::wait_for_grant).
    ///
    /// This is stricter than holder compatibility alone: a transaction that
    /// does not hold `key` queues behind any waiting request, even when its
    /// mode would share with the current holders.
    pub fn acquire(&self, txn_id: TxnId, key: LockKey, mode: LockMode) -> TxnResult<LockResult> {
        self.registry.ensure_active(txn_id)?;

        let decision = self.table.with_slot(&key, |slot| -> TxnResult<Decision> {
            let held = slot.holders.mode_of(txn_id);
            if held.is_some_and(|held| held.covers(&mode)) {
                return Ok(Decision::AlreadyHeld);
            }
            let first_in_line = held.is_some() || slot.waiters.is_empty();
            if first_in_line && slot.holders.is_compatible(txn_id, mode) {
                self.registry.attach_lock(txn_id, key.clone(), mode)?;
                slot.holders.grant(txn_id, mode);
                let superseded = slot.waiters.remove_requester(txn_id);
                for entry in &superseded {
                    entry.signal.resolve(WaitOutcome::Granted);
                }
                if !superseded.is_empty() {
                    self.promote(&key, slot);
                }
                return Ok(Decision::Granted);
            }
            // One queued request per transaction and key.
            if let Some(queued) = slot.waiters.find_requester_mut(txn_id) {
                queued.mode = queued.mode.stronger(mode);
                return Ok(Decision::Blocked(queued.clone()));
            }
            self.registry.note_pending(txn_id, key.clone())?;
            let seq = self.next_seq.fetch_add(1, AtomicOrdering::Relaxed);
            let entry = WaitEntry::new(key.clone(), mode, txn_id, seq);
            slot.waiters.enqueue(entry.clone());
            Ok(Decision::Blocked(entry))
        });

        match decision {
            Ok(Decision::AlreadyHeld) => Ok(LockResult::AlreadyHeld),
            Ok(Decision::Granted) => {
                LockStats::record(&self.stats.acquisitions);
                trace!(txn = %txn_id, key = %key, mode = %mode, "lock granted");
                Ok(LockResult::Granted)
            }
            Ok(Decision::Blocked(entry)) => {
                LockStats::record(&self.stats.waits);
                debug!(txn = %txn_id, key = %key, mode = %mode, seq = entry.enqueued_at, "lock request blocked");
                Ok(LockResult::Blocked(LockWaiter::from_entry(&entry)))
            }
            Err(err) => {
                // Finished between the activity check and the critical section.
                self.table.retire_if_free(&key);
                Err(err)
            }
        }
    }

    /// Parks until a blocked request is granted, cancelled, or `timeout`
    /// elapses. `None` waits indefinitely.
    pub fn wait_for_grant(&self, waiter: &LockWaiter, timeout: Option<Duration>) -> TxnResult<()> {
        let outcome = match timeout {
            None => waiter.signal.wait(),
            Some(timeout) => match waiter.signal.wait_for(timeout) {
                WaitOutcome::Pending => self.abandon(waiter),
                outcome => outcome,
            },
        };

        match outcome {
            WaitOutcome::Granted => Ok(()),
            WaitOutcome::Cancelled => Err(TxnError::WaitCancelled {
                txn_id: waiter.txn_id,
                key: waiter.key.clone(),
            }),
            WaitOutcome::TimedOut => Err(TxnError::WaitTimeout {
                txn_id: waiter.txn_id,
                key: waiter.key.clone(),
                timeout_ms: timeout.map_or(0, |t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX)),
            }),
            WaitOutcome::Pending => Err(TxnError::internal("lock wait resolved as pending")),
        }
    }

    /// Releases one lock and promotes waiters on its key.
    ///
    /// Releasing a lock the transaction does not hold changes nothing and
    /// returns [`TxnError::NotHeld`].
    pub fn release(&self, txn_id: TxnId, key: &LockKey) -> TxnResult<()> {
        if !self.release_key(txn_id, key) {
            LockStats::record(&self.stats.not_held);
            debug!(txn = %txn_id, key = %key, "release of lock not held");
            return Err(TxnError::NotHeld {
                txn_id,
                key: key.clone(),
            });
        }
        Ok(())
    }

    /// Releases every lock held by an active transaction and cancels its
    /// queued requests. Returns the number of locks released.
    pub fn release_all(&self, txn_id: TxnId) -> TxnResult<usize> {
        let detached = self.registry.take_locks(txn_id)?;
        Ok(self.release_detached(txn_id, detached))
    }

    /// Releases locks already detached from a transaction's registry entry.
    pub fn release_detached(&self, txn_id: TxnId, detached: DetachedLocks) -> usize {
        for key in &detached.pending {
            self.cancel_wait(txn_id, key);
        }
        let released = detached
            .held
            .iter()
            .filter(|key| self.release_key(txn_id, key))
            .count();
        debug!(txn = %txn_id, released, "released transaction locks");
        released
    }

    /// Cancels the transaction's queued requests on `key`, waking their
    /// waiters with [`WaitOutcome::Cancelled`]. Returns true if any were queued.
    pub fn cancel_wait(&self, txn_id: TxnId, key: &LockKey) -> bool {
        let removed = self.withdraw(key, |queue| {
            let removed = queue.remove_requester(txn_id);
            self.registry.clear_pending(txn_id, key);
            removed
        });
        for entry in &removed {
            entry.signal.resolve(WaitOutcome::Cancelled);
            LockStats::record(&self.stats.cancellations);
        }
        !removed.is_empty()
    }

    /// Returns the locks currently granted on `key`.
    pub fn holders(&self, key: &LockKey) -> Vec<LockRecord> {
        self.table.holders(key)
    }

    /// Returns the requests currently queued on `key`, in FIFO order.
    pub fn waiters(&self, key: &LockKey) -> Vec<WaitEntry> {
        self.table.waiters(key)
    }

    /// Lists every key's wait queue.
    pub fn pending_queues(&self) -> PendingQueues {
        self.table.pending_queues()
    }

    /// Returns the number of keys that are held or awaited.
    pub fn lock_count(&self) -> usize {
        self.table.len()
    }

    /// Returns statistics about the lock manager.
    pub fn stats(&self) -> &LockStats {
        &self.stats
    }

    /// Returns the transaction registry.
    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.registry
    }

    /// Removes `txn_id`'s grant on `key`, detaches it from the registry and
    /// promotes waiters, all in the key's critical section.
    fn release_key(&self, txn_id: TxnId, key: &LockKey) -> bool {
        let released = self
            .table
            .with_existing_slot(key, |slot| {
                if slot.holders.remove(txn_id).is_none() {
                    return false;
                }
                self.registry.detach_lock(txn_id, key);
                self.promote(key, slot);
                true
            })
            .unwrap_or(false);

        if released {
            LockStats::record(&self.stats.releases);
            self.table.retire_if_free(key);
        }
        released
    }

    /// Removes queued entries selected by `select`, then promotes whatever
    /// the removal unblocked. Returns the removed entries.
    fn withdraw(
        &self,
        key: &LockKey,
        select: impl FnOnce(&mut WaitQueue) -> Vec<WaitEntry>,
    ) -> Vec<WaitEntry> {
        let removed = self
            .table
            .with_existing_slot(key, |slot| {
                let removed = select(&mut slot.waiters);
                if !removed.is_empty() {
                    self.promote(key, slot);
                }
                removed
            })
            .unwrap_or_default();
        self.table.retire_if_free(key);
        removed
    }

    /// Grants compatible requests from the head of `slot`'s queue and
    /// attaches them to their transactions. Runs inside the key's critical
    /// section.
    ///
    /// A promoted requester that finished while queued cannot own the grant;
    /// it is dropped again, which may promote the next entries in line.
    fn promote(&self, key: &LockKey, slot: &mut SlotState) {
        loop {
            let promoted = slot.waiters.dequeue_if_compatible(&mut slot.holders);
            if promoted.is_empty() {
                return;
            }
            let mut orphaned = false;
            for entry in promoted {
                match self
                    .registry
                    .attach_lock(entry.requester, key.clone(), entry.mode)
                {
                    Ok(()) => {
                        entry.signal.resolve(WaitOutcome::Granted);
                        LockStats::record(&self.stats.promotions);
                        debug!(txn = %entry.requester, key = %key, mode = %entry.mode, seq = entry.enqueued_at, "lock request promoted");
                    }
                    Err(err) => {
                        slot.holders.remove(entry.requester);
                        entry.signal.resolve(WaitOutcome::Cancelled);
                        LockStats::record(&self.stats.cancellations);
                        warn!(txn = %entry.requester, key = %key, error = %err, "dropping lock promoted to finished transaction");
                        orphaned = true;
                    }
                }
            }
            if !orphaned {
                return;
            }
        }
    }

    /// Withdraws a timed-out request, unless it was resolved concurrently.
    fn abandon(&self, waiter: &LockWaiter) -> WaitOutcome {
        let seq = waiter.enqueued_at;
        let removed = self.withdraw(&waiter.key, |queue| {
            let removed: Vec<WaitEntry> = queue.remove_seq(seq).into_iter().collect();
            if !removed.is_empty() {
                self.registry.clear_pending(waiter.txn_id, &waiter.key);
            }
            removed
        });
        if removed.is_empty() {
            // Already dequeued; its resolution is in flight.
            return waiter.signal.wait();
        }
        LockStats::record(&self.stats.timeouts);
        if waiter.signal.resolve(WaitOutcome::TimedOut) {
            WaitOutcome::TimedOut
        } else {
            waiter.signal.outcome()
        }
    }
}

impl fmt::Debug for LockManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockManager")
            .field("lock_count", &self.lock_count())
            .field("txn_count", &self.registry.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn setup() -> (Arc<TransactionRegistry>, LockManager) {
        let registry = Arc::new(TransactionRegistry::with_shards(4));
        let lm = LockManager::with_table(Arc::clone(&registry), LockTable::with_shards(4));
        (registry, lm)
    }

    fn key(s: &str) -> LockKey {
        LockKey::from(s)
    }

    #[test]
    fn test_lock_manager_basic() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();

        let result = lm.acquire(txn1, key("key1"), LockMode::Shared).unwrap();
        assert!(matches!(result, LockResult::Granted));

        // Same lock again
        let result = lm.acquire(txn1, key("key1"), LockMode::Shared).unwrap();
        assert!(matches!(result, LockResult::AlreadyHeld));

        assert_eq!(registry.held_locks(txn1).len(), 1);
        lm.release(txn1, &key("key1")).unwrap();
        assert!(registry.held_locks(txn1).is_empty());
        assert_eq!(lm.lock_count(), 0);
    }

    #[test]
    fn test_shared_locks_concurrent() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();
        let txn2 = registry.begin();

        assert!(lm.acquire(txn1, key("key1"), LockMode::Shared).unwrap().is_success());
        assert!(lm.acquire(txn2, key("key1"), LockMode::Shared).unwrap().is_success());

        assert_eq!(lm.holders(&key("key1")).len(), 2);
        assert_eq!(lm.lock_count(), 1);
    }

    #[test]
    fn test_exclusive_blocks_shared() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();
        let txn2 = registry.begin();

        lm.acquire(txn1, key("key1"), LockMode::Exclusive).unwrap();
        let result = lm.acquire(txn2, key("key1"), LockMode::Shared).unwrap();
        let waiter = result.waiter().cloned().unwrap();
        assert_eq!(waiter.outcome(), WaitOutcome::Pending);
        assert_eq!(waiter.txn_id(), txn2);
        assert_eq!(waiter.mode(), LockMode::Shared);
        assert_eq!(waiter.key(), &key("key1"));
        let queued = lm.waiters(&key("key1"));
        assert_eq!(queued.len(), 1);
        assert_eq!(queued[0].enqueued_at, waiter.enqueued_at());

        // Releasing the exclusive lock promotes txn2 from the wait queue.
        lm.release(txn1, &key("key1")).unwrap();
        assert_eq!(waiter.outcome(), WaitOutcome::Granted);
        lm.wait_for_grant(&waiter, None).unwrap();

        let result = lm.acquire(txn2, key("key1"), LockMode::Shared).unwrap();
        assert!(matches!(result, LockResult::AlreadyHeld));
        assert_eq!(registry.held_locks(txn2).len(), 1);
    }

    #[test]
    fn test_holder_strengthens_mode() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();

        lm.acquire(txn1, key("key1"), LockMode::Shared).unwrap();
        let result = lm.acquire(txn1, key("key1"), LockMode::Exclusive).unwrap();
        assert!(matches!(result, LockResult::Granted));
        assert_eq!(registry.held_locks(txn1)[0].mode, LockMode::Exclusive);
        assert_eq!(lm.holders(&key("key1"))[0].mode, LockMode::Exclusive);
    }

    #[test]
    fn test_fifo_blocks_later_compatible_request() {
        let (registry, lm) = setup();
        let holder = registry.begin();
        let writer = registry.begin();
        let reader = registry.begin();

        lm.acquire(holder, key("k"), LockMode::Shared).unwrap();
        let w = lm.acquire(writer, key("k"), LockMode::Exclusive).unwrap();
        assert!(w.waiter().is_some());

        // Compatible with the holder, but queued behind the writer.
        let r = lm.acquire(reader, key("k"), LockMode::Shared).unwrap();
        assert!(r.waiter().is_some());

        lm.release(holder, &key("k")).unwrap();
        assert_eq!(w.waiter().unwrap().outcome(), WaitOutcome::Granted);
        assert_eq!(r.waiter().unwrap().outcome(), WaitOutcome::Pending);

        lm.release(writer, &key("k")).unwrap();
        assert_eq!(r.waiter().unwrap().outcome(), WaitOutcome::Granted);
    }

    #[test]
    fn test_repeated_request_shares_queue_entry() {
        let (registry, lm) = setup();
        let holder = registry.begin();
        let txn2 = registry.begin();

        lm.acquire(holder, key("k"), LockMode::Shared).unwrap();
        let first = lm.acquire(txn2, key("k"), LockMode::Exclusive).unwrap();
        lm.acquire(txn2, key("k"), LockMode::Exclusive).unwrap();
        assert_eq!(lm.waiters(&key("k")).len(), 1);

        lm.release(holder, &key("k")).unwrap();
        assert_eq!(first.waiter().unwrap().outcome(), WaitOutcome::Granted);
        assert!(lm.waiters(&key("k")).is_empty());
    }

    #[test]
    fn test_release_promotes_own_upgrade() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();
        let txn2 = registry.begin();

        lm.acquire(txn1, key("k"), LockMode::Shared).unwrap();
        lm.acquire(txn2, key("k"), LockMode::Shared).unwrap();
        let upgrade = lm.acquire(txn1, key("k"), LockMode::Exclusive).unwrap();
        assert!(upgrade.waiter().is_some());

        lm.release(txn2, &key("k")).unwrap();
        assert_eq!(upgrade.waiter().unwrap().outcome(), WaitOutcome::Granted);
        assert_eq!(registry.held_locks(txn1).len(), 1);
        assert_eq!(registry.held_locks(txn1)[0].mode, LockMode::Exclusive);
        assert_eq!(lm.holders(&key("k"))[0].mode, LockMode::Exclusive);
    }

    #[test]
    fn test_release_not_held() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();
        let txn2 = registry.begin();
        lm.acquire(txn1, key("key1"), LockMode::Exclusive).unwrap();

        let err = lm.release(txn2, &key("key1")).unwrap_err();
        assert!(matches!(err, TxnError::NotHeld { .. }));
        let err = lm.release(txn2, &key("missing")).unwrap_err();
        assert!(matches!(err, TxnError::NotHeld { .. }));

        // Nothing changed for the real holder.
        assert_eq!(lm.holders(&key("key1"))[0].owner, txn1);
        assert_eq!(lm.stats().not_held.load(AtomicOrdering::Relaxed), 2);
    }

    #[test]
    fn test_release_all() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();

        lm.acquire(txn1, key("key1"), LockMode::Shared).unwrap();
        lm.acquire(txn1, key("key2"), LockMode::Exclusive).unwrap();
        lm.acquire(txn1, key("key3"), LockMode::Shared).unwrap();
        assert_eq!(registry.held_locks(txn1).len(), 3);

        let released = lm.release_all(txn1).unwrap();
        assert_eq!(released, 3);
        assert!(registry.held_locks(txn1).is_empty());
        assert_eq!(lm.lock_count(), 0);
    }

    #[test]
    fn test_acquire_requires_active_transaction() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();
        registry
            .finish(txn1, crate::registry::TransactionState::Committing)
            .unwrap();

        let err = lm.acquire(txn1, key("k"), LockMode::Shared).unwrap_err();
        assert!(matches!(err, TxnError::InvalidState { .. }));

        let err = lm
            .acquire(TxnId::new(999), key("k"), LockMode::Shared)
            .unwrap_err();
        assert!(matches!(err, TxnError::TransactionNotFound { .. }));
        assert_eq!(lm.lock_count(), 0);
    }

    #[test]
    fn test_cancel_wait_promotes_next() {
        let (registry, lm) = setup();
        let holder = registry.begin();
        let writer = registry.begin();
        let reader = registry.begin();

        lm.acquire(holder, key("k"), LockMode::Shared).unwrap();
        let w = lm.acquire(writer, key("k"), LockMode::Exclusive).unwrap();
        let r = lm.acquire(reader, key("k"), LockMode::Shared).unwrap();

        // Cancelling the writer lets the reader share with the holder.
        assert!(lm.cancel_wait(writer, &key("k")));
        assert_eq!(w.waiter().unwrap().outcome(), WaitOutcome::Cancelled);
        assert_eq!(r.waiter().unwrap().outcome(), WaitOutcome::Granted);
        assert!(!lm.cancel_wait(writer, &key("k")));

        let err = lm.wait_for_grant(w.waiter().unwrap(), None).unwrap_err();
        assert!(matches!(err, TxnError::WaitCancelled { .. }));
    }

    #[test]
    fn test_wait_timeout_withdraws_entry() {
        let (registry, lm) = setup();
        let holder = registry.begin();
        let waiter_txn = registry.begin();

        lm.acquire(holder, key("k"), LockMode::Exclusive).unwrap();
        let result = lm.acquire(waiter_txn, key("k"), LockMode::Exclusive).unwrap();
        let waiter = result.waiter().unwrap();

        let err = lm
            .wait_for_grant(waiter, Some(Duration::from_millis(20)))
            .unwrap_err();
        assert!(matches!(err, TxnError::WaitTimeout { timeout_ms: 20, .. }));
        assert!(lm.waiters(&key("k")).is_empty());
        assert_eq!(lm.stats().timeouts.load(AtomicOrdering::Relaxed), 1);

        // The holder's release no longer promotes the abandoned request.
        lm.release(holder, &key("k")).unwrap();
        assert!(registry.held_locks(waiter_txn).is_empty());
        assert_eq!(lm.lock_count(), 0);
    }

    #[test]
    fn test_promotion_to_finished_transaction_is_released() {
        let (registry, lm) = setup();
        let holder = registry.begin();
        let gone = registry.begin();
        let next = registry.begin();

        lm.acquire(holder, key("k"), LockMode::Exclusive).unwrap();
        let g = lm.acquire(gone, key("k"), LockMode::Exclusive).unwrap();
        let n = lm.acquire(next, key("k"), LockMode::Exclusive).unwrap();

        // Finish `gone` without cancelling its queued request.
        registry
            .finish(gone, crate::registry::TransactionState::RolledBack)
            .unwrap();

        lm.release(holder, &key("k")).unwrap();
        assert_eq!(g.waiter().unwrap().outcome(), WaitOutcome::Cancelled);
        assert_eq!(n.waiter().unwrap().outcome(), WaitOutcome::Granted);
        assert_eq!(lm.holders(&key("k")).len(), 1);
        assert_eq!(lm.holders(&key("k"))[0].owner, next);
    }

    #[test]
    fn test_blocked_thread_resumes_on_release() {
        let registry = Arc::new(TransactionRegistry::with_shards(4));
        let lm = Arc::new(LockManager::with_table(
            Arc::clone(&registry),
            LockTable::with_shards(4),
        ));
        let holder = registry.begin();
        let waiter_txn = registry.begin();
        lm.acquire(holder, key("k"), LockMode::Exclusive).unwrap();

        let result = lm.acquire(waiter_txn, key("k"), LockMode::Exclusive).unwrap();
        let waiter = result.waiter().cloned().unwrap();
        let parked_lm = Arc::clone(&lm);
        let handle = thread::spawn(move || parked_lm.wait_for_grant(&waiter, None));

        thread::sleep(Duration::from_millis(10));
        lm.release(holder, &key("k")).unwrap();
        handle.join().unwrap().unwrap();
        assert_eq!(registry.held_locks(waiter_txn).len(), 1);
    }

    #[test]
    fn test_lock_stats() {
        let (registry, lm) = setup();
        let txn1 = registry.begin();

        lm.acquire(txn1, key("key1"), LockMode::Shared).unwrap();
        assert_eq!(lm.stats().acquisitions.load(AtomicOrdering::Relaxed), 1);

        lm.release(txn1, &key("key1")).unwrap();
        assert_eq!(lm.stats().releases.load(AtomicOrdering::Relaxed), 1);
    }
}
