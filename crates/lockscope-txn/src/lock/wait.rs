//! Wait queues for blocked lock requests.
//!
//! Every contended key owns a FIFO queue of [`WaitEntry`] values. A blocked
//! requester parks on the entry's [`GrantSignal`] until the lock manager
//! promotes it, cancels it, or the requester gives up after a timeout.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use lockscope_common::types::{LockKey, TxnId};
use parking_lot::{Condvar, Mutex};

use super::record::{HolderSet, LockMode};

/// How a blocked request was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Still queued.
    Pending,
    /// The lock was granted.
    Granted,
    /// The request was cancelled (requester aborted or was rolled back).
    Cancelled,
    /// The requester stopped waiting after its timeout.
    TimedOut,
}

/// One-shot notification shared by a wait entry and its waiter.
pub struct GrantSignal {
    outcome: Mutex<WaitOutcome>,
    resolved: Condvar,
}

impl GrantSignal {
    /// Creates a pending signal.
    pub fn new() -> Self {
        Self {
            outcome: Mutex::new(WaitOutcome::Pending),
            resolved: Condvar::new(),
        }
    }

    /// Returns the current outcome.
    pub fn outcome(&self) -> WaitOutcome {
        *self.outcome.lock()
    }

    /// Resolves the signal and wakes the waiter.
    ///
    /// Only the first resolution sticks; returns false if already resolved.
    pub fn resolve(&self, outcome: WaitOutcome) -> bool {
        let mut current = self.outcome.lock();
        if *current != WaitOutcome::Pending {
            return false;
        }
        *current = outcome;
        self.resolved.notify_all();
        true
    }

    /// Parks until resolved.
    pub fn wait(&self) -> WaitOutcome {
        let mut current = self.outcome.lock();
        while *current == WaitOutcome::Pending {
            self.resolved.wait(&mut current);
        }
        *current
    }

    /// Parks until resolved or `timeout` elapses; returns `Pending` on timeout.
    pub fn wait_for(&self, timeout: Duration) -> WaitOutcome {
        let mut current = self.outcome.lock();
        if *current == WaitOutcome::Pending {
            self.resolved.wait_while_for(
                &mut current,
                |outcome| *outcome == WaitOutcome::Pending,
                timeout,
            );
        }
        *current
    }
}

impl Default for GrantSignal {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for GrantSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GrantSignal")
            .field("outcome", &self.outcome())
            .finish()
    }
}

/// A blocked lock request.
#[derive(Debug, Clone)]
pub struct WaitEntry {
    /// The requested key.
    pub key: LockKey,
    /// Requested lock mode.
    pub mode: LockMode,
    /// Transaction requesting the lock.
    pub requester: TxnId,
    /// Global enqueue sequence number.
    pub enqueued_at: u64,
    /// Wakes the requester once resolved.
    pub signal: Arc<GrantSignal>,
}

impl WaitEntry {
    /// Creates a new wait entry with a fresh signal.
    pub fn new(key: LockKey, mode: LockMode, requester: TxnId, enqueued_at: u64) -> Self {
        Self {
            key,
            mode,
            requester,
            enqueued_at,
            signal: Arc::new(GrantSignal::new()),
        }
    }
}

/// FIFO queue of blocked requests for one key.
#[derive(Debug, Default)]
pub struct WaitQueue {
    entries: VecDeque<WaitEntry>,
}

impl WaitQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a blocked request.
    pub fn enqueue(&mut self, entry: WaitEntry) {
        self.entries.push_back(entry);
    }

    /// Promotes requests from the front of the queue.
    ///
    /// Pops while the head is compatible with `holders`, granting each
    /// promoted request into `holders` so later entries are checked against
    /// it too. Stops at the first incompatible request.
    pub fn dequeue_if_compatible(&mut self, holders: &mut HolderSet) -> Vec<WaitEntry> {
        let mut promoted = Vec::new();
        while let Some(head) = self.entries.front() {
            if !holders.is_compatible(head.requester, head.mode) {
                break;
            }
            if let Some(entry) = self.entries.pop_front() {
                holders.grant(entry.requester, entry.mode);
                promoted.push(entry);
            }
        }
        promoted
    }

    /// Removes the entry with the given sequence number.
    pub fn remove_seq(&mut self, enqueued_at: u64) -> Option<WaitEntry> {
        let pos = self
            .entries
            .iter()
            .position(|e| e.enqueued_at == enqueued_at)?;
        self.entries.remove(pos)
    }

    /// Returns the entry queued by `requester`, if any.
    pub fn find_requester_mut(&mut self, requester: TxnId) -> Option<&mut WaitEntry> {
        self.entries.iter_mut().find(|e| e.requester == requester)
    }

    /// Removes every entry queued by `requester`.
    pub fn remove_requester(&mut self, requester: TxnId) -> Vec<WaitEntry> {
        let mut removed = Vec::new();
        let mut kept = VecDeque::with_capacity(self.entries.len());
        for entry in self.entries.drain(..) {
            if entry.requester == requester {
                removed.push(entry);
            } else {
                kept.push_back(entry);
            }
        }
        self.entries = kept;
        removed
    }

    /// Iterates over queued entries in FIFO order.
    pub fn iter(&self) -> impl Iterator<Item = &WaitEntry> {
        self.entries.iter()
    }

    /// Returns the number of queued requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nobody is waiting.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Handle returned to a blocked requester.
///
/// Pass it to [`LockManager::wait_for_grant`](super::LockManager::wait_for_grant)
/// to park until the request is resolved.
#[derive(Debug, Clone)]
pub struct LockWaiter {
    pub(crate) key: LockKey,
    pub(crate) mode: LockMode,
    pub(crate) txn_id: TxnId,
    pub(crate) enqueued_at: u64,
    pub(crate) signal: Arc<GrantSignal>,
}

impl LockWaiter {
    pub(crate) fn from_entry(entry: &WaitEntry) -> Self {
        Self {
            key: entry.key.clone(),
            mode: entry.mode,
            txn_id: entry.requester,
            enqueued_at: entry.enqueued_at,
            signal: Arc::clone(&entry.signal),
        }
    }

    /// Returns the requested key.
    pub fn key(&self) -> &LockKey {
        &self.key
    }

    /// Returns the requested mode.
    pub fn mode(&self) -> LockMode {
        self.mode
    }

    /// Returns the waiting transaction.
    pub fn txn_id(&self) -> TxnId {
        self.txn_id
    }

    /// Returns the enqueue sequence number.
    pub fn enqueued_at(&self) -> u64 {
        self.enqueued_at
    }

    /// Returns the current outcome without blocking.
    pub fn outcome(&self) -> WaitOutcome {
        self.signal.outcome()
    }
}
