//! The sharded lock table.
//!
//! Each locked or contended key owns a [`LockSlot`]: its granted holders and
//! its wait queue behind one mutex, which is the per-key critical section.
//! The table itself is a sharded map from key to slot, so lookups on
//! different keys never contend on a single lock.
//!
//! A slot is removed from the map once it has neither holders nor waiters.
//! Removal marks the slot retired under its mutex; a thread that fetched the
//! slot before removal sees the flag and retries against a fresh slot.

use std::sync::Arc;

use dashmap::DashMap;
use lockscope_common::constants::DEFAULT_LOCK_TABLE_SHARDS;
use lockscope_common::types::LockKey;
use parking_lot::Mutex;

use super::record::{HolderSet, LockRecord};
use super::wait::{WaitEntry, WaitQueue};

/// Mutable state of one key, guarded by the slot mutex.
#[derive(Debug, Default)]
pub struct SlotState {
    /// Granted locks.
    pub holders: HolderSet,
    /// Blocked requests in FIFO order.
    pub waiters: WaitQueue,
    retired: bool,
}

impl SlotState {
    /// Returns true if the key is neither held nor awaited.
    pub fn is_free(&self) -> bool {
        self.holders.is_empty() && self.waiters.is_empty()
    }
}

/// Per-key lock state.
#[derive(Debug)]
pub struct LockSlot {
    key: LockKey,
    state: Mutex<SlotState>,
}

impl LockSlot {
    fn new(key: LockKey) -> Self {
        Self {
            key,
            state: Mutex::new(SlotState::default()),
        }
    }

    /// Returns the key this slot guards.
    pub fn key(&self) -> &LockKey {
        &self.key
    }
}

/// Sharded map of lock slots.
#[derive(Debug)]
pub struct LockTable {
    slots: DashMap<LockKey, Arc<LockSlot>>,
}

impl LockTable {
    /// Creates a lock table with the default shard count.
    pub fn new() -> Self {
        Self::with_shards(DEFAULT_LOCK_TABLE_SHARDS)
    }

    /// Creates a lock table with `shards` shards (a power of two, at least 2).
    ///
    /// Callers validate `shards` first; see [`LockscopeConfig::validate`].
    ///
    /// [`LockscopeConfig::validate`]: lockscope_common::config::LockscopeConfig::validate
    pub(crate) fn with_shards(shards: usize) -> Self {
        Self {
            slots: DashMap::with_shard_amount(shards),
        }
    }

    /// Runs `f` inside the key's critical section, creating the slot if needed.
    pub fn with_slot<R>(&self, key: &LockKey, f: impl FnOnce(&mut SlotState) -> R) -> R {
        loop {
            let slot = Arc::clone(
                self.slots
                    .entry(key.clone())
                    .or_insert_with(|| Arc::new(LockSlot::new(key.clone())))
                    .value(),
            );
            let mut state = slot.state.lock();
            if state.retired {
                continue;
            }
            return f(&mut state);
        }
    }

    /// Runs `f` inside the key's critical section if the key has a slot.
    pub fn with_existing_slot<R>(
        &self,
        key: &LockKey,
        f: impl FnOnce(&mut SlotState) -> R,
    ) -> Option<R> {
        let slot = self.slots.get(key).map(|entry| Arc::clone(entry.value()))?;
        let mut state = slot.state.lock();
        if state.retired {
            return None;
        }
        Some(f(&mut state))
    }

    /// Drops the key's slot if it is free.
    pub fn retire_if_free(&self, key: &LockKey) {
        self.slots.remove_if(key, |_, slot| {
            let mut state = slot.state.lock();
            if state.is_free() {
                state.retired = true;
                true
            } else {
                false
            }
        });
    }

    /// Returns the locks currently granted on `key`.
    pub fn holders(&self, key: &LockKey) -> Vec<LockRecord> {
        self.with_existing_slot(key, |state| state.holders.records(key))
            .unwrap_or_default()
    }

    /// Returns the requests currently queued on `key`, in FIFO order.
    pub fn waiters(&self, key: &LockKey) -> Vec<WaitEntry> {
        self.with_existing_slot(key, |state| state.waiters.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Lists every key's wait queue.
    ///
    /// Only slot handles are captured up front, ordered by key; each queue is
    /// copied lazily under its own critical section as the sequence advances.
    /// Entries resolved before their key is reached are not reported, and
    /// entries queued after the call may or may not be.
    pub fn pending_queues(&self) -> PendingQueues {
        let mut slots: Vec<Arc<LockSlot>> = self
            .slots
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        slots.sort_by(|a, b| a.key.cmp(&b.key));
        PendingQueues {
            slots: slots.into_iter(),
        }
    }

    /// Returns the number of keys that are held or awaited.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns true if no key is held or awaited.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Lazy sequence of `(key, queued entries)` over the whole table.
#[derive(Debug)]
pub struct PendingQueues {
    slots: std::vec::IntoIter<Arc<LockSlot>>,
}

impl Iterator for PendingQueues {
    type Item = (LockKey, Vec<WaitEntry>);

    fn next(&mut self) -> Option<Self::Item> {
        for slot in self.slots.by_ref() {
            let state = slot.state.lock();
            if state.retired || state.waiters.is_empty() {
                continue;
            }
            let entries = state.waiters.iter().cloned().collect();
            return Some((slot.key.clone(), entries));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::record::LockMode;
    use lockscope_common::types::TxnId;

    #[test]
    fn test_slot_created_and_retired() {
        let table = LockTable::with_shards(4);
        let key = LockKey::from("k1");

        table.with_slot(&key, |state| state.holders.grant(TxnId::new(1), LockMode::Shared));
        assert_eq!(table.len(), 1);
        assert_eq!(table.holders(&key).len(), 1);

        // Held slots survive a retire attempt.
        table.retire_if_free(&key);
        assert_eq!(table.len(), 1);

        table.with_existing_slot(&key, |state| state.holders.remove(TxnId::new(1)));
        table.retire_if_free(&key);
        assert!(table.is_empty());
        assert!(table.with_existing_slot(&key, |_| ()).is_none());
    }

    #[test]
    fn test_pending_queues_skip_uncontended_keys() {
        let table = LockTable::with_shards(4);
        let held = LockKey::from("a");
        let contended = LockKey::from("b");

        table.with_slot(&held, |state| state.holders.grant(TxnId::new(1), LockMode::Exclusive));
        table.with_slot(&contended, |state| {
            state.holders.grant(TxnId::new(1), LockMode::Exclusive);
            state
                .waiters
                .enqueue(WaitEntry::new(contended.clone(), LockMode::Shared, TxnId::new(2), 1));
            state
                .waiters
                .enqueue(WaitEntry::new(contended.clone(), LockMode::Shared, TxnId::new(3), 2));
        });

        let queues: Vec<_> = table.pending_queues().collect();
        assert_eq!(queues.len(), 1);
        assert_eq!(queues[0].0, contended);
        let requesters: Vec<TxnId> = queues[0].1.iter().map(|e| e.requester).collect();
        assert_eq!(requesters, vec![TxnId::new(2), TxnId::new(3)]);
    }

    #[test]
    fn test_pending_queues_reflect_later_dequeues() {
        let table = LockTable::with_shards(4);
        let key = LockKey::from("k");
        table.with_slot(&key, |state| {
            state
                .waiters
                .enqueue(WaitEntry::new(key.clone(), LockMode::Shared, TxnId::new(2), 1));
        });

        let mut queues = table.pending_queues();
        table.with_existing_slot(&key, |state| state.waiters.remove_seq(1));
        assert!(queues.next().is_none());
    }
}
