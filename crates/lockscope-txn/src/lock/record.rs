//! Granted lock records for a single key.

use std::fmt;

use lockscope_common::types::{LockKey, TxnId};
use serde::{Serialize, Serializer};

/// Lock mode for a row lock.
///
/// ```text
///          │ S  │ X  │
/// ─────────┼────┼────┤
///     S    │ ✓  │ ✗  │
///     X    │ ✗  │ ✗  │
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockMode {
    /// Shared lock (read lock).
    Shared,
    /// Exclusive lock (write lock).
    Exclusive,
}

impl LockMode {
    /// Checks if this lock mode is compatible with another.
    pub fn is_compatible_with(&self, other: &LockMode) -> bool {
        matches!((self, other), (LockMode::Shared, LockMode::Shared))
    }

    /// Returns the stronger of two lock modes.
    pub fn stronger(self, other: LockMode) -> LockMode {
        match (self, other) {
            (LockMode::Shared, LockMode::Shared) => LockMode::Shared,
            _ => LockMode::Exclusive,
        }
    }

    /// Returns true if holding `self` already grants everything `other` asks for.
    pub fn covers(&self, other: &LockMode) -> bool {
        *self == LockMode::Exclusive || *other == LockMode::Shared
    }
}

impl fmt::Display for LockMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockMode::Shared => write!(f, "S"),
            LockMode::Exclusive => write!(f, "X"),
        }
    }
}

impl Serialize for LockMode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// A granted lock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockRecord {
    /// The locked key.
    pub key: LockKey,
    /// Granted mode.
    pub mode: LockMode,
    /// Owning transaction.
    pub owner: TxnId,
}

/// The transactions currently holding a lock on one key.
///
/// A key rarely has more than a handful of holders, so a vector beats a map.
#[derive(Debug, Default)]
pub struct HolderSet {
    holders: Vec<(TxnId, LockMode)>,
}

impl HolderSet {
    /// Creates an empty holder set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the mode `txn_id` holds, if any.
    pub fn mode_of(&self, txn_id: TxnId) -> Option<LockMode> {
        self.holders
            .iter()
            .find(|(owner, _)| *owner == txn_id)
            .map(|(_, mode)| *mode)
    }

    /// Checks `mode` against every holder other than `txn_id`.
    pub fn is_compatible(&self, txn_id: TxnId, mode: LockMode) -> bool {
        self.holders
            .iter()
            .filter(|(owner, _)| *owner != txn_id)
            .all(|(_, held)| mode.is_compatible_with(held))
    }

    /// Grants `mode` to `txn_id`, strengthening an existing grant.
    pub fn grant(&mut self, txn_id: TxnId, mode: LockMode) {
        match self.holders.iter_mut().find(|(owner, _)| *owner == txn_id) {
            Some((_, held)) => *held = held.stronger(mode),
            None => self.holders.push((txn_id, mode)),
        }
    }

    /// Removes the grant held by `txn_id`.
    pub fn remove(&mut self, txn_id: TxnId) -> Option<LockMode> {
        let pos = self.holders.iter().position(|(owner, _)| *owner == txn_id)?;
        Some(self.holders.swap_remove(pos).1)
    }

    /// Returns the number of holders.
    pub fn len(&self) -> usize {
        self.holders.len()
    }

    /// Returns true if nobody holds the key.
    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Materializes the holders as lock records for `key`.
    pub fn records(&self, key: &LockKey) -> Vec<LockRecord> {
        self.holders
            .iter()
            .map(|(owner, mode)| LockRecord {
                key: key.clone(),
                mode: *mode,
                owner: *owner,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_mode_compatibility() {
        use LockMode::*;

        assert!(Shared.is_compatible_with(&Shared));
        assert!(!Shared.is_compatible_with(&Exclusive));
        assert!(!Exclusive.is_compatible_with(&Shared));
        assert!(!Exclusive.is_compatible_with(&Exclusive));
    }

    #[test]
    fn test_lock_mode_covers() {
        use LockMode::*;

        assert!(Exclusive.covers(&Shared));
        assert!(Exclusive.covers(&Exclusive));
        assert!(Shared.covers(&Shared));
        assert!(!Shared.covers(&Exclusive));
        assert_eq!(Shared.stronger(Exclusive), Exclusive);
    }

    #[test]
    fn test_lock_mode_display() {
        assert_eq!(format!("{}", LockMode::Shared), "S");
        assert_eq!(format!("{}", LockMode::Exclusive), "X");
        assert_eq!(serde_json::to_string(&LockMode::Exclusive).unwrap(), "\"X\"");
    }

    #[test]
    fn test_holder_set_ignores_own_grant() {
        let mut holders = HolderSet::new();
        let txn1 = TxnId::new(1);
        let txn2 = TxnId::new(2);

        holders.grant(txn1, LockMode::Shared);
        assert!(holders.is_compatible(txn1, LockMode::Exclusive));
        assert!(!holders.is_compatible(txn2, LockMode::Exclusive));
        assert!(holders.is_compatible(txn2, LockMode::Shared));

        holders.grant(txn1, LockMode::Exclusive);
        assert_eq!(holders.mode_of(txn1), Some(LockMode::Exclusive));
        assert_eq!(holders.len(), 1);

        assert_eq!(holders.remove(txn1), Some(LockMode::Exclusive));
        assert!(holders.remove(txn1).is_none());
        assert!(holders.is_empty());
    }
}
