//! Diagnostic report shapes.

use lockscope_common::types::{LockKey, TxnId};
use serde::Serialize;

use crate::lock::LockMode;

/// One live transaction and the boundary keys of its row locks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LiveTransaction {
    /// Transaction ID.
    pub id: TxnId,
    /// Two entries (left and right boundary) per held lock.
    #[serde(rename = "rowLocks")]
    pub row_locks: Vec<LockKey>,
}

impl LiveTransaction {
    /// Creates an entry with no row locks.
    pub fn new(id: TxnId) -> Self {
        Self {
            id,
            row_locks: Vec::new(),
        }
    }

    /// Returns the number of locks reported for this transaction.
    pub fn lock_count(&self) -> usize {
        self.row_locks.len() / lockscope_common::KEYS_PER_ROW_LOCK
    }
}

/// Response of `showLiveTransactions`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LiveTransactionsReport {
    /// Active transactions in ID order.
    pub transactions: Vec<LiveTransaction>,
    #[serde(skip)]
    pub(crate) truncated: bool,
}

impl LiveTransactionsReport {
    /// Returns true if the size limit cut the report short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}

/// One blocked lock request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingLockRequest {
    /// The requested key.
    pub key: LockKey,
    /// Requested mode.
    pub mode: LockMode,
    /// Waiting transaction.
    pub requester: TxnId,
    /// Enqueue sequence number.
    #[serde(rename = "enqueuedAt")]
    pub enqueued_at: u64,
}

/// Response of `showPendingLockRequests`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PendingLockRequestsReport {
    /// Queued requests, grouped by key and FIFO within a key.
    pub requests: Vec<PendingLockRequest>,
    #[serde(skip)]
    pub(crate) truncated: bool,
}

impl PendingLockRequestsReport {
    /// Returns true if the size limit cut the report short.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }
}
