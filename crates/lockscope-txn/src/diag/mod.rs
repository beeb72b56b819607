//! Size-bounded lock diagnostics.
//!
//! The snapshotter serializes the registry's live transactions and the lock
//! table's wait queues into reports capped at a byte limit. Each entry is
//! sized as exact JSON before it is appended; the report stops at the first
//! entry that does not fit.
//!
//! ```text
//! {"transactions":[{"id":1,"rowLocks":["k1","k1","k2","k2"]},{"id":2,...
//! └── envelope ───┘└── header ──────────┘└ pair ─┘└ pair ─┘
//! ```
//!
//! The envelope and the first transaction's header are always emitted, so a
//! zero limit still yields the first active transaction with no row locks.
//! Truncation is not an error; it is reported by `is_truncated()` and a
//! warning log. A report whose always-emitted parts overrun the limit is
//! flagged as truncated too.
//!
//! Failing to allocate room for report entries is an error:
//! [`TxnError::ResourceExhausted`].

mod budget;
mod report;

use std::sync::Arc;

use lockscope_common::types::LockKey;
use lockscope_common::KEYS_PER_ROW_LOCK;
use tracing::{debug, trace, warn};

use crate::error::{TxnError, TxnResult};
use crate::lock::LockManager;
use crate::registry::{LockSet, TransactionRegistry};

pub use budget::{encoded_len, ByteCounter, ResponseBudget};
pub use report::{
    LiveTransaction, LiveTransactionsReport, PendingLockRequest, PendingLockRequestsReport,
};

/// Point-in-time, size-bounded reader over the lock state.
///
/// Never mutates lock state and never holds a lock across the whole
/// registry or table.
#[derive(Debug, Clone)]
pub struct Snapshotter {
    registry: Arc<TransactionRegistry>,
    locks: Arc<LockManager>,
    /// Most entries one report array may hold.
    entry_cap: usize,
}

impl Snapshotter {
    /// Creates a snapshotter over the given registry and lock manager.
    pub fn new(registry: Arc<TransactionRegistry>, locks: Arc<LockManager>) -> Self {
        Self {
            registry,
            locks,
            entry_cap: usize::MAX,
        }
    }

    /// Caps every report array at `entry_cap` entries; growing past it fails
    /// like an allocation failure.
    #[cfg(test)]
    pub(crate) fn with_entry_cap(mut self, entry_cap: usize) -> Self {
        self.entry_cap = entry_cap;
        self
    }

    /// Reports active transactions and the row locks they hold.
    ///
    /// Each held lock contributes its left and right boundary keys to the
    /// transaction's `rowLocks`, both equal to the lock's key. A pair is kept
    /// or dropped whole.
    pub fn show_live_transactions(&self, limit_bytes: u64) -> TxnResult<LiveTransactionsReport> {
        let mut report = LiveTransactionsReport::default();
        let mut budget = ResponseBudget::new(limit_bytes);
        budget.charge(encoded_len(&report)?);

        for txn in &self.registry.list_active() {
            let first = report.transactions.is_empty();
            let snapshot = txn.with_active_locks(|locks| -> TxnResult<Option<LiveTransaction>> {
                let mut entry = LiveTransaction::new(txn.id());
                let header = encoded_len(&entry)? + separator(!first);
                if first {
                    budget.charge(header);
                } else if !budget.try_charge(header) {
                    return Ok(None);
                }
                append_row_locks(&mut entry.row_locks, locks, &mut budget, self.entry_cap)?;
                Ok(Some(entry))
            });

            let entry = match snapshot {
                // Finished since the listing was taken.
                None => continue,
                Some(result) => match result? {
                    Some(entry) => entry,
                    None => break,
                },
            };
            reserve(&mut report.transactions, 1, self.entry_cap, "transactions")?;
            report.transactions.push(entry);

            if budget.is_exhausted() {
                break;
            }
        }

        report.truncated = budget.is_exhausted();
        if report.truncated {
            warn!(
                limit = budget.limit(),
                used = budget.used(),
                transactions = report.transactions.len(),
                "live transactions report truncated at size limit"
            );
        } else {
            debug!(
                used = budget.used(),
                transactions = report.transactions.len(),
                "live transactions report built"
            );
        }
        Ok(report)
    }

    /// Reports every queued lock request, flattened across keys.
    ///
    /// Requests are grouped by key in key order and FIFO within a key.
    pub fn show_pending_lock_requests(
        &self,
        limit_bytes: u64,
    ) -> TxnResult<PendingLockRequestsReport> {
        let mut report = PendingLockRequestsReport::default();
        let mut budget = ResponseBudget::new(limit_bytes);
        budget.charge(encoded_len(&report)?);

        'queues: for (key, entries) in self.locks.pending_queues() {
            for entry in entries {
                let request = PendingLockRequest {
                    key: key.clone(),
                    mode: entry.mode,
                    requester: entry.requester,
                    enqueued_at: entry.enqueued_at,
                };
                let cost = encoded_len(&request)? + separator(!report.requests.is_empty());
                if !budget.try_charge(cost) {
                    trace!(key = %key, cost, remaining = budget.remaining(), "pending request does not fit");
                    break 'queues;
                }
                reserve(&mut report.requests, 1, self.entry_cap, "requests")?;
                report.requests.push(request);
            }
        }

        report.truncated = budget.is_exhausted();
        if report.truncated {
            warn!(
                limit = budget.limit(),
                used = budget.used(),
                requests = report.requests.len(),
                "pending lock requests report truncated at size limit"
            );
        } else {
            debug!(
                used = budget.used(),
                requests = report.requests.len(),
                "pending lock requests report built"
            );
        }
        Ok(report)
    }
}

/// Bytes taken by the comma before an array element.
fn separator(needed: bool) -> u64 {
    u64::from(needed)
}

/// Makes room for `additional` entries without aborting on allocation failure.
fn reserve<T>(
    vec: &mut Vec<T>,
    additional: usize,
    cap: usize,
    context: &'static str,
) -> TxnResult<()> {
    let exhausted = || TxnError::ResourceExhausted {
        context,
        requested: additional,
    };
    if vec.len().saturating_add(additional) > cap {
        return Err(exhausted());
    }
    vec.try_reserve(additional).map_err(|_| exhausted())
}

/// Appends boundary key pairs for `locks` until the budget refuses one.
fn append_row_locks(
    row_locks: &mut Vec<LockKey>,
    locks: &LockSet,
    budget: &mut ResponseBudget,
    cap: usize,
) -> TxnResult<()> {
    let keys = KEYS_PER_ROW_LOCK as u64;
    for (key, _) in locks.iter() {
        let key_len = encoded_len(key)?;
        // N keys and the N - 1 commas between them, plus the comma before
        // the pair when the array already has entries.
        let cost = separator(!row_locks.is_empty()) + key_len * keys + (keys - 1);
        if !budget.try_charge(cost) {
            trace!(key = %key, cost, remaining = budget.remaining(), "row lock pair does not fit");
            break;
        }
        reserve(row_locks, KEYS_PER_ROW_LOCK, cap, "rowLocks")?;
        for _ in 0..KEYS_PER_ROW_LOCK {
            row_locks.push(key.clone());
        }
    }
    Ok(())
}
