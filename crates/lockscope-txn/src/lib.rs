//! # lockscope-txn
//!
//! Row lock manager and live lock diagnostics for lockscope.
//!
//! This crate provides:
//!
//! - **Lock Management**: Row-level locking with shared (S) and exclusive (X)
//!   modes, FIFO wait queues, and blocking waits with optional timeout.
//!
//! - **Transaction Registry**: Transaction lifecycle and the set of locks
//!   each active transaction holds.
//!
//! - **Diagnostics**: `showLiveTransactions` and `showPendingLockRequests`,
//!   serialized incrementally under a byte limit.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                    TransactionManager                          │
//! │                           │                                    │
//! │    ┌──────────────────────┼──────────────────────┐            │
//! │    │                      │                      │            │
//! │    ▼                      ▼                      ▼            │
//! │ ┌──────────────┐  ┌─────────────────┐  ┌──────────────────┐  │
//! │ │ Transaction  │◀─│   LockManager   │  │   Snapshotter    │  │
//! │ │  Registry    │  │                 │  │ (ResponseBudget) │  │
//! │ └──────────────┘  └─────────────────┘  └──────────────────┘  │
//! │        ▲                  │                      │            │
//! │        │                  ▼                      │            │
//! │        │          ┌─────────────────┐            │            │
//! │        │          │    LockTable    │◀───────────┤            │
//! │        │          │ holders + queue │            │            │
//! │        │          └─────────────────┘            │            │
//! │        └─────────────────────────────────────────┘            │
//! └────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example Usage
//!
//! ```rust
//! use lockscope_common::types::LockKey;
//! use lockscope_txn::{LockMode, TransactionManager};
//!
//! let tm = TransactionManager::new();
//! let txn = tm.begin();
//! tm.lock(txn, LockKey::from("users/42"), LockMode::Exclusive).unwrap();
//!
//! let report = tm.show_live_transactions(None).unwrap();
//! assert_eq!(report.transactions[0].row_locks.len(), 2);
//!
//! tm.commit(txn).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Size-bounded lock diagnostics.
///
/// This module provides:
/// - [`diag::Snapshotter`]: Builds the diagnostic reports
/// - [`diag::ResponseBudget`]: Incremental response size accounting
pub mod diag;

/// Error types.
pub mod error;

/// Row lock table and lock manager.
///
/// This module provides:
/// - [`lock::LockManager`]: Grants, blocks, and releases locks
/// - [`lock::LockMode`]: Lock modes (S, X)
/// - [`lock::LockWaiter`]: Handle for a blocked request
pub mod lock;

/// Transaction manager facade.
pub mod manager;

/// Transaction registry.
pub mod registry;

pub use diag::{
    LiveTransaction, LiveTransactionsReport, PendingLockRequest, PendingLockRequestsReport,
    Snapshotter,
};
pub use error::{TxnError, TxnResult};
pub use lock::{LockManager, LockMode, LockRecord, LockResult, LockWaiter, WaitOutcome};
pub use manager::TransactionManager;
pub use registry::{TransactionRegistry, TransactionState};
