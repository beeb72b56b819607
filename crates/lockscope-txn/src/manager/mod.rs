//! Transaction manager facade.
//!
//! Owns the transaction registry, the lock manager and the diagnostic
//! snapshotter, and ties their lifecycles together:
//!
//! ```text
//! ┌───────┐    begin()    ┌────────┐   commit()   ┌────────────┐
//! │ Start │──────────────▶│ Active │─────────────▶│ Committing │──┐
//! └───────┘               └────────┘              └────────────┘  │ locks
//!                              │     rollback()   ┌────────────┐  │ released,
//!                              └─────────────────▶│ RolledBack │──┤ entry
//!                                                 └────────────┘  │ removed
//!                                                                 ▼
//! ```
//!
//! Ending a transaction flips its state and detaches its lock sets in one
//! step, so diagnostics never see a finished transaction's locks. The locks
//! are then released through the lock manager and the entry is removed.

use std::fmt;
use std::sync::atomic::Ordering as AtomicOrdering;
use std::sync::Arc;

use lockscope_common::config::LockscopeConfig;
use lockscope_common::error::CommandError;
use lockscope_common::types::{LockKey, TxnId};
use serde::Serialize;
use tracing::{debug, info};

use crate::diag::{LiveTransactionsReport, PendingLockRequestsReport, Snapshotter};
use crate::error::{TxnError, TxnResult};
use crate::lock::{LockManager, LockMode, LockResult, LockTable};
use crate::registry::{TransactionRegistry, TransactionState, TransactionStats};

/// The transaction manager coordinates transactions, their row locks, and
/// lock diagnostics.
pub struct TransactionManager {
    /// Registered transactions.
    registry: Arc<TransactionRegistry>,
    /// Lock manager.
    lock_manager: Arc<LockManager>,
    /// Diagnostics over the registry and lock table.
    snapshotter: Snapshotter,
    /// Configuration.
    config: LockscopeConfig,
}

impl TransactionManager {
    /// Creates a transaction manager with the default configuration.
    pub fn new() -> Self {
        let config = LockscopeConfig::default();
        Self::build(config)
    }

    /// Creates a transaction manager with custom configuration.
    pub fn with_config(config: LockscopeConfig) -> TxnResult<Self> {
        config
            .validate()
            .map_err(|message| TxnError::InvalidConfig { message })?;
        Ok(Self::build(config))
    }

    fn build(config: LockscopeConfig) -> Self {
        let registry = Arc::new(TransactionRegistry::with_shards(config.lock.shards));
        let lock_manager = Arc::new(LockManager::with_table(
            Arc::clone(&registry),
            LockTable::with_shards(config.lock.shards),
        ));
        let snapshotter = Snapshotter::new(Arc::clone(&registry), Arc::clone(&lock_manager));
        info!(
            shards = config.lock.shards,
            wait_timeout_ms = ?config.lock.wait_timeout_ms,
            response_limit_bytes = config.diagnostics.response_limit_bytes,
            "transaction manager started"
        );
        Self {
            registry,
            lock_manager,
            snapshotter,
            config,
        }
    }

    /// Begins a new transaction.
    pub fn begin(&self) -> TxnId {
        let txn_id = self.registry.begin();
        debug!(txn = %txn_id, "transaction started");
        txn_id
    }

    /// Tries to acquire a row lock without blocking.
    pub fn acquire(&self, txn_id: TxnId, key: LockKey, mode: LockMode) -> TxnResult<LockResult> {
        self.lock_manager.acquire(txn_id, key, mode)
    }

    /// Acquires a row lock, parking until it is granted.
    ///
    /// Waits at most the configured wait timeout, if one is set.
    pub fn lock(&self, txn_id: TxnId, key: LockKey, mode: LockMode) -> TxnResult<()> {
        match self.lock_manager.acquire(txn_id, key, mode)? {
            LockResult::Granted | LockResult::AlreadyHeld => Ok(()),
            LockResult::Blocked(waiter) => {
                debug!(
                    txn = %waiter.txn_id(),
                    key = %waiter.key(),
                    mode = %waiter.mode(),
                    seq = waiter.enqueued_at(),
                    "waiting for lock"
                );
                self.lock_manager
                    .wait_for_grant(&waiter, self.config.lock.wait_timeout())
            }
        }
    }

    /// Releases one row lock.
    pub fn release(&self, txn_id: TxnId, key: &LockKey) -> TxnResult<()> {
        self.lock_manager.release(txn_id, key)
    }

    /// Releases every lock of an active transaction, keeping it active.
    pub fn release_all(&self, txn_id: TxnId) -> TxnResult<usize> {
        self.lock_manager.release_all(txn_id)
    }

    /// Cancels a transaction's queued request on `key`.
    pub fn cancel_wait(&self, txn_id: TxnId, key: &LockKey) -> bool {
        self.lock_manager.cancel_wait(txn_id, key)
    }

    /// Commits a transaction and releases its locks.
    pub fn commit(&self, txn_id: TxnId) -> TxnResult<()> {
        self.finish(txn_id, TransactionState::Committing)
    }

    /// Rolls back a transaction, releasing its locks and cancelling its
    /// queued requests.
    pub fn rollback(&self, txn_id: TxnId) -> TxnResult<()> {
        self.finish(txn_id, TransactionState::RolledBack)
    }

    fn finish(&self, txn_id: TxnId, next: TransactionState) -> TxnResult<()> {
        let detached = self.registry.finish(txn_id, next)?;
        let released = self.lock_manager.release_detached(txn_id, detached);
        self.registry.remove(txn_id);
        debug!(txn = %txn_id, state = %next, released, "transaction ended");
        Ok(())
    }

    /// Reports active transactions and their row locks.
    ///
    /// `limit_bytes` defaults to the configured response limit.
    pub fn show_live_transactions(
        &self,
        limit_bytes: Option<u64>,
    ) -> TxnResult<LiveTransactionsReport> {
        self.snapshotter
            .show_live_transactions(self.response_limit(limit_bytes))
    }

    /// Reports queued lock requests.
    ///
    /// `limit_bytes` defaults to the configured response limit.
    pub fn show_pending_lock_requests(
        &self,
        limit_bytes: Option<u64>,
    ) -> TxnResult<PendingLockRequestsReport> {
        self.snapshotter
            .show_pending_lock_requests(self.response_limit(limit_bytes))
    }

    /// `showLiveTransactions` at the command boundary.
    pub fn show_live_transactions_json(
        &self,
        limit_bytes: Option<u64>,
    ) -> Result<serde_json::Value, CommandError> {
        to_command_value(self.show_live_transactions(limit_bytes)?)
    }

    /// `showPendingLockRequests` at the command boundary.
    pub fn show_pending_lock_requests_json(
        &self,
        limit_bytes: Option<u64>,
    ) -> Result<serde_json::Value, CommandError> {
        to_command_value(self.show_pending_lock_requests(limit_bytes)?)
    }

    /// Returns the state of a registered transaction.
    pub fn state(&self, txn_id: TxnId) -> Option<TransactionState> {
        self.registry.state(txn_id)
    }

    /// Returns the number of active transactions.
    pub fn active_count(&self) -> usize {
        self.registry.stats().active.load(AtomicOrdering::Relaxed) as usize
    }

    /// Returns statistics.
    pub fn stats(&self) -> &TransactionStats {
        self.registry.stats()
    }

    /// Returns the lock manager.
    pub fn lock_manager(&self) -> &Arc<LockManager> {
        &self.lock_manager
    }

    /// Returns the transaction registry.
    pub fn registry(&self) -> &Arc<TransactionRegistry> {
        &self.registry
    }

    /// Returns the configuration.
    pub fn config(&self) -> &LockscopeConfig {
        &self.config
    }

    fn response_limit(&self, limit_bytes: Option<u64>) -> u64 {
        limit_bytes.unwrap_or(self.config.diagnostics.response_limit_bytes)
    }
}

impl Default for TransactionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransactionManager")
            .field("active_count", &self.active_count())
            .field("lock_count", &self.lock_manager.lock_count())
            .finish()
    }
}

fn to_command_value<T: Serialize>(report: T) -> Result<serde_json::Value, CommandError> {
    serde_json::to_value(report).map_err(|err| {
        CommandError::from(TxnError::internal(format!(
            "failed to encode diagnostic report: {err}"
        )))
    })
}
