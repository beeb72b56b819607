//! Transaction and lock error types.

use lockscope_common::error::{CommandError, ErrorCode};
use lockscope_common::types::{LockKey, TxnId};
use thiserror::Error;

use crate::registry::TransactionState;

/// Result type for transaction and lock operations.
pub type TxnResult<T> = Result<T, TxnError>;

/// Errors that can occur during transaction and lock operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TxnError {
    /// Transaction not found.
    #[error("transaction {txn_id} not found")]
    TransactionNotFound {
        /// The transaction ID.
        txn_id: TxnId,
    },

    /// Transaction is not in the expected state.
    #[error("transaction {txn_id} is {current}, expected {expected}")]
    InvalidState {
        /// The transaction ID.
        txn_id: TxnId,
        /// The current state.
        current: TransactionState,
        /// The expected state(s).
        expected: &'static str,
    },

    /// Released a lock the transaction does not hold.
    #[error("transaction {txn_id} does not hold a lock on {key}")]
    NotHeld {
        /// The transaction ID.
        txn_id: TxnId,
        /// The key that was released.
        key: LockKey,
    },

    /// A blocked request was cancelled before it was granted.
    #[error("lock request by transaction {txn_id} on {key} was cancelled")]
    WaitCancelled {
        /// The waiting transaction.
        txn_id: TxnId,
        /// The requested key.
        key: LockKey,
    },

    /// A blocked request gave up waiting.
    #[error("lock request by transaction {txn_id} on {key} timed out after {timeout_ms}ms")]
    WaitTimeout {
        /// The waiting transaction.
        txn_id: TxnId,
        /// The requested key.
        key: LockKey,
        /// How long the request waited.
        timeout_ms: u64,
    },

    /// Memory for a diagnostic response could not be allocated.
    #[error("could not allocate {requested} more entries for {context}")]
    ResourceExhausted {
        /// What was being built.
        context: &'static str,
        /// Number of additional entries requested.
        requested: usize,
    },

    /// Invalid configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Error message.
        message: String,
    },

    /// Internal error - this indicates a bug.
    #[error("internal error: {message}")]
    Internal {
        /// Error message.
        message: String,
    },
}

impl TxnError {
    /// Returns the error code for this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::TransactionNotFound { .. } => ErrorCode::TransactionNotFound,
            Self::InvalidState { .. } => ErrorCode::InvalidState,
            Self::NotHeld { .. } => ErrorCode::NotHeld,
            Self::WaitCancelled { .. } => ErrorCode::WaitCancelled,
            Self::WaitTimeout { .. } => ErrorCode::WaitTimeout,
            Self::ResourceExhausted { .. } => ErrorCode::ResourceExhausted,
            Self::InvalidConfig { .. } => ErrorCode::InvalidArgument,
            Self::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl From<TxnError> for CommandError {
    fn from(err: TxnError) -> Self {
        CommandError::new(err.code(), err.to_string())
    }
}
