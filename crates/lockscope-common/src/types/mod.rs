//! Type definitions for lockscope.
//!
//! This module contains the identifier and key types used by the lock
//! manager and its diagnostics.

mod ids;
mod keys;

pub use ids::TxnId;
pub use keys::LockKey;
