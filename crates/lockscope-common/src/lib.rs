//! # lockscope-common
//!
//! Common types, errors, and configuration for lockscope.
//!
//! This crate provides the foundational types shared by the lock manager
//! and its diagnostics. It includes:
//!
//! - **Types**: Transaction identifiers (`TxnId`) and lock keys (`LockKey`)
//! - **Errors**: Stable error codes and the serializable `CommandError`
//! - **Config**: Lock manager and diagnostics configuration structures
//! - **Constants**: System-wide limits such as the response size cap
//!
//! ## Example
//!
//! ```rust
//! use lockscope_common::types::{LockKey, TxnId};
//! use lockscope_common::MAX_RESPONSE_SIZE;
//!
//! let txn = TxnId::new(1);
//! let key = LockKey::from_bytes(b"users/42");
//! assert!(txn.is_valid());
//! assert_eq!(key.len(), 8);
//! assert_eq!(MAX_RESPONSE_SIZE, 16 * 1024 * 1024);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

// Re-export commonly used items at the crate root
pub use constants::*;
pub use error::{CommandError, ErrorCode};
pub use types::{LockKey, TxnId};
