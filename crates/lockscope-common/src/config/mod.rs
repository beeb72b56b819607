//! Configuration for lockscope.
//!
//! This module provides configuration structures for the lock manager and
//! the diagnostic commands.

mod lockscope;

pub use lockscope::{DiagnosticsConfig, LockManagerConfig, LockscopeConfig};
