//! System-wide constants for lockscope.

// =============================================================================
// Diagnostic Response Limits
// =============================================================================

/// Maximum size of a diagnostic response document in bytes (16 MiB).
///
/// This matches the largest document the surrounding protocol can carry, so
/// diagnostic commands truncate their payload to stay under it.
pub const MAX_RESPONSE_SIZE: u64 = 16 * 1024 * 1024;

/// Number of boundary keys reported for every held row lock.
///
/// Row locks are point ranges, reported as their left and right bounds.
pub const KEYS_PER_ROW_LOCK: usize = 2;

// =============================================================================
// Lock Table Constants
// =============================================================================

/// Default number of shards in the lock table and transaction registry.
///
/// Must be a power of two.
pub const DEFAULT_LOCK_TABLE_SHARDS: usize = 64;

/// Number of leading key bytes shown in log and debug output.
pub const KEY_DEBUG_PREFIX: usize = 32;
