//! Lock manager and diagnostics configuration structures.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::constants::{DEFAULT_LOCK_TABLE_SHARDS, MAX_RESPONSE_SIZE};

/// Top-level lockscope configuration.
///
/// # Example
///
/// ```rust
/// use lockscope_common::config::LockscopeConfig;
///
/// let config = LockscopeConfig::default();
/// assert_eq!(config.diagnostics.response_limit_bytes, 16 * 1024 * 1024);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockscopeConfig {
    /// Lock manager configuration.
    #[serde(default)]
    pub lock: LockManagerConfig,

    /// Diagnostic command configuration.
    #[serde(default)]
    pub diagnostics: DiagnosticsConfig,
}

impl LockscopeConfig {
    /// Creates a small configuration for testing.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            lock: LockManagerConfig {
                shards: 4,
                wait_timeout_ms: Some(5_000),
            },
            diagnostics: DiagnosticsConfig::default(),
        }
    }

    /// Validates the configuration and returns an error if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.lock.shards < 2 || !self.lock.shards.is_power_of_two() {
            return Err("lock.shards must be a power of 2 no smaller than 2".to_string());
        }

        if self.lock.wait_timeout_ms == Some(0) {
            return Err("lock.wait_timeout_ms must be positive when set".to_string());
        }

        if self.diagnostics.response_limit_bytes > MAX_RESPONSE_SIZE {
            return Err(format!(
                "diagnostics.response_limit_bytes must not exceed {MAX_RESPONSE_SIZE}"
            ));
        }

        Ok(())
    }
}

/// Lock manager configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockManagerConfig {
    /// Number of shards in the lock table and transaction registry.
    /// Default: 64
    #[serde(default = "default_shards")]
    pub shards: usize,

    /// How long a blocked request waits before giving up, in milliseconds.
    /// Default: none (wait until granted or cancelled)
    #[serde(default)]
    pub wait_timeout_ms: Option<u64>,
}

impl LockManagerConfig {
    /// Returns the configured wait timeout.
    #[must_use]
    pub fn wait_timeout(&self) -> Option<Duration> {
        self.wait_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for LockManagerConfig {
    fn default() -> Self {
        Self {
            shards: default_shards(),
            wait_timeout_ms: None,
        }
    }
}

/// Diagnostic command configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiagnosticsConfig {
    /// Default byte budget for `showLiveTransactions` and
    /// `showPendingLockRequests` responses.
    /// Default: 16777216 (16 MiB)
    #[serde(default = "default_response_limit")]
    pub response_limit_bytes: u64,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            response_limit_bytes: default_response_limit(),
        }
    }
}

fn default_shards() -> usize {
    DEFAULT_LOCK_TABLE_SHARDS
}

fn default_response_limit() -> u64 {
    MAX_RESPONSE_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        let config = LockscopeConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock.wait_timeout(), None);
        assert_eq!(config.lock.shards, DEFAULT_LOCK_TABLE_SHARDS);
    }

    #[test]
    fn test_invalid_shards() {
        let mut config = LockscopeConfig::default();
        config.lock.shards = 3;
        assert!(config.validate().is_err());
        config.lock.shards = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_limit_above_protocol_maximum() {
        let mut config = LockscopeConfig::default();
        config.diagnostics.response_limit_bytes = MAX_RESPONSE_SIZE + 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_testing_config() {
        let config = LockscopeConfig::for_testing();
        assert!(config.validate().is_ok());
        assert_eq!(config.lock.wait_timeout(), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_missing_sections_use_defaults() {
        let config: LockscopeConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config, LockscopeConfig::default());
    }
}
