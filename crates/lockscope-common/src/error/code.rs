//! Stable error codes.

use std::fmt;

/// Error codes for categorizing errors.
///
/// These codes can be used for programmatic error handling and
/// are stable across versions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ErrorCode {
    // General errors (0x0000 - 0x00FF)
    /// Unknown or unspecified error.
    Unknown = 0x0000,
    /// Internal error (bug).
    Internal = 0x0001,
    /// Invalid argument provided.
    InvalidArgument = 0x0003,
    /// Operation timed out.
    Timeout = 0x0004,
    /// Operation was cancelled.
    Cancelled = 0x0005,
    /// Memory could not be allocated.
    ResourceExhausted = 0x0006,

    // Transaction errors (0x0300 - 0x03FF)
    /// Transaction not found.
    TransactionNotFound = 0x0304,
    /// Transaction is not in the state the operation requires.
    InvalidState = 0x0306,

    // Lock errors (0x0700 - 0x07FF)
    /// Released a lock that was not held.
    NotHeld = 0x0700,
    /// A blocked lock request was cancelled before it was granted.
    WaitCancelled = 0x0701,
    /// A blocked lock request was not granted in time.
    WaitTimeout = 0x0702,
}

impl ErrorCode {
    /// Returns the numeric code.
    #[inline]
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        self as u16
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match (*self as u16) >> 8 {
            0x00 => "General",
            0x03 => "Transaction",
            0x07 => "Lock",
            _ => "Unknown",
        }
    }

    /// Returns true if the caller may retry the operation.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Timeout | Self::WaitTimeout | Self::ResourceExhausted)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_category() {
        assert_eq!(ErrorCode::InvalidState.category(), "Transaction");
        assert_eq!(ErrorCode::NotHeld.category(), "Lock");
        assert_eq!(ErrorCode::ResourceExhausted.category(), "General");
    }

    #[test]
    fn test_error_code_values() {
        assert_eq!(ErrorCode::NotHeld.as_u16(), 0x0700);
        assert_eq!(ErrorCode::ResourceExhausted.to_string(), "ResourceExhausted");
    }

    #[test]
    fn test_retryable() {
        assert!(ErrorCode::WaitTimeout.is_retryable());
        assert!(!ErrorCode::InvalidState.is_retryable());
    }
}
