//! Structured command failures.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use thiserror::Error;

use super::ErrorCode;

/// A failed administrative command.
///
/// Diagnostic commands never surface internal faults as panics; they convert
/// them into this value, which serializes as
/// `{"ok": 0, "code": <n>, "codeName": "<name>", "errmsg": "<message>"}`.
///
/// # Example
///
/// ```rust
/// use lockscope_common::error::{CommandError, ErrorCode};
///
/// let err = CommandError::new(ErrorCode::ResourceExhausted, "out of memory");
/// assert_eq!(err.code(), ErrorCode::ResourceExhausted);
/// assert_eq!(err.to_string(), "ResourceExhausted: out of memory");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{code}: {message}")]
pub struct CommandError {
    code: ErrorCode,
    message: String,
}

impl CommandError {
    /// Creates a command error.
    #[must_use]
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Returns the error code.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        self.code
    }

    /// Returns the human readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Serialize for CommandError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("CommandError", 4)?;
        doc.serialize_field("ok", &0)?;
        doc.serialize_field("code", &self.code.as_u16())?;
        doc.serialize_field("codeName", &self.code.to_string())?;
        doc.serialize_field("errmsg", &self.message)?;
        doc.end()
    }
}
