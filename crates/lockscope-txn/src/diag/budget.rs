//! Incremental response size accounting.

use std::io;

use serde::Serialize;

use crate::error::{TxnError, TxnResult};

/// An `io::Write` sink that only counts bytes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ByteCounter {
    written: u64,
}

impl ByteCounter {
    /// Creates a counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of bytes written so far.
    pub fn written(&self) -> u64 {
        self.written
    }
}

impl io::Write for ByteCounter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Returns the exact number of bytes `value` occupies as compact JSON.
///
/// The value is streamed into a [`ByteCounter`]; nothing is buffered.
pub fn encoded_len<T: Serialize + ?Sized>(value: &T) -> TxnResult<u64> {
    let mut counter = ByteCounter::new();
    serde_json::to_writer(&mut counter, value)
        .map_err(|err| TxnError::internal(format!("failed to size response entry: {err}")))?;
    Ok(counter.written())
}

/// Running byte total for one diagnostic response.
///
/// Every append is charged before it happens. Once a charge is refused, or
/// an unconditional charge overruns the limit, the budget stays exhausted.
#[derive(Debug, Clone)]
pub struct ResponseBudget {
    limit: u64,
    used: u64,
    exhausted: bool,
}

impl ResponseBudget {
    /// Creates a budget of `limit` bytes.
    pub fn new(limit: u64) -> Self {
        Self {
            limit,
            used: 0,
            exhausted: false,
        }
    }

    /// Charges `bytes` regardless of the limit.
    ///
    /// Used for parts of the response that are always emitted. Overrunning
    /// the limit exhausts the budget.
    pub fn charge(&mut self, bytes: u64) {
        self.used = self.used.saturating_add(bytes);
        if self.used > self.limit {
            self.exhausted = true;
        }
    }

    /// Charges `bytes` if they fit; otherwise marks the budget exhausted.
    pub fn try_charge(&mut self, bytes: u64) -> bool {
        if self.exhausted {
            return false;
        }
        match self.used.checked_add(bytes) {
            Some(total) if total <= self.limit => {
                self.used = total;
                true
            }
            _ => {
                self.exhausted = true;
                false
            }
        }
    }

    /// Returns the configured limit.
    pub fn limit(&self) -> u64 {
        self.limit
    }

    /// Returns the bytes charged so far.
    pub fn used(&self) -> u64 {
        self.used
    }

    /// Returns the bytes left before the limit.
    pub fn remaining(&self) -> u64 {
        self.limit.saturating_sub(self.used)
    }

    /// Returns true once a charge has been refused or the limit overrun.
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }
}
