//! Lock key type for lockscope.
//!
//! A lock key names the locked resource, typically an encoded index entry.
//! Keys are opaque to the lock manager and may be arbitrarily long.

use bytes::Bytes;
use serde::{Serialize, Serializer};
use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::ops::Deref;

use crate::constants::KEY_DEBUG_PREFIX;

/// An opaque, immutable lock key.
///
/// Clones share the underlying buffer, so handing keys to wait queues,
/// held-lock sets and diagnostic reports never copies key bytes.
///
/// Keys serialize as a JSON string when they are valid UTF-8 and as a
/// `0x`-prefixed hex string otherwise.
///
/// # Example
///
/// ```rust
/// use lockscope_common::types::LockKey;
///
/// let key = LockKey::from_bytes(b"orders/17");
/// assert_eq!(key.len(), 9);
/// assert!(LockKey::from_bytes(b"a") < LockKey::from_bytes(b"b"));
/// ```
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct LockKey(Bytes);

impl LockKey {
    /// Creates an empty key.
    #[inline]
    #[must_use]
    pub const fn empty() -> Self {
        Self(Bytes::new())
    }

    /// Creates a key from a byte slice.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Creates a key from owned bytes.
    #[inline]
    #[must_use]
    pub fn from_vec(vec: Vec<u8>) -> Self {
        Self(Bytes::from(vec))
    }

    /// Creates a key from a `Bytes` instance.
    #[inline]
    #[must_use]
    pub const fn from_raw(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Returns the length of the key in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a byte slice.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns a reference to the underlying `Bytes`.
    #[inline]
    #[must_use]
    pub fn as_raw(&self) -> &Bytes {
        &self.0
    }
}

impl Deref for LockKey {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<[u8]> for LockKey {
    #[inline]
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for LockKey {
    #[inline]
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl Ord for LockKey {
    #[inline]
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl PartialOrd for LockKey {
    #[inline]
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Serialize for LockKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match std::str::from_utf8(&self.0) {
            Ok(s) => serializer.serialize_str(s),
            Err(_) => serializer.serialize_str(&format!("0x{}", hex::encode(&self.0))),
        }
    }
}

impl fmt::Debug for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(KEY_DEBUG_PREFIX)];
        let ellipsis = if self.0.len() > KEY_DEBUG_PREFIX { "..." } else { "" };
        match std::str::from_utf8(shown) {
            Ok(s) if s.chars().all(|c| !c.is_control() || c == ' ') => {
                write!(f, "LockKey({s:?}{ellipsis}, len={})", self.0.len())
            }
            _ => write!(
                f,
                "LockKey(0x{}{ellipsis}, len={})",
                hex::encode(shown),
                self.0.len()
            ),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = &self.0[..self.0.len().min(KEY_DEBUG_PREFIX)];
        match std::str::from_utf8(shown) {
            Ok(s) => write!(f, "{s}")?,
            Err(_) => write!(f, "0x{}", hex::encode(shown))?,
        }
        if self.0.len() > KEY_DEBUG_PREFIX {
            write!(f, "...")?;
        }
        Ok(())
    }
}

impl From<&[u8]> for LockKey {
    #[inline]
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<Vec<u8>> for LockKey {
    #[inline]
    fn from(vec: Vec<u8>) -> Self {
        Self::from_vec(vec)
    }
}

impl From<&str> for LockKey {
    #[inline]
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl From<String> for LockKey {
    #[inline]
    fn from(s: String) -> Self {
        Self::from_vec(s.into_bytes())
    }
}

impl From<Bytes> for LockKey {
    #[inline]
    fn from(bytes: Bytes) -> Self {
        Self::from_raw(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_serializes_utf8_as_string() {
        let key = LockKey::from("row-1");
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"row-1\"");
    }

    #[test]
    fn test_key_serializes_binary_as_hex() {
        let key = LockKey::from_vec(vec![0xff, 0x00, 0x10]);
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"0xff0010\"");
    }

    #[test]
    fn test_key_clone_shares_buffer() {
        let key = LockKey::from_vec(vec![b'a'; 8 * 1024]);
        let clone = key.clone();
        assert_eq!(key.as_raw().as_ptr(), clone.as_raw().as_ptr());
    }

    #[test]
    fn test_key_debug_truncates_long_keys() {
        let key = LockKey::from_vec(vec![b'a'; 100]);
        let debug = format!("{key:?}");
        assert!(debug.contains("..."));
        assert!(debug.ends_with("len=100)"));
        assert_eq!(LockKey::from("abc").to_string(), "abc");
    }

    #[test]
    fn test_key_ordering() {
        assert!(LockKey::empty() < LockKey::from("a"));
        assert!(LockKey::from("a") < LockKey::from("ab"));
        assert!(LockKey::from("ab") < LockKey::from("b"));
    }
}
