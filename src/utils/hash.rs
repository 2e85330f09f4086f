//! Content hashing using blake3.
//!
//! Two consumers:
//! - identifier synthesis needs a short, stable slug of template text
//! - the registry needs a content hash of each compiled stylesheet so
//!   hot-update reconciliation can tell whether output actually changed
//!
//! # Usage
//!
//! ```ignore
//! use crate::utils::hash::{ContentHash, slug};
//!
//! let h = ContentHash::of(".a { color: red; }");
//! let s = slug("color: red;"); // -> "1f0c9a3e"
//! ```

use std::fmt;

/// Length of the hex slug embedded in generated identifiers.
///
/// 32 bits keeps the birthday bound negligible for a few hundred
/// templates per file while keeping class names short.
pub const SLUG_LEN: usize = 8;

/// A 256-bit content hash (blake3 output).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentHash([u8; 32]);

impl ContentHash {
    /// Hash arbitrary content.
    #[inline]
    pub fn of<T: AsRef<[u8]> + ?Sized>(data: &T) -> Self {
        Self(*blake3::hash(data.as_ref()).as_bytes())
    }

    /// Get the raw bytes.
    #[inline]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex encoding.
    pub fn to_hex(self) -> String {
        hex::encode(self.0)
    }

    /// Create from hex string.
    pub fn from_hex(s: &str) -> Option<Self> {
        let bytes = hex::decode(s).ok()?;
        let arr: [u8; 32] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Short form exchanged with clients over the notification channel.
    pub fn short(self) -> String {
        self.to_hex()[..16].to_string()
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short())
    }
}

/// Short deterministic slug of some text, used inside identifiers.
#[inline]
pub fn slug<T: AsRef<[u8]> + ?Sized>(data: &T) -> String {
    let hash = blake3::hash(data.as_ref());
    hex::encode(&hash.as_bytes()[..SLUG_LEN / 2])
}
