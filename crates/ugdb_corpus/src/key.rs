//! String keys.

use crate::error::{CorpusError, CorpusResult};
use std::ffi::CString;
use std::fmt;

/// A string key stored with its terminating NUL byte.
///
/// `CKey::new("a")` is the two-byte key `[b'a', 0]`, so the string form of a
/// key and its raw byte form never collide. Strings with an interior NUL are
/// rejected.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CKey(CString);

impl CKey {
    /// Encodes `s`.
    ///
    /// # Errors
    ///
    /// Returns [`CorpusError::InvalidKey`] if `s` contains a NUL byte.
    pub fn new(s: &str) -> CorpusResult<Self> {
        CString::new(s)
            .map(Self)
            .map_err(|err| CorpusError::InvalidKey {
                position: err.nul_position(),
            })
    }

    /// Key bytes, NUL included.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes_with_nul()
    }

    /// The string without its terminator.
    #[must_use]
    pub fn as_str(&self) -> &str {
        // Built from a &str, so always UTF-8.
        self.0.to_str().unwrap_or_default()
    }
}

impl TryFrom<&str> for CKey {
    type Error = CorpusError;

    fn try_from(s: &str) -> CorpusResult<Self> {
        Self::new(s)
    }
}

impl AsRef<[u8]> for CKey {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl fmt::Debug for CKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CKey({:?})", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_terminator() {
        let key = CKey::new("a").unwrap();
        assert_eq!(key.as_bytes(), b"a\0");
        assert_eq!(key.as_str(), "a");
        assert_eq!(format!("{key:?}"), "CKey(\"a\")");
    }

    #[test]
    fn empty_string_is_one_byte() {
        assert_eq!(CKey::new("").unwrap().as_bytes(), b"\0");
    }

    #[test]
    fn rejects_interior_nul() {
        assert!(matches!(
            CKey::try_from("a\0b"),
            Err(CorpusError::InvalidKey { position: 1 })
        ));
    }
}
