//! Read results borrowed from a transaction.

use std::fmt;
use std::marker::PhantomData;
use std::ops::Deref;
use std::sync::Arc;

/// Bytes of a value, valid while the transaction that read it is borrowed.
///
/// The lifetime ties the view to the transaction: ending the transaction
/// (commit, abort, reset) needs a mutable borrow or ownership, which the
/// compiler refuses while a `Value` is alive. Call [`Value::to_vec`] to keep
/// the bytes past that point.
#[derive(Clone)]
pub struct Value<'txn> {
    bytes: Arc<[u8]>,
    _txn: PhantomData<&'txn ()>,
}

impl<'txn> Value<'txn> {
    pub(crate) fn new(bytes: Arc<[u8]>) -> Self {
        Self {
            bytes,
            _txn: PhantomData,
        }
    }

    /// Value length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Whether the value is zero-length.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Copies the bytes out of the transaction.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.bytes.to_vec()
    }
}

impl Deref for Value<'_> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.bytes
    }
}

impl AsRef<[u8]> for Value<'_> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl PartialEq<[u8]> for Value<'_> {
    fn eq(&self, other: &[u8]) -> bool {
        *self.bytes == *other
    }
}

impl<const N: usize> PartialEq<[u8; N]> for Value<'_> {
    fn eq(&self, other: &[u8; N]) -> bool {
        *self.bytes == other[..]
    }
}

impl PartialEq<Vec<u8>> for Value<'_> {
    fn eq(&self, other: &Vec<u8>) -> bool {
        *self.bytes == other[..]
    }
}

impl fmt::Debug for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Value").field(&&*self.bytes).finish()
    }
}
