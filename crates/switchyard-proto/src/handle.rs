//! Client handles.

use std::{borrow::Borrow, fmt, hash::Hash};

use bytes::Bytes;

use crate::errors::{ProtocolError, Result};

/// A client-chosen identifier, carried on the wire as a length byte plus raw
/// bytes.
///
/// Handles are compared byte-for-byte. They are not required to be UTF-8 and
/// may contain NUL bytes. The only constraint is that the length fits the
/// one-byte length field, which makes encoding infallible.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Handle(Bytes);

impl Handle {
    /// Longest encodable handle (255 bytes).
    pub const MAX_LEN: usize = u8::MAX as usize;

    /// Build a handle from raw bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::HandleTooLong` if `bytes` exceeds [`Self::MAX_LEN`]
    pub fn new(bytes: impl Into<Bytes>) -> Result<Self> {
        let bytes = bytes.into();
        if bytes.len() > Self::MAX_LEN {
            return Err(ProtocolError::HandleTooLong { len: bytes.len(), max: Self::MAX_LEN });
        }
        Ok(Self(bytes))
    }

    /// Raw handle bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes (0-255).
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the handle has no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Hash the bytes the same way `[u8]` does so `HashMap<Handle, _>` can be
// queried with `&[u8]`.
impl Hash for Handle {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state);
    }
}

impl Borrow<[u8]> for Handle {
    fn borrow(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for Handle {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl TryFrom<&str> for Handle {
    type Error = ProtocolError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({:?})", String::from_utf8_lossy(&self.0))
    }
}
