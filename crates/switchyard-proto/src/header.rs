//! Packet header with zero-copy parsing.
//!
//! The `PacketHeader` is a fixed 5-byte structure serialized as raw binary
//! (Big Endian). Every packet starts with one, and it is the only part of a
//! packet whose position never depends on earlier content.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Flag,
    errors::{ProtocolError, Result},
};

/// Fixed 5-byte packet header (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so the struct has alignment 1 and
/// any 5-byte pattern is a valid header. Parsing is therefore a cast plus a
/// length check; the flag is interpreted lazily via [`Self::flag_enum`].
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PacketHeader {
    sequence: [u8; 4], // u32 sequence number
    flag: u8,          // packet-type discriminator
}

impl PacketHeader {
    /// Size of the serialized header (5 bytes)
    pub const SIZE: usize = 5;

    /// Create a header with the given sequence number and flag.
    #[must_use]
    pub fn new(sequence: u32, flag: Flag) -> Self {
        Self { sequence: sequence.to_be_bytes(), flag: flag.to_u8() }
    }

    /// Parse header from network bytes (zero-copy, safe)
    ///
    /// Trailing bytes after the header are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PacketTooShort` if buffer is shorter than 5 bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let (header, _rest) = Self::ref_from_prefix(bytes).map_err(|_| {
            ProtocolError::PacketTooShort { expected: Self::SIZE, actual: bytes.len() }
        })?;

        Ok(header)
    }

    /// Serialize header to bytes (zero-copy)
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Sequence number.
    #[must_use]
    pub fn sequence(&self) -> u32 {
        u32::from_be_bytes(self.sequence)
    }

    /// Raw flag byte.
    #[must_use]
    pub fn flag(&self) -> u8 {
        self.flag
    }

    /// Flag as enum. `None` if unrecognized.
    #[must_use]
    pub fn flag_enum(&self) -> Option<Flag> {
        Flag::from_u8(self.flag)
    }
}

// Manual Debug implementation (can't derive due to packed repr)
impl std::fmt::Debug for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketHeader")
            .field("sequence", &self.sequence())
            .field("flag", &format!("{:#04x}", self.flag()))
            .finish()
    }
}

// Manual PartialEq implementation (can't derive due to packed repr)
impl PartialEq for PacketHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PacketHeader {}
