//! Switchyard wire protocol.
//!
//! Every packet is a 5-byte header (big-endian `u32` sequence number, then a
//! flag byte) followed by variant fields at fixed, non-terminated offsets.
//! Handles are carried as a one-byte length plus raw bytes; message bodies run
//! to the end of the packet.
//!
//! ```text
//! Register:  [seq:4][flag=1][len:1][handle]
//! Broadcast: [seq:4][flag=4][src_len:1][src][body...]
//! Message:   [seq:4][flag=5][dst_len:1][dst][src_len:1][src][body...]
//! Reply:     [seq:4][flag=2|3]
//! ```
//!
//! This crate does no I/O. [`Packet::decode`] validates every offset against
//! the buffer it is given and never reads past it.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod errors;
mod handle;
mod header;
pub mod packet;

pub use errors::{ProtocolError, Result};
pub use handle::Handle;
pub use header::PacketHeader;
pub use packet::{Broadcast, Message, Packet, Register, Reply};

/// Width of every handle length field, in bytes.
pub const LENGTH_FIELD_SIZE: usize = 1;

/// Largest packet the server reads in one go.
pub const MAX_PACKET_SIZE: usize = 2048;

/// Packet-type discriminator carried in byte 4 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Flag {
    /// Client asks to register a handle
    Initial = 1,
    /// Server accepted the requested handle
    AcceptHandle = 2,
    /// Server rejected the requested handle
    RejectHandle = 3,
    /// Client message for every other registered client
    Broadcast = 4,
    /// Client message for a single handle
    Message = 5,
}

impl Flag {
    /// Raw flag byte.
    #[must_use]
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a flag byte. `None` if unrecognized.
    #[must_use]
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::Initial),
            2 => Some(Self::AcceptHandle),
            3 => Some(Self::RejectHandle),
            4 => Some(Self::Broadcast),
            5 => Some(Self::Message),
            _ => None,
        }
    }
}
