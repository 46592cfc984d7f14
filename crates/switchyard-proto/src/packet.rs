//! Packet variants and their fixed-offset layouts.
//!
//! Variant fields follow the header back to back. Positions are fixed only up
//! to the first handle: each later field starts where the previous handle's
//! content ends. Nothing is self-delimiting, so every read goes through
//! [`FieldReader`], which checks the field against the bytes actually
//! received before slicing.
//!
//! # Invariants
//!
//! - `decode(encode(p)) == p` for every packet built from valid parts.
//! - Decoding never reads outside the input slice; a short packet yields
//!   `ProtocolError::Truncated` naming the field that did not fit.

use bytes::{BufMut, Bytes, BytesMut};

use crate::{
    Flag, Handle, LENGTH_FIELD_SIZE, PacketHeader,
    errors::{ProtocolError, Result},
};

/// Handle registration request (`INITIAL`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Register {
    /// Client sequence number
    pub sequence: u32,
    /// Requested handle
    pub handle: Handle,
}

/// Message for every other registered client (`BROADCAST`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Broadcast {
    /// Client sequence number
    pub sequence: u32,
    /// Handle the sender claims
    pub sender: Handle,
    /// Message text, everything after the sender handle
    pub body: Bytes,
}

/// Message for a single handle (`MESSAGE`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Client sequence number
    pub sequence: u32,
    /// Recipient handle
    pub destination: Handle,
    /// Handle the sender claims
    pub source: Handle,
    /// Message text, everything after the source handle
    pub body: Bytes,
}

/// Server answer to a registration (`ACCEPT_HANDLE` / `REJECT_HANDLE`).
///
/// Header only, no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reply {
    /// Sequence number (the server always sends 0)
    pub sequence: u32,
    /// Whether the requested handle was granted
    pub accepted: bool,
}

/// Any packet on the wire, discriminated by the header flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Packet {
    /// Handle registration request
    Register(Register),
    /// Fan-out message
    Broadcast(Broadcast),
    /// Directed message
    Message(Message),
    /// Registration answer
    Reply(Reply),
}

/// Bounds-checked cursor over a received packet.
struct FieldReader<'a> {
    packet: &'a [u8],
    offset: usize,
}

impl<'a> FieldReader<'a> {
    /// Start right after the header.
    fn after_header(packet: &'a [u8]) -> Self {
        Self { packet, offset: PacketHeader::SIZE }
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8]> {
        let available = self.packet.len().saturating_sub(self.offset);
        let slice = self
            .offset
            .checked_add(needed)
            .and_then(|end| self.packet.get(self.offset..end))
            .ok_or(ProtocolError::Truncated { field, offset: self.offset, needed, available })?;

        self.offset += needed;
        Ok(slice)
    }

    /// Length byte, then that many handle bytes.
    fn handle(&mut self, length_field: &'static str, field: &'static str) -> Result<Handle> {
        let len = self
            .take(length_field, LENGTH_FIELD_SIZE)?
            .iter()
            .fold(0usize, |len, byte| (len << 8) | usize::from(*byte));
        let bytes = self.take(field, len)?;
        Handle::new(Bytes::copy_from_slice(bytes))
    }

    /// Every byte not yet consumed.
    fn rest(self) -> Bytes {
        Bytes::copy_from_slice(self.packet.get(self.offset..).unwrap_or_default())
    }
}

fn put_handle(dst: &mut impl BufMut, handle: &Handle) {
    dst.put_u8(handle.len() as u8);
    dst.put_slice(handle.as_bytes());
}

impl Register {
    /// Decode from a full packet (header included).
    ///
    /// The flag byte is not checked; [`Packet::decode`] dispatches on it.
    /// Bytes after the handle are ignored.
    pub fn decode(packet: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(packet)?;
        let mut reader = FieldReader::after_header(packet);
        let handle = reader.handle("handle length", "handle")?;

        Ok(Self { sequence: header.sequence(), handle })
    }

    /// Encode the full packet.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&PacketHeader::new(self.sequence, Flag::Initial).to_bytes());
        put_handle(dst, &self.handle);
    }

    fn encoded_len(&self) -> usize {
        PacketHeader::SIZE + LENGTH_FIELD_SIZE + self.handle.len()
    }
}

impl Broadcast {
    /// Decode from a full packet (header included).
    pub fn decode(packet: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(packet)?;
        let mut reader = FieldReader::after_header(packet);
        let sender = reader.handle("sender handle length", "sender handle")?;

        Ok(Self { sequence: header.sequence(), sender, body: reader.rest() })
    }

    /// Encode the full packet.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&PacketHeader::new(self.sequence, Flag::Broadcast).to_bytes());
        put_handle(dst, &self.sender);
        dst.put_slice(&self.body);
    }

    fn encoded_len(&self) -> usize {
        PacketHeader::SIZE + LENGTH_FIELD_SIZE + self.sender.len() + self.body.len()
    }
}

impl Message {
    /// Decode from a full packet (header included).
    ///
    /// The source length byte sits right after the destination handle's
    /// content, and the body is whatever follows the source handle.
    pub fn decode(packet: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(packet)?;
        let mut reader = FieldReader::after_header(packet);
        let destination = reader.handle("destination handle length", "destination handle")?;
        let source = reader.handle("source handle length", "source handle")?;

        Ok(Self { sequence: header.sequence(), destination, source, body: reader.rest() })
    }

    /// Encode the full packet.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&PacketHeader::new(self.sequence, Flag::Message).to_bytes());
        put_handle(dst, &self.destination);
        put_handle(dst, &self.source);
        dst.put_slice(&self.body);
    }

    fn encoded_len(&self) -> usize {
        PacketHeader::SIZE
            + 2 * LENGTH_FIELD_SIZE
            + self.destination.len()
            + self.source.len()
            + self.body.len()
    }
}

impl Reply {
    /// Reply granting the handle.
    #[must_use]
    pub fn accept(sequence: u32) -> Self {
        Self { sequence, accepted: true }
    }

    /// Reply refusing the handle.
    #[must_use]
    pub fn reject(sequence: u32) -> Self {
        Self { sequence, accepted: false }
    }

    /// Decode from a full packet. Any flag other than `ACCEPT_HANDLE` reads
    /// as a rejection.
    pub fn decode(packet: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(packet)?;
        Ok(Self {
            sequence: header.sequence(),
            accepted: header.flag_enum() == Some(Flag::AcceptHandle),
        })
    }

    /// Flag carried by this reply.
    #[must_use]
    pub fn flag(&self) -> Flag {
        if self.accepted { Flag::AcceptHandle } else { Flag::RejectHandle }
    }

    /// Encode the header-only packet.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(&PacketHeader::new(self.sequence, self.flag()).to_bytes());
    }
}

impl Packet {
    /// Build a registration reply.
    #[must_use]
    pub fn reply(sequence: u32, accepted: bool) -> Self {
        Self::Reply(if accepted { Reply::accept(sequence) } else { Reply::reject(sequence) })
    }

    /// Decode a packet, dispatching on the header flag.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PacketTooShort` if the header is incomplete
    /// - `ProtocolError::UnknownFlag` if the flag names no packet type
    /// - `ProtocolError::Truncated` if a variant field runs past the end
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(bytes)?;

        match header.flag_enum() {
            Some(Flag::Initial) => Register::decode(bytes).map(Self::Register),
            Some(Flag::Broadcast) => Broadcast::decode(bytes).map(Self::Broadcast),
            Some(Flag::Message) => Message::decode(bytes).map(Self::Message),
            Some(Flag::AcceptHandle | Flag::RejectHandle) => Reply::decode(bytes).map(Self::Reply),
            None => Err(ProtocolError::UnknownFlag(header.flag())),
        }
    }

    /// Encode into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        match self {
            Self::Register(register) => register.encode(dst),
            Self::Broadcast(broadcast) => broadcast.encode(dst),
            Self::Message(message) => message.encode(dst),
            Self::Reply(reply) => reply.encode(dst),
        }
    }

    /// Encode into a fresh buffer.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Size of the encoded packet in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            Self::Register(register) => register.encoded_len(),
            Self::Broadcast(broadcast) => broadcast.encoded_len(),
            Self::Message(message) => message.encoded_len(),
            Self::Reply(_) => PacketHeader::SIZE,
        }
    }

    /// Header flag for this packet.
    #[must_use]
    pub fn flag(&self) -> Flag {
        match self {
            Self::Register(_) => Flag::Initial,
            Self::Broadcast(_) => Flag::Broadcast,
            Self::Message(_) => Flag::Message,
            Self::Reply(reply) => reply.flag(),
        }
    }

    /// Header sequence number.
    #[must_use]
    pub fn sequence(&self) -> u32 {
        match self {
            Self::Register(Register { sequence, .. })
            | Self::Broadcast(Broadcast { sequence, .. })
            | Self::Message(Message { sequence, .. })
            | Self::Reply(Reply { sequence, .. }) => *sequence,
        }
    }
}
