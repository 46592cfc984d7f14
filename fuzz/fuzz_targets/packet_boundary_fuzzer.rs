//! Fuzz target for handle length boundary conditions
//!
//! Handles are the only variable-width fields before the body, so every
//! offset after the first handle depends on a length byte the client chose.
//!
//! # Strategy
//!
//! - Declared length: zero, exact, one short, one over, max (255), random
//! - Handle content: NUL bytes, high bytes, random
//! - Flag: each client flag, server flags, random
//!
//! # Invariants
//!
//! - A declared length larger than the bytes present MUST return
//!   `ProtocolError::Truncated` (never read adjacent memory)
//! - A declared length that fits MUST decode to exactly that many bytes
//! - All decode errors MUST be structured (never panic)

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use switchyard_proto::{Flag, Packet, PacketHeader, ProtocolError};

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryPacket {
    flag: FlagByte,
    sequence: u32,
    first: HandleField,
    second: HandleField,
    body: Vec<u8>,
}

#[derive(Debug, Clone, Arbitrary)]
enum FlagByte {
    Initial,
    Broadcast,
    Message,
    Server(bool),
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
struct HandleField {
    declared: DeclaredLength,
    content: Vec<u8>,
}

#[derive(Debug, Clone, Arbitrary)]
enum DeclaredLength {
    Zero,
    Exact,
    OneShort,
    OneOver,
    Max,
    Random(u8),
}

impl HandleField {
    fn declared_len(&self) -> u8 {
        let actual = self.content.len().min(255) as u8;
        match self.declared {
            DeclaredLength::Zero => 0,
            DeclaredLength::Exact => actual,
            DeclaredLength::OneShort => actual.saturating_sub(1),
            DeclaredLength::OneOver => actual.saturating_add(1),
            DeclaredLength::Max => u8::MAX,
            DeclaredLength::Random(r) => r,
        }
    }

    fn write(&self, buffer: &mut Vec<u8>) {
        buffer.push(self.declared_len());
        buffer.extend(self.content.iter().take(255));
    }
}

fuzz_target!(|boundary: BoundaryPacket| {
    let flag = match boundary.flag {
        FlagByte::Initial => Flag::Initial.to_u8(),
        FlagByte::Broadcast => Flag::Broadcast.to_u8(),
        FlagByte::Message => Flag::Message.to_u8(),
        FlagByte::Server(accepted) => {
            if accepted { Flag::AcceptHandle.to_u8() } else { Flag::RejectHandle.to_u8() }
        },
        FlagByte::Random(r) => r,
    };

    let mut buffer = Vec::with_capacity(PacketHeader::SIZE + 512 + boundary.body.len());
    buffer.extend_from_slice(&boundary.sequence.to_be_bytes());
    buffer.push(flag);
    boundary.first.write(&mut buffer);
    boundary.second.write(&mut buffer);
    buffer.extend_from_slice(&boundary.body);

    match Packet::decode(&buffer) {
        Ok(Packet::Register(register)) => {
            assert_eq!(register.sequence, boundary.sequence);
            assert_eq!(register.handle.len(), boundary.first.declared_len() as usize);
        },
        Ok(Packet::Message(message)) => {
            assert_eq!(message.destination.len(), boundary.first.declared_len() as usize);
            let consumed = PacketHeader::SIZE
                + 2
                + message.destination.len()
                + message.source.len()
                + message.body.len();
            assert_eq!(consumed, buffer.len());
        },
        Ok(Packet::Broadcast(broadcast)) => {
            assert_eq!(broadcast.sender.len(), boundary.first.declared_len() as usize);
            let consumed = PacketHeader::SIZE + 1 + broadcast.sender.len() + broadcast.body.len();
            assert_eq!(consumed, buffer.len());
        },
        Ok(Packet::Reply(reply)) => {
            assert_eq!(reply.sequence, boundary.sequence);
        },
        Err(ProtocolError::UnknownFlag(f)) => {
            assert_eq!(f, flag);
            assert!(Flag::from_u8(flag).is_none());
        },
        Err(ProtocolError::Truncated { offset, needed, available, .. }) => {
            assert!(offset + needed > buffer.len());
            assert_eq!(available, buffer.len().saturating_sub(offset));
        },
        Err(e) => panic!("unexpected error for a full header: {e}"),
    }
});
