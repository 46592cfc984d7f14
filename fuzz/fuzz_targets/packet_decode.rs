//! Fuzz target for Packet::decode
//!
//! This fuzzer tests packet decoding with arbitrary byte sequences to find:
//! - Parser crashes or panics
//! - Offset arithmetic overflows
//! - Buffer over-reads past a declared handle length
//!
//! The fuzzer should NEVER panic. All invalid inputs should return an error.

#![no_main]

use libfuzzer_sys::fuzz_target;
use switchyard_proto::Packet;

fuzz_target!(|data: &[u8]| {
    // Whatever decodes must re-encode to a prefix of the input
    if let Ok(packet) = Packet::decode(data) {
        let encoded = packet.to_bytes();
        assert!(encoded.len() <= data.len());
        assert_eq!(&data[..encoded.len()], &encoded[..]);
    }
});
