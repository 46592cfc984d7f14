//! Fuzz target for the packet dispatcher
//!
//! Drives a `ServerDriver` with arbitrary accept / packet / close sequences
//! and checks the registry after every event.
//!
//! # Invariants
//!
//! - No two live sessions hold the same handle
//! - Only `Register` packets produce a reply to the sender
//! - Every `SendToSession` targets a live session
//! - Broadcasts never target the sender
//! - The driver never panics, whatever the packet bytes

#![no_main]

use std::collections::HashSet;

use arbitrary::Arbitrary;
use bytes::Bytes;
use libfuzzer_sys::fuzz_target;
use switchyard_server::{DriverConfig, ServerAction, ServerDriver, ServerEvent};

#[derive(Debug, Clone, Arbitrary)]
enum FuzzEvent {
    Accept,
    Close(u8),
    Packet { session: u8, bytes: Vec<u8> },
    Register { session: u8, name: u8 },
}

fuzz_target!(|events: Vec<FuzzEvent>| {
    let mut driver = ServerDriver::new(DriverConfig { max_connections: 16 });
    let mut next_session_id = 0u64;

    for event in events.into_iter().take(256) {
        let event = match event {
            FuzzEvent::Accept => {
                next_session_id += 1;
                ServerEvent::ConnectionAccepted { session_id: next_session_id }
            },
            FuzzEvent::Close(session) => ServerEvent::ConnectionClosed {
                session_id: u64::from(session % 16),
                reason: "fuzz".to_string(),
            },
            FuzzEvent::Packet { session, bytes } => ServerEvent::PacketReceived {
                session_id: u64::from(session % 16),
                packet: Bytes::from(bytes),
            },
            FuzzEvent::Register { session, name } => {
                // A tiny handle space forces collisions
                let handle = [b'h', name % 4];
                let mut packet = vec![0, 0, 0, 0, 1, handle.len() as u8];
                packet.extend_from_slice(&handle);
                ServerEvent::PacketReceived {
                    session_id: u64::from(session % 16),
                    packet: Bytes::from(packet),
                }
            },
        };

        let Ok(actions) = driver.process_event(event) else {
            continue;
        };

        for action in actions {
            match action {
                ServerAction::SendToSession { session_id, .. } => {
                    assert!(driver.registry().contains(session_id));
                },
                ServerAction::BroadcastToRegistered { exclude_session, .. } => {
                    assert!(driver.registry().contains(exclude_session));
                },
                ServerAction::CloseConnection { session_id, .. } => {
                    assert!(!driver.registry().contains(session_id));
                },
                ServerAction::Log { .. } => {},
            }
        }

        let mut seen = HashSet::new();
        for session_id in driver.session_ids() {
            let session = driver.registry().find_by_session(session_id).expect("listed");
            if let Some(handle) = &session.handle {
                assert!(seen.insert(handle.as_bytes().to_vec()), "duplicate handle");
                assert_eq!(driver.registry().find_by_handle(handle.as_bytes()), Some(session_id));
            }
        }
    }
});
