//! End-to-end tests over loopback TCP.
//!
//! Each test binds a real `Server` on an ephemeral port, runs it on the tokio
//! runtime and talks to it with raw `TcpStream`s speaking the wire format.

use std::{net::SocketAddr, time::Duration};

use bytes::Bytes;
use switchyard_proto::{Broadcast, Handle, Message, Packet, Register};
use switchyard_server::{DriverConfig, Server, ServerRuntimeConfig};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::timeout,
};

const IO_TIMEOUT: Duration = Duration::from_secs(5);

async fn start_server(config: ServerRuntimeConfig) -> SocketAddr {
    let server = Server::bind(config).await.expect("server should bind");
    let addr = server.local_addr().expect("bound address");
    tokio::spawn(server.run());
    addr
}

async fn start_default_server() -> SocketAddr {
    start_server(ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        ..Default::default()
    })
    .await
}

fn handle(s: &str) -> Handle {
    Handle::try_from(s).expect("valid handle")
}

async fn read_packet(stream: &mut TcpStream, len: usize) -> Bytes {
    let mut buf = vec![0u8; len];
    timeout(IO_TIMEOUT, stream.read_exact(&mut buf))
        .await
        .expect("read timed out")
        .expect("read failed");
    Bytes::from(buf)
}

/// Send a registration and wait for the reply.
async fn register(stream: &mut TcpStream, name: &str) -> bool {
    let packet = Packet::Register(Register { sequence: 1, handle: handle(name) });
    stream.write_all(&packet.to_bytes()).await.expect("write failed");

    let reply = read_packet(stream, 5).await;
    match Packet::decode(&reply).expect("reply should decode") {
        Packet::Reply(reply) => reply.accepted,
        other => panic!("expected reply, got {other:?}"),
    }
}

async fn connect(addr: SocketAddr) -> TcpStream {
    TcpStream::connect(addr).await.expect("connect failed")
}

/// Assert nothing arrives on `stream` for a short while.
async fn assert_silent(stream: &mut TcpStream) {
    let mut buf = [0u8; 1];
    let result = timeout(Duration::from_millis(200), stream.read(&mut buf)).await;
    assert!(result.is_err(), "expected no data, got {result:?}");
}

#[tokio::test]
async fn registration_accepts_rejects_accepts() {
    let addr = start_default_server().await;

    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    let mut third = connect(addr).await;

    assert!(register(&mut first, "carol").await);
    assert!(!register(&mut second, "carol").await);
    assert!(register(&mut third, "dave").await);

    // The loser can still pick another handle
    assert!(register(&mut second, "erin").await);
}

#[tokio::test]
async fn reply_bytes_are_header_only() {
    let addr = start_default_server().await;
    let mut client = connect(addr).await;

    let packet = Packet::Register(Register { sequence: 77, handle: handle("zed") });
    client.write_all(&packet.to_bytes()).await.unwrap();

    let reply = read_packet(&mut client, 5).await;
    assert_eq!(&reply[..], &[0, 0, 0, 0, 2]);
}

#[tokio::test]
async fn message_is_forwarded_to_destination() {
    let addr = start_default_server().await;

    let mut alice = connect(addr).await;
    let mut bob = connect(addr).await;
    assert!(register(&mut alice, "alice").await);
    assert!(register(&mut bob, "bob").await);

    let message = Packet::Message(Message {
        sequence: 4,
        destination: handle("bob"),
        source: handle("alice"),
        body: Bytes::from_static(b"hi"),
    });
    let wire = message.to_bytes();
    alice.write_all(&wire).await.unwrap();

    let received = read_packet(&mut bob, wire.len()).await;
    assert_eq!(received, wire);
    assert_eq!(Packet::decode(&received).unwrap(), message);

    // No reply to the sender
    assert_silent(&mut alice).await;
}

#[tokio::test]
async fn message_to_unknown_handle_is_dropped() {
    let addr = start_default_server().await;

    let mut alice = connect(addr).await;
    assert!(register(&mut alice, "alice").await);

    let message = Packet::Message(Message {
        sequence: 1,
        destination: handle("nobody"),
        source: handle("alice"),
        body: Bytes::from_static(b"anyone?"),
    });
    alice.write_all(&message.to_bytes()).await.unwrap();

    assert_silent(&mut alice).await;

    // Server is still serving this connection
    assert!(register(&mut alice, "alice2").await);
}

#[tokio::test]
async fn broadcast_reaches_other_registered_clients() {
    let addr = start_default_server().await;

    let mut a = connect(addr).await;
    let mut b = connect(addr).await;
    let mut c = connect(addr).await;
    let mut lurker = connect(addr).await;
    assert!(register(&mut a, "a").await);
    assert!(register(&mut b, "b").await);
    assert!(register(&mut c, "c").await);

    let broadcast = Packet::Broadcast(Broadcast {
        sequence: 2,
        sender: handle("a"),
        body: Bytes::from_static(b"hello everyone"),
    });
    let wire = broadcast.to_bytes();
    a.write_all(&wire).await.unwrap();

    assert_eq!(read_packet(&mut b, wire.len()).await, wire);
    assert_eq!(read_packet(&mut c, wire.len()).await, wire);

    assert_silent(&mut a).await;
    assert_silent(&mut lurker).await;
}

#[tokio::test]
async fn handle_is_released_on_disconnect() {
    let addr = start_default_server().await;

    let mut first = connect(addr).await;
    assert!(register(&mut first, "carol").await);
    drop(first);

    // The disconnect and the new registration race through different tasks
    let mut second = connect(addr).await;
    let mut accepted = false;
    for _ in 0..50 {
        if register(&mut second, "carol").await {
            accepted = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(accepted, "handle was never released");
}

#[tokio::test]
async fn malformed_packet_does_not_close_connection() {
    let addr = start_default_server().await;
    let mut client = connect(addr).await;

    // Register claiming a 40-byte handle with only 3 bytes present
    client.write_all(&[0, 0, 0, 1, 1, 40, b'a', b'b', b'c']).await.unwrap();
    assert_silent(&mut client).await;

    // Unknown flag
    client.write_all(&[0, 0, 0, 1, 0x99]).await.unwrap();
    assert_silent(&mut client).await;

    assert!(register(&mut client, "still-here").await);
}

#[tokio::test]
async fn excess_connections_are_closed() {
    let addr = start_server(ServerRuntimeConfig {
        bind_address: "127.0.0.1:0".to_string(),
        driver: DriverConfig { max_connections: 1 },
        ..Default::default()
    })
    .await;

    let mut first = connect(addr).await;
    assert!(register(&mut first, "only").await);

    let mut second = connect(addr).await;
    let mut buf = Vec::new();
    let read = timeout(IO_TIMEOUT, second.read_to_end(&mut buf)).await.expect("read timed out");
    // Closed by the server: either a clean EOF or a reset
    assert!(read.map_or(true, |n| n == 0));

    // The first client is unaffected
    assert!(register(&mut first, "only-renamed").await);
}
