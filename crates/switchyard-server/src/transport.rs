//! Tokio-based TCP transport implementation.
//!
//! Plain TCP, one packet per read. Each accepted socket is split into a
//! reader task and a writer task:
//!
//! - the reader turns every successful read into a
//!   [`ServerEvent::PacketReceived`] and reports EOF (or repeated read
//!   failures) as [`ServerEvent::ConnectionClosed`] on the shared event
//!   channel,
//! - the writer drains a bounded outbound queue onto the socket. A full
//!   queue drops the packet instead of growing without limit.
//!
//! Neither task touches the session registry; they only talk to the
//! coordinating task through channels.

use std::net::SocketAddr;

use bytes::{Bytes, BytesMut};
use switchyard_proto::MAX_PACKET_SIZE;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc::{self, error::TrySendError},
    task::JoinHandle,
};

use crate::{driver::ServerEvent, error::ServerError, server_error::ExecutorError};

/// Per-connection I/O configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Bytes requested per read; one read is one packet
    pub read_buffer_size: usize,
    /// Consecutive read errors tolerated before the connection is dropped
    pub max_read_errors: u32,
    /// Packets queued for a slow peer before further sends are dropped
    pub outbound_queue_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self { read_buffer_size: MAX_PACKET_SIZE, max_read_errors: 3, outbound_queue_size: 256 }
    }
}

/// Listening socket.
pub struct TcpTransport {
    /// Tokio listener
    listener: TcpListener,
}

impl TcpTransport {
    /// Create and bind a new listener.
    pub async fn bind(address: &str) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Transport(format!("failed to bind {addr}: {e}")))?;

        tracing::debug!("TCP transport bound to {}", addr);

        Ok(Self { listener })
    }

    /// Accept a new TCP connection.
    ///
    /// This method waits until a connection is available.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ServerError> {
        self.listener
            .accept()
            .await
            .map_err(|e| ServerError::Transport(format!("accept failed: {e}")))
    }

    /// Local address the transport is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("failed to get local address: {e}")))
    }
}

/// A live client connection, as seen by the coordinating task.
///
/// Dropping it drops the outbound queue, which ends the writer task and
/// shuts down the write half. The reader ends on its own at EOF, or through
/// [`Self::close`].
pub struct TcpConnection {
    session_id: u64,
    peer: SocketAddr,
    outbound: mpsc::Sender<Bytes>,
    reader: JoinHandle<()>,
}

impl TcpConnection {
    /// Split `stream` and spawn its reader and writer tasks.
    pub fn spawn(
        session_id: u64,
        stream: TcpStream,
        peer: SocketAddr,
        events: mpsc::UnboundedSender<ServerEvent>,
        config: &ConnectionConfig,
    ) -> Self {
        let (read_half, write_half) = stream.into_split();
        let (outbound, queue) = mpsc::channel(config.outbound_queue_size.max(1));

        let reader = tokio::spawn(read_loop(session_id, read_half, events, config.clone()));
        tokio::spawn(write_loop(session_id, write_half, queue));

        Self { session_id, peer, outbound, reader }
    }

    /// Queue a packet for the writer task without waiting.
    ///
    /// A full queue rejects the packet with [`ExecutorError::QueueFull`].
    pub fn send(&self, packet: Bytes) -> Result<(), ExecutorError> {
        self.outbound.try_send(packet).map_err(|e| match e {
            TrySendError::Full(_) => ExecutorError::QueueFull {
                session_id: self.session_id,
                capacity: self.outbound.max_capacity(),
            },
            TrySendError::Closed(_) => ExecutorError::SendFailed {
                session_id: self.session_id,
                reason: "connection writer has exited".to_string(),
            },
        })
    }

    /// Remote peer address.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Stop reading and close the socket once queued packets are written.
    pub fn close(self) {
        self.reader.abort();
    }
}

/// Read packets until EOF or too many consecutive errors.
///
/// A successful read resets the error count.
async fn read_loop<R>(
    session_id: u64,
    mut reader: R,
    events: mpsc::UnboundedSender<ServerEvent>,
    config: ConnectionConfig,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut buf = BytesMut::with_capacity(config.read_buffer_size);
    let mut consecutive_errors = 0;

    let reason = loop {
        buf.clear();
        buf.resize(config.read_buffer_size, 0);

        match reader.read(&mut buf[..]).await {
            Ok(0) => break "peer closed connection".to_string(),
            Ok(n) => {
                consecutive_errors = 0;
                let packet = buf.split_to(n).freeze();
                if events.send(ServerEvent::PacketReceived { session_id, packet }).is_err() {
                    // Coordinator is gone; nothing left to report to
                    return;
                }
            },
            Err(e) => {
                consecutive_errors += 1;
                tracing::warn!("Read error on session {}: {}", session_id, e);
                if consecutive_errors >= config.max_read_errors {
                    break format!("read failed {consecutive_errors} times: {e}");
                }
            },
        }
    };

    let _ = events.send(ServerEvent::ConnectionClosed { session_id, reason });
}

/// Write queued packets until the queue is dropped or a write fails.
async fn write_loop(
    session_id: u64,
    mut writer: OwnedWriteHalf,
    mut queue: mpsc::Receiver<Bytes>,
) {
    while let Some(packet) = queue.recv().await {
        if let Err(e) = writer.write_all(&packet).await {
            tracing::warn!("Write failed for session {}: {}", session_id, e);
            return;
        }
    }

    if let Err(e) = writer.shutdown().await {
        tracing::debug!("Shutdown failed for session {}: {}", session_id, e);
    }
}
