//! Switchyard server.
//!
//! Clients register a unique handle, then send directed messages to other
//! handles or broadcasts to everyone registered. Packets use the fixed-offset
//! binary format from [`switchyard_proto`].
//!
//! # Architecture
//!
//! The [`ServerDriver`] is pure logic: it owns the [`SessionRegistry`],
//! consumes [`ServerEvent`]s and returns [`ServerAction`]s. [`Server`] is the
//! runtime around it. A single coordinating task owns the driver and waits
//! on two sources at once: the listening socket and an event channel fed by
//! one reader task per connection. Each wakeup handles exactly one accept or
//! one event, then executes the resulting actions by queueing bytes onto the
//! target connections' writer tasks.
//!
//! Because only the coordinating task touches the registry, no locking is
//! needed.
//!
//! # Components
//!
//! - [`ServerDriver`]: Action-based dispatcher (pure logic, no I/O)
//! - [`SessionRegistry`]: Live sessions and the handle index
//! - [`Server`]: Tokio runtime that executes `ServerDriver` actions
//! - [`TcpTransport`]: Listening socket; [`TcpConnection`]: per-client tasks

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod error;
mod registry;
mod server_error;
mod transport;

use std::{collections::HashMap, net::SocketAddr};

pub use driver::{DriverConfig, LogLevel, ServerAction, ServerDriver, ServerEvent};
pub use error::ServerError;
pub use registry::{RegisterOutcome, Session, SessionRegistry};
pub use server_error::{DriverError, ExecutorError};
use tokio::sync::mpsc;
pub use transport::{ConnectionConfig, TcpConnection, TcpTransport};

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:0" for an ephemeral port)
    pub bind_address: String,
    /// Driver configuration (connection limit)
    pub driver: DriverConfig,
    /// Per-connection read settings
    pub connection: ConnectionConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:0".to_string(),
            driver: DriverConfig::default(),
            connection: ConnectionConfig::default(),
        }
    }
}

/// Production Switchyard server.
///
/// Wraps `ServerDriver` with a TCP listener.
pub struct Server {
    /// The action-based server driver
    driver: ServerDriver,
    /// Listening socket
    transport: TcpTransport,
    /// Per-connection read settings
    connection: ConnectionConfig,
}

impl Server {
    /// Create and bind a new server.
    pub async fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let driver = ServerDriver::new(config.driver);
        let transport = TcpTransport::bind(&config.bind_address).await?;

        Ok(Self { driver, transport, connection: config.connection })
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }

    /// Run the server, accepting connections and dispatching packets.
    ///
    /// Only returns on a fatal error; a failed accept is fatal.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("Server starting on {}", self.transport.local_addr()?);

        let Self { mut driver, transport, connection } = self;
        let (events_tx, mut events) = mpsc::unbounded_channel();
        let mut connections: HashMap<u64, TcpConnection> = HashMap::new();
        let mut next_session_id: u64 = 1;

        loop {
            tokio::select! {
                accepted = transport.accept() => {
                    let (stream, peer) = accepted?;
                    let session_id = next_session_id;
                    next_session_id += 1;

                    tracing::debug!("New connection {} from {}", session_id, peer);

                    let conn =
                        TcpConnection::spawn(session_id, stream, peer, events_tx.clone(), &connection);
                    connections.insert(session_id, conn);

                    let actions = driver.process_event(ServerEvent::ConnectionAccepted { session_id })?;
                    execute_actions(&driver, actions, &mut connections);
                },

                Some(event) = events.recv() => {
                    if let ServerEvent::ConnectionClosed { session_id, .. } = &event {
                        connections.remove(session_id);
                    }

                    match driver.process_event(event) {
                        Ok(actions) => execute_actions(&driver, actions, &mut connections),
                        Err(e) => tracing::warn!("Event processing error: {}", e),
                    }
                },
            }

            debug_assert_eq!(connections.len(), driver.session_count());
        }
    }
}

/// Execute server actions.
fn execute_actions(
    driver: &ServerDriver,
    actions: Vec<ServerAction>,
    connections: &mut HashMap<u64, TcpConnection>,
) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, packet } => {
                match connections.get(&session_id) {
                    Some(conn) => {
                        if let Err(e) = conn.send(packet) {
                            tracing::warn!("SendToSession failed: {}", e);
                        }
                    },
                    None => tracing::warn!("SendToSession: session {} not found", session_id),
                }
            },

            ServerAction::BroadcastToRegistered { packet, exclude_session } => {
                for session_id in driver.registered_sessions() {
                    if session_id == exclude_session {
                        continue;
                    }
                    if let Some(conn) = connections.get(&session_id) {
                        if let Err(e) = conn.send(packet.clone()) {
                            tracing::warn!("BroadcastToRegistered failed: {}", e);
                        }
                    }
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                match connections.remove(&session_id) {
                    Some(conn) => {
                        tracing::info!(
                            "Closing connection {} ({}): {}",
                            session_id,
                            conn.peer_addr(),
                            reason
                        );
                        conn.close();
                    },
                    None => tracing::info!("Closing connection {}: {}", session_id, reason),
                }
            },

            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
            },
        }
    }
}
