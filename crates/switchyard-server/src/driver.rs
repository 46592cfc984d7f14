//! Server driver.
//!
//! Ties the wire codec to the [`SessionRegistry`]: every connection event
//! and every received packet goes through [`ServerDriver::process_event`],
//! which mutates the registry and returns the actions the runtime must
//! execute. No I/O happens here.

use bytes::Bytes;
use switchyard_proto::{Handle, Packet, ProtocolError};

use crate::{
    registry::{RegisterOutcome, SessionRegistry},
    server_error::DriverError,
};

/// Sequence number carried by every server reply.
const REPLY_SEQUENCE: u32 = 0;

/// Driver configuration
#[derive(Debug, Clone)]
pub struct DriverConfig {
    /// Maximum concurrent connections
    pub max_connections: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Events that the server driver processes.
///
/// These are produced by the runtime's accept loop and connection readers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerEvent {
    /// A new connection was accepted
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime
        session_id: u64,
    },

    /// A read returned data; one read is one packet
    PacketReceived {
        /// Connection that sent the packet
        session_id: u64,
        /// Raw packet bytes
        packet: Bytes,
    },

    /// A connection was closed (by peer or error)
    ConnectionClosed {
        /// Connection that was closed
        session_id: u64,
        /// Reason for closure
        reason: String,
    },
}

/// Actions that the server driver produces.
///
/// These are executed by the runtime against live connections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerAction {
    /// Send a packet to a specific session
    SendToSession {
        /// Target session ID
        session_id: u64,
        /// Encoded packet
        packet: Bytes,
    },

    /// Send a packet to every registered session except one
    BroadcastToRegistered {
        /// Encoded packet
        packet: Bytes,
        /// Session to skip (the sender)
        exclude_session: u64,
    },

    /// Close a connection
    CloseConnection {
        /// Session to close
        session_id: u64,
        /// Reason for closure
        reason: String,
    },

    /// Log a message
    Log {
        /// Log level
        level: LogLevel,
        /// Message to log
        message: String,
    },
}

/// Log levels for server actions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information
    Debug,
    /// Informational message
    Info,
    /// Warning
    Warn,
}

fn log(level: LogLevel, message: String) -> ServerAction {
    ServerAction::Log { level, message }
}

/// Action-based server driver.
///
/// Owns the session registry; the runtime owns the sockets.
#[derive(Debug, Default)]
pub struct ServerDriver {
    /// Session/handle registry
    registry: SessionRegistry,
    /// Driver configuration
    config: DriverConfig,
}

impl ServerDriver {
    /// Create a new server driver with an empty registry.
    pub fn new(config: DriverConfig) -> Self {
        Self { registry: SessionRegistry::new(), config }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the server driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                self.handle_connection_accepted(session_id)
            },
            ServerEvent::PacketReceived { session_id, packet } => {
                self.handle_packet_received(session_id, packet)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
        }
    }

    /// Handle a new connection being accepted.
    fn handle_connection_accepted(
        &mut self,
        session_id: u64,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if self.registry.count() >= self.config.max_connections {
            return Ok(vec![ServerAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }]);
        }

        if !self.registry.add(session_id) {
            return Err(DriverError::SessionAlreadyExists(session_id));
        }

        Ok(vec![log(LogLevel::Info, format!("client connected, session_id={session_id}"))])
    }

    /// Decode a packet and run the protocol action for its flag.
    fn handle_packet_received(
        &mut self,
        session_id: u64,
        raw: Bytes,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.registry.contains(session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        let packet = match Packet::decode(&raw) {
            Ok(packet) => packet,
            Err(ProtocolError::UnknownFlag(flag)) => {
                return Ok(vec![log(
                    LogLevel::Debug,
                    format!("ignoring packet with unknown flag {flag:#04x} from {session_id}"),
                )]);
            },
            Err(e) => {
                return Ok(vec![log(
                    LogLevel::Warn,
                    format!("dropping malformed packet from {session_id}: {e}"),
                )]);
            },
        };

        match packet {
            Packet::Register(register) => {
                let handle = register.handle.to_string();
                let outcome = self.registry.try_register(session_id, register.handle);
                let reply = Packet::reply(REPLY_SEQUENCE, outcome.is_accepted());
                let verdict = match outcome {
                    RegisterOutcome::Accepted => "accepted",
                    RegisterOutcome::Rejected => "rejected",
                };

                Ok(vec![
                    ServerAction::SendToSession { session_id, packet: reply.to_bytes() },
                    log(LogLevel::Info, format!("handle {handle:?} {verdict} for {session_id}")),
                ])
            },

            Packet::Broadcast(broadcast) => {
                if let Some(dropped) = self.check_sender(session_id, &broadcast.sender, "broadcast") {
                    return Ok(vec![dropped]);
                }

                Ok(vec![
                    ServerAction::BroadcastToRegistered { packet: raw, exclude_session: session_id },
                    log(
                        LogLevel::Debug,
                        format!(
                            "broadcast from {} ({} bytes)",
                            broadcast.sender,
                            broadcast.body.len()
                        ),
                    ),
                ])
            },

            Packet::Message(message) => {
                if let Some(dropped) = self.check_sender(session_id, &message.source, "message") {
                    return Ok(vec![dropped]);
                }

                match self.registry.find_by_handle(message.destination.as_bytes()) {
                    Some(target) => Ok(vec![
                        ServerAction::SendToSession { session_id: target, packet: raw },
                        log(
                            LogLevel::Debug,
                            format!("message from {} to {}", message.source, message.destination),
                        ),
                    ]),
                    None => Ok(vec![log(
                        LogLevel::Debug,
                        format!(
                            "dropping message from {} to unknown handle {}",
                            message.source, message.destination
                        ),
                    )]),
                }
            },

            Packet::Reply(reply) => Ok(vec![log(
                LogLevel::Debug,
                format!("ignoring server-only flag {:?} from {session_id}", reply.flag()),
            )]),
        }
    }

    /// Warning action if the session has no handle, or claims one it does
    /// not hold.
    fn check_sender(&self, session_id: u64, claimed: &Handle, kind: &str) -> Option<ServerAction> {
        match self.registry.find_by_session(session_id).and_then(|s| s.handle.as_ref()) {
            None => Some(log(
                LogLevel::Warn,
                format!("dropping {kind} from unregistered session {session_id}"),
            )),
            Some(held) if held != claimed => Some(log(
                LogLevel::Warn,
                format!("dropping {kind} from session {session_id}: claims {claimed}, holds {held}"),
            )),
            Some(_) => None,
        }
    }

    /// Handle a connection being closed.
    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<ServerAction> {
        match self.registry.remove(session_id) {
            Some(session) => {
                let handle = session.handle.map_or_else(|| "-".to_string(), |h| h.to_string());
                vec![log(
                    LogLevel::Info,
                    format!("client disconnected, session_id={session_id} handle={handle}: {reason}"),
                )]
            },
            None => Vec::new(),
        }
    }

    /// Sessions that receive broadcasts.
    pub fn registered_sessions(&self) -> impl Iterator<Item = u64> + '_ {
        self.registry.registered_sessions()
    }

    /// All live session ids, in accept order.
    pub fn session_ids(&self) -> impl Iterator<Item = u64> + '_ {
        self.registry.list()
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.registry.count()
    }

    /// Read access to the registry.
    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }
}
