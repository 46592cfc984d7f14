//! Driver error types.
//!
//! Provides strongly-typed errors for server operations:
//! - Session management (accept, lookup)
//! - Action execution (send to a connection)

use std::fmt;

/// Errors that can occur while the driver processes an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DriverError {
    /// Session not found in registry.
    ///
    /// Occurs when a packet arrives for a session that was never accepted or
    /// has already been removed. Usually a packet that raced a disconnect;
    /// the runtime logs it and moves on.
    SessionNotFound(u64),

    /// Session already registered.
    ///
    /// The runtime handed out a connection id twice. This is a logic bug -
    /// ids are never reused. Fatal - report as issue.
    SessionAlreadyExists(u64),
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionNotFound(id) => write!(f, "session not found: {id}"),
            Self::SessionAlreadyExists(id) => write!(f, "session already exists: {id}"),
        }
    }
}

impl std::error::Error for DriverError {}

/// Errors from action execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutorError {
    /// Send to session failed.
    ///
    /// The connection's outbound queue is gone, usually because its writer
    /// hit a broken pipe. Transient - the reader will report the disconnect.
    SendFailed {
        /// Session that failed
        session_id: u64,
        /// Error message
        reason: String,
    },

    /// Outbound queue full.
    ///
    /// The peer is not reading fast enough. The packet is dropped; delivery
    /// is best-effort.
    QueueFull {
        /// Session whose queue is full
        session_id: u64,
        /// Queue capacity in packets
        capacity: usize,
    },
}

impl fmt::Display for ExecutorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SendFailed { session_id, reason } => {
                write!(f, "send failed for session {session_id}: {reason}")
            },
            Self::QueueFull { session_id, capacity } => {
                write!(f, "outbound queue full for session {session_id} ({capacity} packets)")
            },
        }
    }
}

impl std::error::Error for ExecutorError {}
