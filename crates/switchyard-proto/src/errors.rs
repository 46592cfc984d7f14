//! Protocol decode errors.

use thiserror::Error;

/// Errors raised while decoding or building packets.
///
/// None of these are fatal for the connection that produced them: the server
/// drops the offending packet and keeps reading.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than the fixed header
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort {
        /// Header size
        expected: usize,
        /// Bytes actually present
        actual: usize,
    },

    /// A variable-offset field runs past the end of the packet
    #[error("truncated {field} at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Field being decoded
        field: &'static str,
        /// Offset of the field within the packet
        offset: usize,
        /// Bytes the field needs
        needed: usize,
        /// Bytes left in the packet from `offset`
        available: usize,
    },

    /// Flag byte names no known packet type
    #[error("unknown packet flag: {0:#04x}")]
    UnknownFlag(u8),

    /// Handle does not fit the one-byte length field
    #[error("handle too long: {len} bytes (max {max})")]
    HandleTooLong {
        /// Length that was supplied
        len: usize,
        /// Largest encodable length
        max: usize,
    },
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ProtocolError::PacketTooShort { expected: 5, actual: 2 };
        assert_eq!(err.to_string(), "packet too short: expected at least 5 bytes, got 2");

        let err = ProtocolError::UnknownFlag(9);
        assert_eq!(err.to_string(), "unknown packet flag: 0x09");

        let err = ProtocolError::Truncated {
            field: "destination handle",
            offset: 6,
            needed: 3,
            available: 1,
        };
        assert_eq!(
            err.to_string(),
            "truncated destination handle at offset 6: needed 3 bytes, 1 available"
        );
    }
}
