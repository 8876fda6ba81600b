//! Error types for the SDN-WISE controller core.

use thiserror::Error;

/// Top-level controller errors
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Packet codec error
    #[error("packet error: {0}")]
    Packet(#[from] PacketError),

    /// Flow action byte outside the defined range
    #[error("invalid flow action: {0}")]
    InvalidAction(u8),
}

/// Packet-level codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PacketError {
    /// Buffer too short to hold the fixed header
    #[error("packet too short: expected at least {expected}, got {actual}")]
    TooShort {
        /// Expected minimum size
        expected: usize,
        /// Actual size received
        actual: usize,
    },

    /// Payload too large for the one-byte length field
    #[error("payload too large: {0} bytes (max 244)")]
    PayloadTooLarge(usize),

    /// Unrecognized packet type byte
    #[error("unknown packet type: 0x{0:02X}")]
    UnknownType(u8),
}
