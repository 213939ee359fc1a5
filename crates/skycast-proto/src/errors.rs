//! Protocol error types.
//!
//! Every parser in this crate returns [`ProtocolError`] instead of panicking.
//! Length fields come from an untrusted peer, so all size arithmetic is
//! checked and surfaces here as an explicit variant.

use thiserror::Error;

/// Errors produced while parsing or encoding wire formats.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Buffer is shorter than the fixed-size structure being parsed
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Minimum number of bytes required
        expected: usize,
        /// Number of bytes available
        actual: usize,
    },

    /// Header magic byte is not [`crate::PacketHeader::MAGIC`]
    #[error("invalid magic byte: {0:#04x}")]
    InvalidMagic(u8),

    /// Opcode byte does not name a known operation
    #[error("unknown opcode: {0:#04x}")]
    UnknownOpcode(u8),

    /// Body or frame exceeds a protocol size limit
    #[error("payload too large: {size} bytes exceeds maximum {max}")]
    PayloadTooLarge {
        /// Actual size in bytes
        size: usize,
        /// Maximum allowed size in bytes
        max: usize,
    },

    /// Fewer body bytes than the header claims
    #[error("frame truncated: expected {expected} body bytes, got {actual}")]
    FrameTruncated {
        /// Body length claimed by the header
        expected: usize,
        /// Body bytes actually present
        actual: usize,
    },

    /// Subtracting fixed-size fields from a total length would wrap
    #[error("length underflow: {len} bytes cannot hold {required} bytes of fixed fields")]
    LengthUnderflow {
        /// Total length available
        len: usize,
        /// Bytes required by the fixed fields
        required: usize,
    },

    /// Length does not match the exact size implied by a count field
    #[error("length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Exact length implied by the structure
        expected: usize,
        /// Length actually present
        actual: usize,
    },
}

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;
