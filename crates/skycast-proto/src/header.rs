//! Packet header implementation with zero-copy parsing.
//!
//! The `PacketHeader` is a fixed 4-byte structure: magic byte, opcode, and a
//! little-endian `u16` body length. Every message on the wire, including
//! flow-control acknowledgments, starts with one.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode,
    errors::{ProtocolError, Result},
};

/// Fixed 4-byte packet header (little-endian length)
///
/// ```text
/// [magic: u8][opcode: u8][length: u16 LE]
/// ```
///
/// `length` counts body bytes only and may legitimately exceed
/// [`Self::MAX_BODY_SIZE`] on the wire: the receiver still has to consume
/// that many bytes to stay in sync with the stream. For that reason
/// [`Self::from_bytes`] validates the magic byte but not the length.
///
/// # Security
///
/// The `#[repr(C, packed)]` layout with zerocopy traits means every 4-byte
/// pattern is a valid `PacketHeader`, so casting untrusted bytes cannot cause
/// undefined behavior. The header is covered by the trailing signature of
/// DECODE and SUBSCRIBE requests, and is part of the AEAD associated data.
#[repr(C, packed)]
#[derive(Clone, Copy, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct PacketHeader {
    magic: u8,
    opcode: u8,
    length: [u8; 2],
}

impl PacketHeader {
    /// Size of the serialized header (4 bytes)
    pub const SIZE: usize = 4;

    /// Magic byte that opens every packet
    pub const MAGIC: u8 = 0x25;

    /// Largest body the receiver will buffer
    pub const MAX_BODY_SIZE: usize = 4096;

    /// Create a header for `opcode` announcing `length` body bytes.
    #[must_use]
    pub fn new(opcode: Opcode, length: u16) -> Self {
        Self { magic: Self::MAGIC, opcode: opcode.to_u8(), length: length.to_le_bytes() }
    }

    /// The 4-byte flow-control acknowledgment `{MAGIC, ACK, 0, 0}`.
    #[must_use]
    pub fn ack() -> Self {
        Self::new(Opcode::Ack, 0)
    }

    /// Parse a header from the front of `bytes` (zero-copy).
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if fewer than 4 bytes are available
    /// - `ProtocolError::InvalidMagic` if the first byte is not [`Self::MAGIC`]
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        let header = Self::ref_from_prefix(bytes)
            .map_err(|_| ProtocolError::FrameTooShort { expected: Self::SIZE, actual: bytes.len() })?
            .0;

        if header.magic != Self::MAGIC {
            return Err(ProtocolError::InvalidMagic(header.magic));
        }

        Ok(header)
    }

    /// Serialize header to bytes.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(IntoBytes::as_bytes(self));
        arr
    }

    /// Magic byte (always [`Self::MAGIC`] for parsed headers).
    #[must_use]
    pub fn magic(&self) -> u8 {
        self.magic
    }

    /// Operation code as raw byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Operation code as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// Announced body length in bytes.
    #[must_use]
    pub fn length(&self) -> u16 {
        u16::from_le_bytes(self.length)
    }

    /// Whether the announced body is larger than the receive buffer.
    #[must_use]
    pub fn exceeds_body_limit(&self) -> bool {
        usize::from(self.length()) > Self::MAX_BODY_SIZE
    }

    /// Exact match against the acknowledgment sequence.
    #[must_use]
    pub fn is_ack(&self) -> bool {
        self.to_bytes() == Self::ack().to_bytes()
    }

    /// Update the announced body length.
    pub fn set_length(&mut self, length: u16) {
        self.length = length.to_le_bytes();
    }
}

impl std::fmt::Debug for PacketHeader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PacketHeader")
            .field("magic", &format!("{:#04x}", self.magic()))
            .field("opcode", &format!("{:#04x}", self.opcode()))
            .field("length", &self.length())
            .finish()
    }
}

impl PartialEq for PacketHeader {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PacketHeader {}
