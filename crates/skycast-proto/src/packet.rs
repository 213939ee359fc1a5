//! Packet type combining header and body.
//!
//! A `Packet` is one complete protocol message: a 4-byte [`PacketHeader`]
//! followed by exactly `header.length()` body bytes. The framer moves packets
//! across the serial link in acknowledged chunks; this type only describes the
//! assembled result.

use bytes::{BufMut, Bytes};

use crate::{
    Opcode, PacketHeader,
    errors::{ProtocolError, Result},
};

/// Complete protocol packet
///
/// Layout on the wire: `[PacketHeader: 4 bytes] + [body: length bytes]`
///
/// # Invariants
///
/// - Size Consistency: `body.len()` equals `header.length()`. Enforced by
///   [`Packet::new`] and verified by [`Packet::decode`].
/// - Size Limit: `body.len()` never exceeds [`PacketHeader::MAX_BODY_SIZE`].
///
/// # Security
///
/// Provides structural validity only. Signature verification and decryption
/// of the body happen in the request pipelines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Packet header (4 bytes)
    pub header: PacketHeader,

    /// Raw body bytes
    pub body: Bytes,
}

impl Packet {
    /// Create a packet with the header length set from `body`.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the body exceeds
    ///   [`PacketHeader::MAX_BODY_SIZE`]
    pub fn new(opcode: Opcode, body: impl Into<Bytes>) -> Result<Self> {
        let body = body.into();

        if body.len() > PacketHeader::MAX_BODY_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: body.len(),
                max: PacketHeader::MAX_BODY_SIZE,
            });
        }

        // MAX_BODY_SIZE fits in u16, so the conversion cannot fail after the check.
        let length = u16::try_from(body.len()).map_err(|_| ProtocolError::PayloadTooLarge {
            size: body.len(),
            max: PacketHeader::MAX_BODY_SIZE,
        })?;

        Ok(Self { header: PacketHeader::new(opcode, length), body })
    }

    /// Zero-length packet carrying only an opcode.
    #[must_use]
    pub fn empty(opcode: Opcode) -> Self {
        Self { header: PacketHeader::new(opcode, 0), body: Bytes::new() }
    }

    /// Opcode as enum. `None` if unrecognized.
    #[must_use]
    pub fn opcode(&self) -> Option<Opcode> {
        self.header.opcode_enum()
    }

    /// Encode packet into buffer.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the body exceeds
    ///   [`PacketHeader::MAX_BODY_SIZE`]
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        debug_assert_eq!(self.body.len(), usize::from(self.header.length()));

        if self.body.len() > PacketHeader::MAX_BODY_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: self.body.len(),
                max: PacketHeader::MAX_BODY_SIZE,
            });
        }

        dst.put_slice(&self.header.to_bytes());
        dst.put_slice(&self.body);

        Ok(())
    }

    /// Full wire representation (header followed by body).
    ///
    /// This is the byte string a trailing signature covers.
    pub fn to_wire(&self) -> Result<Vec<u8>> {
        let mut wire = Vec::with_capacity(PacketHeader::SIZE + self.body.len());
        self.encode(&mut wire)?;
        Ok(wire)
    }

    /// Decode a packet from its wire format.
    ///
    /// Trailing bytes after the announced body are ignored.
    ///
    /// # Errors
    ///
    /// - `ProtocolError` if header parsing fails
    /// - `ProtocolError::PayloadTooLarge` if the header announces more than
    ///   [`PacketHeader::MAX_BODY_SIZE`]
    /// - `ProtocolError::FrameTruncated` if fewer body bytes are present than
    ///   announced
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let header = PacketHeader::from_bytes(bytes)?;

        let body_len = usize::from(header.length());
        if body_len > PacketHeader::MAX_BODY_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: body_len,
                max: PacketHeader::MAX_BODY_SIZE,
            });
        }

        let total_size = PacketHeader::SIZE
            .checked_add(body_len)
            .ok_or(ProtocolError::PayloadTooLarge { size: body_len, max: PacketHeader::MAX_BODY_SIZE })?;

        let Some(body) = bytes.get(PacketHeader::SIZE..total_size) else {
            return Err(ProtocolError::FrameTruncated {
                expected: body_len,
                actual: bytes.len().saturating_sub(PacketHeader::SIZE),
            });
        };

        Ok(Self { header: *header, body: Bytes::copy_from_slice(body) })
    }
}
