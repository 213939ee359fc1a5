//! Packet framing with per-chunk flow control.
//!
//! Every packet is a 4-byte header followed by `length` body bytes. Both
//! directions use the same acknowledgment discipline:
//!
//! ```text
//! sender                          receiver
//!   header ───────────────────────▶
//!          ◀─────────────────────── ACK           (not sent for ACK headers)
//!   body[0..256] ─────────────────▶
//!          ◀─────────────────────── ACK
//!   body[256..512] ───────────────▶
//!          ...
//!   body[..len] ──────────────────▶
//!          ◀─────────────────────── ACK           (final; skipped if len == 0)
//! ```
//!
//! An ACK is exactly `{MAGIC, 'A', 0, 0}`; anything else counts as a refusal.
//!
//! # Recovery
//!
//! A header with a bad magic byte, or one announcing more than
//! [`PacketHeader::MAX_BODY_SIZE`] body bytes, has its claimed body read and
//! discarded with the usual acknowledgments, then is answered with ERROR.
//! Either way the stream is left positioned at the next header.

use bytes::Bytes;
use skycast_proto::{Opcode, Packet, PacketHeader};
use thiserror::Error;

use crate::transport::{Transport, TransportError};

/// Body bytes transferred between acknowledgments
pub const ACK_INTERVAL: usize = 256;

/// Framing failures.
#[derive(Error, Debug)]
pub enum FramingError {
    /// Transport failed or closed
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Header did not start with the magic byte
    #[error("invalid magic byte {0:#04x}")]
    BadMagic(u8),

    /// Announced body exceeds the receive buffer
    #[error("announced body of {length} bytes exceeds limit {max}")]
    Oversized {
        /// Announced length
        length: usize,
        /// Receive buffer size
        max: usize,
    },

    /// Outgoing body does not fit in one packet
    #[error("response body of {length} bytes exceeds limit {max}")]
    ResponseTooLarge {
        /// Body length
        length: usize,
        /// Largest body
        max: usize,
    },
}

impl FramingError {
    /// Whether the peer closed the stream.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Transport(TransportError::Closed))
    }

    /// Whether the session can continue with the next packet.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::BadMagic(_) | Self::Oversized { .. })
    }
}

/// How far an outgoing packet got.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Header and every body chunk were acknowledged
    Acknowledged,
    /// The peer refused the header; no body byte was sent
    Refused,
    /// Header acknowledged but the body was held back; ERROR sent instead
    Withheld,
    /// Body bytes were sent but a chunk or the final ACK was refused
    Incomplete,
}

impl Delivery {
    /// Whether the whole packet was acknowledged.
    pub fn is_acknowledged(self) -> bool {
        self == Self::Acknowledged
    }

    /// Whether the body went out, acknowledged or not.
    pub fn released_body(self) -> bool {
        matches!(self, Self::Acknowledged | Self::Incomplete)
    }
}

/// Packet reader/writer over a [`Transport`].
pub struct Framer<T: Transport> {
    transport: T,
}

impl<T: Transport> Framer<T> {
    /// Wrap a transport.
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Unwrap the transport.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Receive one request packet.
    ///
    /// # Errors
    ///
    /// - `BadMagic` / `Oversized` after the error response has been sent;
    ///   the session may continue
    /// - `Transport` if the stream fails or closes
    pub fn read_packet(&mut self) -> Result<Packet, FramingError> {
        let mut raw = [0u8; PacketHeader::SIZE];
        self.transport.read_exact(&mut raw)?;
        self.send_ack()?;

        let header = match PacketHeader::from_bytes(&raw) {
            Ok(header) => *header,
            Err(_) => {
                let length = usize::from(u16::from_le_bytes([raw[2], raw[3]]));
                tracing::warn!(magic = raw[0], length, "Rejecting header with bad magic");
                self.discard(length)?;
                self.send_error()?;
                return Err(FramingError::BadMagic(raw[0]));
            },
        };

        let length = usize::from(header.length());
        if header.exceeds_body_limit() {
            tracing::warn!(length, max = PacketHeader::MAX_BODY_SIZE, "Discarding oversized body");
            self.discard(length)?;
            self.send_error()?;
            return Err(FramingError::Oversized { length, max: PacketHeader::MAX_BODY_SIZE });
        }

        let mut body = vec![0u8; length];
        self.receive(&mut body)?;

        Ok(Packet { header, body: Bytes::from(body) })
    }

    /// Send one packet, waiting for the peer's acknowledgments.
    ///
    /// If a body chunk is refused the transfer stops and an ERROR header is
    /// sent in its place.
    ///
    /// # Errors
    ///
    /// - `ResponseTooLarge` if `body` exceeds one packet
    /// - `Transport` if the stream fails or closes
    pub fn send_packet(&mut self, opcode: Opcode, body: &[u8]) -> Result<Delivery, FramingError> {
        self.send_packet_gated(opcode, body, || true)
    }

    /// Like [`Self::send_packet`], but `release` runs once the header is
    /// acknowledged and before any body byte is written. If it returns false
    /// the body is held back and an ERROR header is sent instead.
    ///
    /// `release` is not called when the header is refused.
    ///
    /// # Errors
    ///
    /// Same as [`Self::send_packet`].
    pub fn send_packet_gated(
        &mut self,
        opcode: Opcode,
        body: &[u8],
        release: impl FnOnce() -> bool,
    ) -> Result<Delivery, FramingError> {
        let length = u16::try_from(body.len())
            .ok()
            .filter(|&length| usize::from(length) <= PacketHeader::MAX_BODY_SIZE)
            .ok_or(FramingError::ResponseTooLarge {
                length: body.len(),
                max: PacketHeader::MAX_BODY_SIZE,
            })?;

        if !self.send_header(PacketHeader::new(opcode, length))? {
            return Ok(Delivery::Refused);
        }

        if !release() {
            self.send_error()?;
            return Ok(Delivery::Withheld);
        }

        if body.is_empty() {
            return Ok(Delivery::Acknowledged);
        }

        for (i, chunk) in body.chunks(ACK_INTERVAL).enumerate() {
            if i > 0 && !self.await_ack()? {
                tracing::warn!(sent = i * ACK_INTERVAL, length, "Body chunk not acknowledged");
                self.send_error()?;
                return Ok(Delivery::Incomplete);
            }
            self.transport.write_all(chunk)?;
        }

        if self.await_ack()? { Ok(Delivery::Acknowledged) } else { Ok(Delivery::Incomplete) }
    }

    /// Send the bare acknowledgment header.
    pub fn send_ack(&mut self) -> Result<(), FramingError> {
        self.send_header(PacketHeader::ack()).map(|_| ())
    }

    /// Send a zero-length ERROR response.
    pub fn send_error(&mut self) -> Result<Delivery, FramingError> {
        self.send_packet(Opcode::Error, &[])
    }

    /// Write `header`; unless it is an ACK, wait for the peer's ACK.
    fn send_header(&mut self, header: PacketHeader) -> Result<bool, FramingError> {
        self.transport.write_all(&header.to_bytes())?;

        if header.opcode_enum() == Some(Opcode::Ack) {
            self.transport.flush()?;
            return Ok(true);
        }

        self.await_ack()
    }

    fn await_ack(&mut self) -> Result<bool, FramingError> {
        self.transport.flush()?;

        let mut raw = [0u8; PacketHeader::SIZE];
        self.transport.read_exact(&mut raw)?;
        Ok(raw == PacketHeader::ack().to_bytes())
    }

    fn receive(&mut self, body: &mut [u8]) -> Result<(), FramingError> {
        if body.is_empty() {
            return Ok(());
        }

        for (i, byte) in body.iter_mut().enumerate() {
            if i > 0 && i % ACK_INTERVAL == 0 {
                self.send_ack()?;
            }
            *byte = self.transport.read_byte()?;
        }

        self.send_ack()
    }

    fn discard(&mut self, length: usize) -> Result<(), FramingError> {
        if length == 0 {
            return Ok(());
        }

        for i in 0..length {
            if i > 0 && i % ACK_INTERVAL == 0 {
                self.send_ack()?;
            }
            self.transport.read_byte()?;
        }

        self.send_ack()
    }
}
