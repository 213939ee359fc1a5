//! Wire formats for the skycast decoder protocol.
//!
//! Every message starts with a 4-byte [`PacketHeader`] (magic, opcode, body
//! length). DECODE and SUBSCRIBE bodies carry a signed AEAD envelope
//! ([`envelope`]); LIST responses carry a fixed-width table ([`list`]).
//!
//! This crate is pure parsing and encoding. It performs no I/O, holds no keys,
//! and never panics on untrusted input.

pub mod envelope;
pub mod errors;
pub mod header;
pub mod list;
pub mod opcode;
pub mod packet;

pub use envelope::{
    Envelope, FrameAad, FrameEnvelope, MAX_FRAME_SIZE, MAX_PACKET_SIZE, NONCE_SIZE,
    SIGNATURE_SIZE, SignedPacket, SubscriptionAad, SubscriptionEnvelope, TAG_SIZE,
};
pub use errors::{ProtocolError, Result};
pub use header::PacketHeader;
pub use list::{ListEntry, ListResponse};
pub use opcode::Opcode;
pub use packet::Packet;
