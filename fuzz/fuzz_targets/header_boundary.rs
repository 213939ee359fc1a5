//! Fuzz target for packet header boundary conditions
//!
//! # Strategy
//!
//! - Magic byte: valid, off-by-one, zero, random
//! - Opcode: every known opcode, unknown bytes
//! - Body length: zero, one, chunk boundaries, at the limit, just over,
//!   `u16::MAX`
//! - Body bytes present: exact, truncated, with trailing garbage
//!
//! # Invariants
//!
//! - Invalid magic MUST return `ProtocolError::InvalidMagic`
//! - A length over `MAX_BODY_SIZE` MUST return `PayloadTooLarge`
//! - A decoded packet re-encodes to exactly the consumed prefix

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use skycast_proto::{Packet, PacketHeader, ProtocolError};

#[derive(Debug, Clone, Arbitrary)]
enum MagicByte {
    Valid,
    OffByOne(bool),
    Zero,
    Random(u8),
}

#[derive(Debug, Clone, Arbitrary)]
enum BodyLength {
    Zero,
    One,
    ChunkBoundary(u8),
    AtLimit,
    JustOverLimit,
    Max,
    Random(u16),
}

#[derive(Debug, Clone, Arbitrary)]
struct BoundaryPacket {
    magic: MagicByte,
    opcode: u8,
    length: BodyLength,
    /// Body bytes present relative to the announced length
    present: i16,
    fill: u8,
}

fuzz_target!(|input: BoundaryPacket| {
    let magic = match input.magic {
        MagicByte::Valid => PacketHeader::MAGIC,
        MagicByte::OffByOne(up) => {
            if up { PacketHeader::MAGIC + 1 } else { PacketHeader::MAGIC - 1 }
        },
        MagicByte::Zero => 0,
        MagicByte::Random(byte) => byte,
    };

    let length: u16 = match input.length {
        BodyLength::Zero => 0,
        BodyLength::One => 1,
        BodyLength::ChunkBoundary(n) => (u16::from(n % 17) * 256).saturating_add(1),
        BodyLength::AtLimit => PacketHeader::MAX_BODY_SIZE as u16,
        BodyLength::JustOverLimit => PacketHeader::MAX_BODY_SIZE as u16 + 1,
        BodyLength::Max => u16::MAX,
        BodyLength::Random(n) => n,
    };

    let present = (i32::from(length) + i32::from(input.present)).clamp(0, 8192) as usize;

    let mut wire = vec![magic, input.opcode];
    wire.extend_from_slice(&length.to_le_bytes());
    wire.resize(PacketHeader::SIZE + present, input.fill);

    match Packet::decode(&wire) {
        Ok(packet) => {
            assert_eq!(magic, PacketHeader::MAGIC);
            assert!(usize::from(length) <= PacketHeader::MAX_BODY_SIZE);
            assert_eq!(packet.body.len(), usize::from(length));

            let encoded = packet.to_wire().unwrap();
            assert_eq!(encoded.as_slice(), &wire[..encoded.len()]);
        },
        Err(ProtocolError::InvalidMagic(byte)) => {
            assert_ne!(byte, PacketHeader::MAGIC);
        },
        Err(ProtocolError::PayloadTooLarge { .. }) => {
            assert!(usize::from(length) > PacketHeader::MAX_BODY_SIZE);
        },
        Err(_) => {
            assert!(present < usize::from(length));
        },
    }
});
