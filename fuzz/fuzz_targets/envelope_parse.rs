//! Fuzz target for the signed envelope parsers
//!
//! Arbitrary bytes go through the same parsing steps as a DECODE or
//! SUBSCRIBE request, before any cryptography.
//!
//! # Invariants
//!
//! - Parsing NEVER panics
//! - A parsed frame envelope never carries more than `MAX_FRAME_SIZE`
//!   ciphertext bytes
//! - The signed region and signature always partition the input

#![no_main]

use libfuzzer_sys::fuzz_target;
use skycast_proto::{
    FrameEnvelope, MAX_FRAME_SIZE, MAX_PACKET_SIZE, Packet, SIGNATURE_SIZE, SignedPacket, SubscriptionEnvelope,
};

fuzz_target!(|data: &[u8]| {
    let _ = Packet::decode(data);

    let Ok(packet) = SignedPacket::split(data) else {
        assert!(data.len() < SIGNATURE_SIZE || data.len() > MAX_PACKET_SIZE);
        return;
    };
    assert_eq!(packet.signed.len() + SIGNATURE_SIZE, data.len());

    if let Ok(envelope) = FrameEnvelope::parse(packet.signed) {
        assert!(envelope.ciphertext.len() <= MAX_FRAME_SIZE);
    }

    let _ = SubscriptionEnvelope::parse(packet.signed);
});
