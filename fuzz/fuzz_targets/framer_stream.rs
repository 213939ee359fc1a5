//! Fuzz target for a whole decoder session over an arbitrary byte stream
//!
//! The host side is a scripted stream: raw bytes interleaved with genuine
//! uplink packets, so the fuzzer reaches every pipeline as well as the
//! framer's recovery paths.
//!
//! # Invariants
//!
//! - The session NEVER panics and always ends cleanly when input runs out
//! - Every request that reaches a pipeline gets exactly one response
//! - Decoder state invariants hold afterwards

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use skycast_core::{Decoder, DecoderConfig, MemoryStorage};
use skycast_harness::{AckBehavior, DecoderSnapshot, InvariantRegistry, SimHost, Uplink};

const DECODER_ID: u32 = 0xF022;

#[derive(Debug, Clone, Arbitrary)]
enum Chunk {
    Raw(Vec<u8>),
    Subscribe { channel: u8, start: u16, span: u16 },
    Frame { channel: u8, timestamp: u16, len: u8 },
    List,
}

#[derive(Debug, Clone, Arbitrary)]
struct Session {
    seed: u64,
    acks: u8,
    chunks: Vec<Chunk>,
}

fuzz_target!(|session: Session| {
    let mut uplink = Uplink::from_seed(session.seed);
    let Ok(mut decoder) =
        Decoder::new(uplink.secrets_for(DECODER_ID), DecoderConfig::persistent(), MemoryStorage::new())
    else {
        return;
    };

    let behavior = match session.acks % 3 {
        0 => AckBehavior::Acknowledge,
        1 => AckBehavior::Refuse,
        _ => AckBehavior::RefuseFinal,
    };
    let mut host = SimHost::with_behavior(behavior);

    for chunk in session.chunks.iter().take(64) {
        match chunk {
            Chunk::Raw(bytes) => host.send(bytes),
            Chunk::Subscribe { channel, start, span } => {
                let start = u64::from(*start);
                let wire = uplink.subscribe_packet(DECODER_ID, u32::from(*channel), start, start + u64::from(*span));
                if let Ok(wire) = wire {
                    host.send(&wire);
                }
            },
            Chunk::Frame { channel, timestamp, len } => {
                let payload = vec![0xA5; usize::from(*len % 65)];
                if let Ok(wire) = uplink.frame_packet(u32::from(*channel), u64::from(*timestamp), &payload) {
                    host.send(&wire);
                }
            },
            Chunk::List => host.send(&Uplink::list_packet()),
        }
    }

    let (host, stats) = host.serve(&mut decoder).unwrap();
    assert_eq!(host.unread(), 0);
    assert!(host.responses().len() >= stats.requests);

    let snapshot = DecoderSnapshot::capture(&decoder).unwrap();
    InvariantRegistry::standard().check_all(&snapshot).unwrap();
});
