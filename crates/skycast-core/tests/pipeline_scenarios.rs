//! End-to-end pipeline behavior against frames and subscriptions produced by
//! the uplink encoder.

use skycast_core::{
    Decoder, DecoderConfig, DecoderError, ErrorClass, MemoryStorage, RecordError, ReplayError,
    SLOT_COUNT,
};
use skycast_harness::Uplink;
use skycast_proto::{ListEntry, ProtocolError, SIGNATURE_SIZE};

const DECODER_ID: u32 = 0xDEAD_BEEF;

fn setup() -> (Uplink, Decoder<MemoryStorage>) {
    let uplink = Uplink::from_seed(42);
    let decoder =
        Decoder::new(uplink.secrets_for(DECODER_ID), DecoderConfig::default(), MemoryStorage::new())
            .unwrap();
    (uplink, decoder)
}

fn subscribe(uplink: &mut Uplink, decoder: &mut Decoder<MemoryStorage>, channel: u32, start: u64, end: u64) {
    let wire = uplink.subscribe_packet(DECODER_ID, channel, start, end).unwrap();
    decoder.subscribe(&wire).unwrap();
}

#[test]
fn full_range_subscription_decodes_both_extremes() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 5, 0, u64::MAX);

    let record = decoder.store().lookup(5).unwrap();
    assert_eq!(record.nodes().len(), 1);
    assert_eq!((record.nodes()[0].level(), record.nodes()[0].index()), (0, 0));

    let first = uplink.frame_packet(5, 0, b"first").unwrap();
    let last = uplink.frame_packet(5, u64::MAX, b"last").unwrap();

    assert_eq!(decoder.decode(&first).unwrap().payload, b"first");
    assert_eq!(decoder.decode(&last).unwrap().payload, b"last");
    assert_ne!(uplink.frame_key(5, 0), uplink.frame_key(5, u64::MAX));
}

#[test]
fn timestamp_before_window_rejected() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 5, 100, 199);

    let early = uplink.frame_packet(5, 50, b"early").unwrap();
    let err = decoder.decode(&early).unwrap_err();
    assert_eq!(
        err,
        DecoderError::OutsideSubscription { channel: 5, timestamp: 50, start: 100, end: 199 }
    );
    assert_eq!(err.class(), ErrorClass::Authorization);

    for timestamp in [100, 150, 199] {
        let wire = uplink.frame_packet(5, timestamp, b"inside").unwrap();
        assert!(decoder.decode(&wire).is_ok(), "timestamp {timestamp} should decode");
    }

    let late = uplink.frame_packet(5, 200, b"late").unwrap();
    assert!(matches!(decoder.decode(&late), Err(DecoderError::OutsideSubscription { .. })));
}

#[test]
fn repeated_timestamp_rejected_after_commit() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 7, 0, 10_000);

    let wire = uplink.frame_packet(7, 1000, b"frame").unwrap();
    let frame = decoder.decode(&wire).unwrap();
    decoder.commit(&frame).unwrap();

    let again = uplink.frame_packet(7, 1000, b"frame").unwrap();
    let err = decoder.decode(&again).unwrap_err();
    assert_eq!(err, DecoderError::Replay(ReplayError::NotNewer { channel: 7, timestamp: 1000, last: 1000 }));
    assert_eq!(err.class(), ErrorClass::Ordering);

    let older = uplink.frame_packet(7, 999, b"older").unwrap();
    assert!(matches!(decoder.decode(&older), Err(DecoderError::Replay(_))));

    let newer = uplink.frame_packet(7, 1001, b"newer").unwrap();
    assert!(decoder.decode(&newer).is_ok());
}

#[test]
fn uncommitted_frame_leaves_cursor_alone() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 7, 0, 10_000);

    let wire = uplink.frame_packet(7, 1000, b"frame").unwrap();
    let _ = decoder.decode(&wire).unwrap();

    assert_eq!(decoder.replay().cursor(7), None);
    assert!(decoder.decode(&wire).is_ok());
}

#[test]
fn four_byte_packet_fails_signature_stage() {
    let (_, decoder) = setup();

    let err = decoder.decode(&[0x25, 0x44, 0x00, 0x00]).unwrap_err();
    assert_eq!(
        err,
        DecoderError::Malformed(ProtocolError::LengthUnderflow { len: 4, required: SIGNATURE_SIZE })
    );
}

#[test]
fn zero_signature_rejected() {
    let (_, decoder) = setup();

    let mut wire = vec![0x25, 0x44, 64, 0];
    wire.extend_from_slice(&[0; 64]);
    assert_eq!(decoder.decode(&wire), Err(DecoderError::SignatureInvalid));
}

#[test]
fn broadcast_subscription_rejected() {
    let (mut uplink, mut decoder) = setup();

    let record = uplink.issue(0, 0, 100).unwrap();
    let wire = uplink.seal_subscription(DECODER_ID, &record.to_bytes()).unwrap();

    assert_eq!(decoder.subscribe(&wire), Err(DecoderError::BroadcastSubscription));
    assert!(decoder.store().is_empty());
}

#[test]
fn broadcast_channel_needs_no_subscription() {
    let (mut uplink, decoder) = setup();

    let wire = uplink.frame_packet(0, 12345, b"emergency").unwrap();
    let frame = decoder.decode(&wire).unwrap();
    assert_eq!((frame.channel, frame.timestamp), (0, 12345));
    assert_eq!(frame.payload, b"emergency");
}

#[test]
fn unsubscribed_channel_rejected() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 5, 0, 100);

    let wire = uplink.frame_packet(9, 50, b"frame").unwrap();
    assert_eq!(decoder.decode(&wire), Err(DecoderError::NotSubscribed { channel: 9 }));
}

#[test]
fn tampering_detected_at_each_layer() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 5, 0, 100);

    let wire = uplink.frame_packet(5, 10, b"payload").unwrap();

    // Any flipped bit in the signed region breaks the signature
    let mut flipped = wire.clone();
    flipped[20] ^= 1;
    assert_eq!(decoder.decode(&flipped), Err(DecoderError::SignatureInvalid));

    // Re-signed but altered ciphertext fails the AEAD tag
    let signed_len = wire.len() - SIGNATURE_SIZE;
    let mut signed = wire[..signed_len].to_vec();
    signed[signed_len - 1] ^= 1;
    let resigned = uplink.sign(&signed);
    let err = decoder.decode(&resigned).unwrap_err();
    assert_eq!(err, DecoderError::DecryptionFailed);
    assert_eq!(err.class(), ErrorClass::Authentication);
}

#[test]
fn frame_encrypted_for_other_channel_fails_decryption() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 5, 0, 100);

    // Channel 6's key under channel 5's header
    let wire = uplink.frame_packet(6, 10, b"payload").unwrap();
    let mut signed = wire[..wire.len() - SIGNATURE_SIZE].to_vec();
    signed[4..8].copy_from_slice(&5u32.to_le_bytes());

    assert_eq!(decoder.decode(&uplink.sign(&signed)), Err(DecoderError::DecryptionFailed));
}

#[test]
fn subscription_for_other_decoder_rejected() {
    let (mut uplink, mut decoder) = setup();

    let wire = uplink.subscribe_packet(DECODER_ID + 1, 5, 0, 100).unwrap();
    assert_eq!(decoder.subscribe(&wire), Err(DecoderError::DecryptionFailed));
    assert!(decoder.store().is_empty());
}

#[test]
fn malformed_record_rejected() {
    let (mut uplink, mut decoder) = setup();

    let wire = uplink.seal_subscription(DECODER_ID, &[0x05, 0, 0]).unwrap();
    let err = decoder.subscribe(&wire).unwrap_err();
    assert_eq!(err, DecoderError::InvalidRecord(RecordError::TooShort { actual: 3 }));
    assert_eq!(err.class(), ErrorClass::Resource);
}

#[test]
fn resubscribe_replaces_window_in_place() {
    let (mut uplink, mut decoder) = setup();
    subscribe(&mut uplink, &mut decoder, 3, 1, 1);
    subscribe(&mut uplink, &mut decoder, 5, 0, 99);
    subscribe(&mut uplink, &mut decoder, 5, 200, 299);

    assert_eq!(decoder.store().len(), 2);
    let slots: Vec<_> = decoder.store().entries().map(|(slot, r)| (slot.index(), r.channel())).collect();
    assert_eq!(slots, vec![(0, 3), (1, 5)]);

    let old = uplink.frame_packet(5, 50, b"old").unwrap();
    assert!(matches!(decoder.decode(&old), Err(DecoderError::OutsideSubscription { .. })));

    let new = uplink.frame_packet(5, 250, b"new").unwrap();
    assert!(decoder.decode(&new).is_ok());
}

#[test]
fn store_full_rejects_new_channel_but_updates_existing() {
    let (mut uplink, mut decoder) = setup();
    for channel in 1..=SLOT_COUNT as u32 {
        subscribe(&mut uplink, &mut decoder, channel, 0, 1000);
    }

    let extra = uplink.subscribe_packet(DECODER_ID, 99, 0, 1000).unwrap();
    let err = decoder.subscribe(&extra).unwrap_err();
    assert_eq!(err, DecoderError::StoreFull { channel: 99 });
    assert_eq!(err.class(), ErrorClass::Resource);

    let update = uplink.subscribe_packet(DECODER_ID, 4, 500, 600).unwrap();
    assert_eq!(decoder.subscribe(&update).unwrap().index(), 3);
    assert_eq!(decoder.store().lookup(4).map(|r| (r.start(), r.end())), Some((500, 600)));
}

#[test]
fn list_reports_slots_in_order() {
    let (mut uplink, mut decoder) = setup();
    assert!(decoder.list(&[]).unwrap().entries.is_empty());

    subscribe(&mut uplink, &mut decoder, 8, 10, 20);
    subscribe(&mut uplink, &mut decoder, 2, 0, u64::MAX);

    let response = decoder.list(&[]).unwrap();
    assert_eq!(
        response.entries,
        vec![
            ListEntry { channel: 8, start: 10, end: 20 },
            ListEntry { channel: 2, start: 0, end: u64::MAX },
        ]
    );

    insta::assert_snapshot!(
        hex::encode(response.to_bytes().unwrap()),
        @"02000000080000000a000000000000001400000000000000020000000000000000000000ffffffffffffffff"
    );
}

#[test]
fn list_with_body_rejected() {
    let (_, decoder) = setup();
    assert_eq!(decoder.list(&[0]), Err(DecoderError::UnexpectedBody { len: 1 }));
}
