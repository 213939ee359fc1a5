//! Decoder restarts over the same storage.
//!
//! Subscriptions always survive; replay cursors survive only under
//! `ReplayPolicy::Persistent`.

use skycast_core::{
    Block, ChaoticStorage, Decoder, DecoderConfig, DecoderError, FaultTarget, MemoryStorage,
    REPLAY_BANKS, ReplayError, ReplayPolicy, Storage,
};
use skycast_harness::Uplink;

const DECODER_ID: u32 = 7;

fn boot(uplink: &Uplink, config: DecoderConfig, storage: &MemoryStorage) -> Decoder<MemoryStorage> {
    Decoder::new(uplink.secrets_for(DECODER_ID), config, storage.clone()).unwrap()
}

fn cursor_banks(storage: &MemoryStorage) -> Vec<Option<Vec<u8>>> {
    (0..REPLAY_BANKS).map(|bank| storage.read_block(Block::ReplayCursors(bank)).unwrap()).collect()
}

#[test]
fn subscriptions_survive_restart() {
    let mut uplink = Uplink::from_seed(3);
    let storage = MemoryStorage::new();

    {
        let mut decoder = boot(&uplink, DecoderConfig::default(), &storage);
        for (channel, start, end) in [(1, 0, 99), (2, 1000, 2000), (3, 0, u64::MAX)] {
            let wire = uplink.subscribe_packet(DECODER_ID, channel, start, end).unwrap();
            decoder.subscribe(&wire).unwrap();
        }
    }

    let decoder = boot(&uplink, DecoderConfig::default(), &storage);
    let listed: Vec<_> = decoder.list(&[]).unwrap().entries.iter().map(|e| (e.channel, e.start, e.end)).collect();
    assert_eq!(listed, vec![(1, 0, 99), (2, 1000, 2000), (3, 0, u64::MAX)]);

    let wire = uplink.frame_packet(2, 1500, b"after restart").unwrap();
    assert_eq!(decoder.decode(&wire).unwrap().payload, b"after restart");
}

#[test]
fn persistent_cursor_blocks_replay_after_restart() {
    let mut uplink = Uplink::from_seed(3);
    let storage = MemoryStorage::new();
    let wire = uplink.frame_packet(0, 500, b"broadcast").unwrap();

    {
        let mut decoder = boot(&uplink, DecoderConfig::persistent(), &storage);
        let frame = decoder.decode(&wire).unwrap();
        decoder.commit(&frame).unwrap();
    }

    assert!(cursor_banks(&storage).iter().any(Option::is_some));

    let decoder = boot(&uplink, DecoderConfig::persistent(), &storage);
    assert_eq!(
        decoder.decode(&wire),
        Err(DecoderError::Replay(ReplayError::NotNewer { channel: 0, timestamp: 500, last: 500 }))
    );
}

#[test]
fn volatile_cursor_resets_on_restart() {
    let mut uplink = Uplink::from_seed(3);
    let storage = MemoryStorage::new();
    let wire = uplink.frame_packet(0, 500, b"broadcast").unwrap();

    {
        let mut decoder = boot(&uplink, DecoderConfig::default(), &storage);
        assert_eq!(decoder.config().replay, ReplayPolicy::Volatile);
        let frame = decoder.decode(&wire).unwrap();
        decoder.commit(&frame).unwrap();
        assert!(decoder.decode(&wire).is_err());
    }

    assert!(cursor_banks(&storage).iter().all(Option::is_none));

    let decoder = boot(&uplink, DecoderConfig::default(), &storage);
    assert!(decoder.decode(&wire).is_ok());
}

#[test]
fn corrupt_cursor_block_starts_empty() {
    let uplink = Uplink::from_seed(3);
    let storage = MemoryStorage::new();
    storage.write_block(Block::ReplayCursors(0), &[0xFF, 1, 2]).unwrap();

    let decoder = boot(&uplink, DecoderConfig::persistent(), &storage);
    assert!(decoder.replay().cursors().is_empty());
}

#[test]
fn newest_cursor_bank_wins_after_restart() {
    let mut uplink = Uplink::from_seed(3);
    let storage = MemoryStorage::new();

    {
        let mut decoder = boot(&uplink, DecoderConfig::persistent(), &storage);
        for timestamp in [10, 20, 30] {
            let wire = uplink.frame_packet(0, timestamp, b"tick").unwrap();
            let frame = decoder.decode(&wire).unwrap();
            decoder.commit(&frame).unwrap();
        }
    }

    // Both banks hold a table, one generation apart
    assert!(cursor_banks(&storage).iter().all(Option::is_some));

    let decoder = boot(&uplink, DecoderConfig::persistent(), &storage);
    assert_eq!(decoder.replay().cursor(0).map(|c| c.last_accepted), Some(30));
}

#[test]
fn failed_cursor_write_keeps_last_committed_table() {
    let mut uplink = Uplink::from_seed(3);
    let storage = MemoryStorage::new();
    let first = uplink.frame_packet(0, 100, b"first").unwrap();
    let second = uplink.frame_packet(0, 200, b"second").unwrap();

    {
        let mut decoder = boot(&uplink, DecoderConfig::persistent(), &storage);
        let frame = decoder.decode(&first).unwrap();
        decoder.commit(&frame).unwrap();
    }

    {
        let failing = ChaoticStorage::new(storage.clone(), 1.0).targeting(FaultTarget::WritesOnly);
        let mut decoder =
            Decoder::new(uplink.secrets_for(DECODER_ID), DecoderConfig::persistent(), failing).unwrap();

        let frame = decoder.decode(&second).unwrap();
        assert!(matches!(decoder.commit(&frame), Err(DecoderError::Storage(_))));
        assert_eq!(decoder.replay().cursor(0).map(|c| c.last_accepted), Some(100));
        assert_eq!(
            decoder.decode(&first),
            Err(DecoderError::Replay(ReplayError::NotNewer { channel: 0, timestamp: 100, last: 100 }))
        );
    }

    let decoder = boot(&uplink, DecoderConfig::persistent(), &storage);
    assert_eq!(
        decoder.decode(&first),
        Err(DecoderError::Replay(ReplayError::NotNewer { channel: 0, timestamp: 100, last: 100 }))
    );
    assert_eq!(decoder.decode(&second).unwrap().payload, b"second");
}

#[test]
fn corrupt_subscription_block_is_unused_slot() {
    let mut uplink = Uplink::from_seed(3);
    let storage = MemoryStorage::new();

    {
        let mut decoder = boot(&uplink, DecoderConfig::default(), &storage);
        let wire = uplink.subscribe_packet(DECODER_ID, 4, 0, 10).unwrap();
        decoder.subscribe(&wire).unwrap();
    }

    storage.erase_block(Block::Subscription(0)).unwrap();
    storage.write_block(Block::Subscription(0), &[4, 0, 0, 0, 0xFF]).unwrap();

    let mut decoder = boot(&uplink, DecoderConfig::default(), &storage);
    assert!(decoder.store().is_empty());

    // The slot is reusable
    let wire = uplink.subscribe_packet(DECODER_ID, 4, 0, 10).unwrap();
    assert_eq!(decoder.subscribe(&wire).unwrap().index(), 0);
}
