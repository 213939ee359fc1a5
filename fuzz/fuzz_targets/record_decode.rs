//! Fuzz target for subscription record decoding
//!
//! Records arrive decrypted from SUBSCRIBE requests and are read back from
//! storage at start-up, so both paths see attacker-shaped bytes.
//!
//! # Invariants
//!
//! - Decoding NEVER panics
//! - A decoded record re-encodes to the identical bytes
//! - Every timestamp in `[start, end]` has a covering node whose leaf key
//!   derives without error; the timestamps just outside have none

#![no_main]

use libfuzzer_sys::fuzz_target;
use skycast_core::SubscriptionRecord;
use skycast_crypto::derive_leaf_key;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = SubscriptionRecord::decode(data) else {
        return;
    };

    assert_eq!(record.to_bytes(), data);

    let (start, end) = (record.start(), record.end());
    let mid = start + (end - start) / 2;
    for timestamp in [start, mid, end] {
        let node = record.find_covering_node(timestamp).unwrap();
        assert!(derive_leaf_key(node, timestamp).is_ok());
    }

    if let Some(before) = start.checked_sub(1) {
        assert!(record.find_covering_node(before).is_none());
    }
    if let Some(after) = end.checked_add(1) {
        assert!(record.find_covering_node(after).is_none());
    }
});
