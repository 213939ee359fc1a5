//! Invariant checking for decoder state.
//!
//! Invariants are properties that must hold after any sequence of requests,
//! including ones interrupted by storage faults. Tests capture a
//! [`DecoderSnapshot`] and run an [`InvariantRegistry`] against it.
//!
//! # Usage
//!
//! ```ignore
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&DecoderSnapshot::capture(&decoder)?)?;
//! ```

use std::collections::BTreeSet;

use skycast_core::{
    Block, Decoder, ReplayCursor, SLOT_COUNT, Storage, StorageError, SubscriptionRecord,
    replay::MAX_CURSORS,
};

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Invariant violation with context.
#[derive(Debug, Clone)]
pub struct Violation {
    /// Name of the violated invariant.
    pub invariant: &'static str,
    /// Description of what went wrong.
    pub message: String,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// Observable decoder state.
#[derive(Debug, Clone)]
pub struct DecoderSnapshot {
    /// In-memory slots, `None` where unused
    pub slots: Vec<Option<SubscriptionRecord>>,
    /// Raw persisted slot blocks, `None` where erased
    pub persisted: Vec<Option<Vec<u8>>>,
    /// Replay cursors
    pub cursors: Vec<ReplayCursor>,
}

impl DecoderSnapshot {
    /// Capture the state of `decoder` and its storage.
    pub fn capture<S: Storage>(decoder: &Decoder<S>) -> Result<Self, StorageError> {
        let mut slots = vec![None; SLOT_COUNT];
        for (slot, record) in decoder.store().entries() {
            slots[slot.index()] = Some(record.clone());
        }

        let persisted = (0..SLOT_COUNT)
            .map(|slot| decoder.storage().read_block(Block::Subscription(slot)))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { slots, persisted, cursors: decoder.replay().cursors().to_vec() })
    }
}

/// An invariant that can be checked against decoder state.
pub trait Invariant: Send + Sync {
    /// Invariant name for error reporting.
    fn name(&self) -> &'static str;

    /// Check the invariant against a snapshot.
    fn check(&self, state: &DecoderSnapshot) -> InvariantResult;
}

/// At most one populated slot per channel.
pub struct OneRecordPerChannel;

impl Invariant for OneRecordPerChannel {
    fn name(&self) -> &'static str {
        "one_record_per_channel"
    }

    fn check(&self, state: &DecoderSnapshot) -> InvariantResult {
        let mut seen = BTreeSet::new();
        for record in state.slots.iter().flatten() {
            if !seen.insert(record.channel()) {
                return Err(Violation {
                    invariant: self.name(),
                    message: format!("channel {} occupies two slots", record.channel()),
                });
            }
        }
        Ok(())
    }
}

/// Channel 0 never occupies a slot.
pub struct NoBroadcastSlot;

impl Invariant for NoBroadcastSlot {
    fn name(&self) -> &'static str {
        "no_broadcast_slot"
    }

    fn check(&self, state: &DecoderSnapshot) -> InvariantResult {
        match state.slots.iter().position(|slot| slot.as_ref().is_some_and(|r| r.channel() == 0)) {
            Some(index) => Err(Violation {
                invariant: self.name(),
                message: format!("slot {index} holds channel 0"),
            }),
            None => Ok(()),
        }
    }
}

/// Every populated slot is persisted byte for byte; no slot is populated
/// from a block that was never written.
pub struct StoreMatchesStorage;

impl Invariant for StoreMatchesStorage {
    fn name(&self) -> &'static str {
        "store_matches_storage"
    }

    fn check(&self, state: &DecoderSnapshot) -> InvariantResult {
        for (index, (slot, block)) in state.slots.iter().zip(&state.persisted).enumerate() {
            match (slot, block) {
                (Some(record), Some(bytes)) if record.to_bytes() == *bytes => {},
                (Some(record), _) => {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!(
                            "slot {index} holds channel {} but its block disagrees",
                            record.channel()
                        ),
                    });
                },
                (None, Some(bytes)) if SubscriptionRecord::decode(bytes).is_ok_and(|r| r.channel() != 0) => {
                    return Err(Violation {
                        invariant: self.name(),
                        message: format!("slot {index} is unused but its block holds a valid record"),
                    });
                },
                (None, _) => {},
            }
        }
        Ok(())
    }
}

/// The replay table never exceeds its capacity and holds one cursor per
/// channel.
pub struct ReplayWithinCapacity;

impl Invariant for ReplayWithinCapacity {
    fn name(&self) -> &'static str {
        "replay_within_capacity"
    }

    fn check(&self, state: &DecoderSnapshot) -> InvariantResult {
        if state.cursors.len() > MAX_CURSORS {
            return Err(Violation {
                invariant: self.name(),
                message: format!("{} cursors exceed capacity {MAX_CURSORS}", state.cursors.len()),
            });
        }

        let channels: BTreeSet<u32> = state.cursors.iter().map(|c| c.channel).collect();
        if channels.len() != state.cursors.len() {
            return Err(Violation { invariant: self.name(), message: "duplicate channel cursor".into() });
        }

        Ok(())
    }
}

/// Registry of invariants to check.
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl Default for InvariantRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self { invariants: Vec::new() }
    }

    /// Registry with every decoder invariant.
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(OneRecordPerChannel);
        registry.add(NoBroadcastSlot);
        registry.add(StoreMatchesStorage);
        registry.add(ReplayWithinCapacity);
        registry
    }

    /// Add an invariant.
    pub fn add(&mut self, invariant: impl Invariant + 'static) {
        self.invariants.push(Box::new(invariant));
    }

    /// Run every invariant, stopping at the first violation.
    pub fn check_all(&self, state: &DecoderSnapshot) -> InvariantResult {
        self.invariants.iter().try_for_each(|invariant| invariant.check(state))
    }
}
