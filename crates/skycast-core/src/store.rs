//! Subscription store.
//!
//! Eight fixed slots, at most one record per channel. Each slot is mirrored
//! to its own storage block. The in-memory copy is authoritative while the
//! decoder runs; storage is only read at start-up.

use crate::{
    storage::{Block, Storage, StorageError},
    subscription::SubscriptionRecord,
};

/// Number of subscription slots
pub const SLOT_COUNT: usize = 8;

/// Position of a slot in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotRef(usize);

impl SlotRef {
    /// Slot number, `0..SLOT_COUNT`.
    pub fn index(self) -> usize {
        self.0
    }

    fn block(self) -> Block {
        Block::Subscription(self.0)
    }
}

/// Fixed-capacity table of channel subscriptions.
///
/// # Invariants
///
/// - At most one populated slot per channel
/// - No populated slot holds channel 0
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionStore {
    slots: [Option<SubscriptionRecord>; SLOT_COUNT],
}

impl Default for SubscriptionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionStore {
    /// Store with every slot unused.
    pub fn new() -> Self {
        Self { slots: [const { None }; SLOT_COUNT] }
    }

    /// Rebuild the store from storage.
    ///
    /// Erased blocks, channel-0 records, records that fail validation, and
    /// duplicates of a channel already restored are treated as unused slots.
    ///
    /// # Errors
    ///
    /// - `StorageError` if a block cannot be read
    pub fn restore<S: Storage>(storage: &S) -> Result<Self, StorageError> {
        let mut store = Self::new();

        for index in 0..SLOT_COUNT {
            let slot = SlotRef(index);
            let Some(bytes) = storage.read_block(slot.block())? else {
                continue;
            };

            let record = match SubscriptionRecord::decode(&bytes) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!(slot = index, error = %e, "Ignoring invalid stored subscription");
                    continue;
                },
            };

            if record.channel() == 0 {
                tracing::warn!(slot = index, "Ignoring stored subscription for broadcast channel");
                continue;
            }

            if store.lookup(record.channel()).is_some() {
                tracing::warn!(
                    slot = index,
                    channel = record.channel(),
                    "Ignoring duplicate stored subscription"
                );
                continue;
            }

            tracing::debug!(
                slot = index,
                channel = record.channel(),
                start = record.start(),
                end = record.end(),
                "Restored subscription"
            );
            store.slots[index] = Some(record);
        }

        Ok(store)
    }

    /// Record for `channel`. `None` if not subscribed (always `None` for 0).
    pub fn lookup(&self, channel: u32) -> Option<&SubscriptionRecord> {
        if channel == 0 {
            return None;
        }

        self.slots.iter().flatten().find(|record| record.channel() == channel)
    }

    /// Slot to write a record for `channel` into: the slot already holding
    /// it, else the first unused slot. `None` if the store is full.
    pub fn find_slot_for_update(&self, channel: u32) -> Option<SlotRef> {
        let existing = self
            .slots
            .iter()
            .position(|slot| slot.as_ref().is_some_and(|record| record.channel() == channel));

        existing.or_else(|| self.slots.iter().position(Option::is_none)).map(SlotRef)
    }

    /// Persist `record` into `slot` and replace the in-memory copy.
    ///
    /// Erases the slot's block, then writes the encoded record. If the erase
    /// succeeds but the write fails, the slot is left unused in both storage
    /// and memory; it never holds a mix of old and new data.
    ///
    /// # Errors
    ///
    /// - `StorageError` from the erase or write
    pub fn install<S: Storage>(
        &mut self,
        storage: &S,
        slot: SlotRef,
        record: SubscriptionRecord,
    ) -> Result<(), StorageError> {
        debug_assert_ne!(record.channel(), 0);
        debug_assert!(
            self.slots[slot.0].as_ref().is_none_or(|old| old.channel() == record.channel())
        );

        storage.erase_block(slot.block())?;
        self.slots[slot.0] = None;

        storage.write_block(slot.block(), &record.to_bytes())?;
        self.slots[slot.0] = Some(record);

        Ok(())
    }

    /// Populated slots in slot order.
    pub fn entries(&self) -> impl Iterator<Item = (SlotRef, &SubscriptionRecord)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| slot.as_ref().map(|record| (SlotRef(index), record)))
    }

    /// Number of populated slots.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Whether every slot is unused.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use skycast_crypto::{KEY_SIZE, TreeNode};

    use super::*;
    use crate::storage::{ChaoticStorage, FaultTarget, MemoryStorage};

    fn record(channel: u32, start: u64, end: u64) -> SubscriptionRecord {
        SubscriptionRecord::issue(channel, &TreeNode::root([channel as u8; KEY_SIZE]), start, end)
            .unwrap()
    }

    fn fill(store: &mut SubscriptionStore, storage: &MemoryStorage, channels: &[u32]) {
        for &channel in channels {
            let slot = store.find_slot_for_update(channel).unwrap();
            store.install(storage, slot, record(channel, 0, 100)).unwrap();
        }
    }

    #[test]
    fn empty_store() {
        let store = SubscriptionStore::new();
        assert!(store.is_empty());
        assert!(store.lookup(5).is_none());
        assert_eq!(store.find_slot_for_update(5).map(SlotRef::index), Some(0));
    }

    #[test]
    fn install_and_lookup() {
        let storage = MemoryStorage::new();
        let mut store = SubscriptionStore::new();
        fill(&mut store, &storage, &[5, 9]);

        assert_eq!(store.lookup(5).map(SubscriptionRecord::channel), Some(5));
        assert_eq!(store.lookup(9).map(SubscriptionRecord::channel), Some(9));
        assert!(store.lookup(6).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn update_reuses_existing_slot() {
        let storage = MemoryStorage::new();
        let mut store = SubscriptionStore::new();
        fill(&mut store, &storage, &[5, 9]);

        let slot = store.find_slot_for_update(9).unwrap();
        assert_eq!(slot.index(), 1);

        store.install(&storage, slot, record(9, 500, 600)).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.lookup(9).map(SubscriptionRecord::start), Some(500));
    }

    #[test]
    fn full_store_rejects_new_channel() {
        let storage = MemoryStorage::new();
        let mut store = SubscriptionStore::new();
        fill(&mut store, &storage, &[1, 2, 3, 4, 5, 6, 7, 8]);

        assert_eq!(store.find_slot_for_update(9), None);
        // Existing channels can still be updated.
        assert_eq!(store.find_slot_for_update(8).map(SlotRef::index), Some(7));
    }

    #[test]
    fn channel_zero_is_never_found() {
        let store = SubscriptionStore::new();
        assert!(store.lookup(0).is_none());
    }

    #[test]
    fn restore_round_trip() {
        let storage = MemoryStorage::new();
        let mut store = SubscriptionStore::new();
        fill(&mut store, &storage, &[5, 9, 11]);

        let restored = SubscriptionStore::restore(&storage).unwrap();
        assert_eq!(restored, store);
    }

    #[test]
    fn restore_skips_invalid_blocks() {
        let storage = MemoryStorage::new();
        storage.write_block(Block::Subscription(0), b"garbage").unwrap();
        storage.write_block(Block::Subscription(1), &record(0, 0, 10).to_bytes()).unwrap();
        storage.write_block(Block::Subscription(2), &record(4, 0, 10).to_bytes()).unwrap();

        let mut oversized = record(6, 0, 10).to_bytes();
        oversized[20] = 200;
        storage.write_block(Block::Subscription(3), &oversized).unwrap();

        let restored = SubscriptionStore::restore(&storage).unwrap();
        let channels: Vec<_> = restored.entries().map(|(slot, r)| (slot.index(), r.channel())).collect();
        assert_eq!(channels, vec![(2, 4)]);

        // Unusable slots are free for new subscriptions.
        assert_eq!(restored.find_slot_for_update(7).map(SlotRef::index), Some(0));
    }

    #[test]
    fn failed_write_leaves_slot_unused() {
        let memory = MemoryStorage::new();
        let mut store = SubscriptionStore::new();
        fill(&mut store, &memory, &[5]);

        let failing = ChaoticStorage::new(memory.clone(), 1.0).targeting(FaultTarget::WritesOnly);
        let slot = store.find_slot_for_update(5).unwrap();
        assert!(store.install(&failing, slot, record(5, 200, 300)).is_err());

        assert!(store.lookup(5).is_none());
        assert_eq!(memory.read_block(Block::Subscription(0)).unwrap(), None);
        assert_eq!(SubscriptionStore::restore(&memory).unwrap(), store);
    }

    #[test]
    fn failed_erase_keeps_old_record() {
        let memory = MemoryStorage::new();
        let mut store = SubscriptionStore::new();
        fill(&mut store, &memory, &[5]);

        let failing = ChaoticStorage::new(memory.clone(), 1.0);
        let slot = store.find_slot_for_update(5).unwrap();
        assert!(store.install(&failing, slot, record(5, 200, 300)).is_err());

        assert_eq!(store.lookup(5).map(SubscriptionRecord::start), Some(0));
        assert_eq!(SubscriptionStore::restore(&memory).unwrap(), store);
    }
}
