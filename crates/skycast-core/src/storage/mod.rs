//! Storage abstraction for decoder state
//!
//! Persistent state lives in fixed-size blocks with flash semantics: a block
//! is either erased or holds exactly the bytes of its last write, and a write
//! must be preceded by an erase. One block per subscription slot, plus two
//! banks for the replay cursor table that are written alternately. The trait is synchronous; the request loop
//! never overlaps storage operations.

mod chaotic;
mod error;
mod memory;

pub use chaotic::{ChaoticStorage, FaultTarget};
pub use error::StorageError;
pub use memory::MemoryStorage;

use crate::store::SLOT_COUNT;

/// Capacity of one storage block in bytes
pub const BLOCK_SIZE: usize = 4096;

/// Replay cursor banks. A commit rewrites the bank not holding the newest
/// table, so the previous table stays intact until the write lands.
pub const REPLAY_BANKS: usize = 2;

/// Addressable storage block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Block {
    /// Subscription slot `0..SLOT_COUNT`
    Subscription(usize),
    /// Persisted replay cursors, bank `0..REPLAY_BANKS`
    ReplayCursors(usize),
}

impl Block {
    /// Stable block number used as the storage key.
    pub fn number(self) -> u32 {
        match self {
            Self::Subscription(slot) => {
                debug_assert!(slot < SLOT_COUNT);
                slot as u32
            },
            Self::ReplayCursors(bank) => {
                debug_assert!(bank < REPLAY_BANKS);
                (SLOT_COUNT + bank) as u32
            },
        }
    }

    /// Cursor bank that holds the table written at `generation`.
    pub fn replay_bank(generation: u64) -> Self {
        Self::ReplayCursors((generation % REPLAY_BANKS as u64) as usize)
    }
}

impl std::fmt::Display for Block {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Subscription(slot) => write!(f, "subscription slot {slot}"),
            Self::ReplayCursors(bank) => write!(f, "replay cursor bank {bank}"),
        }
    }
}

/// Block storage for subscriptions and replay state
///
/// Must be Clone (the binary hands the same backend to every session), Send +
/// Sync (sessions run on blocking worker threads), and synchronous.
/// Implementations share internal state via Arc, so clones access the same
/// underlying storage.
pub trait Storage: Clone + Send + Sync + 'static {
    /// Erase a block. Erasing an already-erased block is a no-op.
    fn erase_block(&self, block: Block) -> Result<(), StorageError>;

    /// Write `data` into an erased block.
    ///
    /// # Invariants
    ///
    /// - Pre: `block` is erased
    /// - Pre: `data.len() <= BLOCK_SIZE`
    /// - Post: [`Storage::read_block`] returns exactly `data`
    fn write_block(&self, block: Block, data: &[u8]) -> Result<(), StorageError>;

    /// Contents of a block. `None` if erased.
    fn read_block(&self, block: Block) -> Result<Option<Vec<u8>>, StorageError>;
}

/// Reject writes larger than one block. Backends call this before writing.
pub fn check_block_size(block: Block, data: &[u8]) -> Result<(), StorageError> {
    if data.len() > BLOCK_SIZE {
        return Err(StorageError::BlockTooLarge {
            block: block.number(),
            size: data.len(),
            max: BLOCK_SIZE,
        });
    }
    Ok(())
}
