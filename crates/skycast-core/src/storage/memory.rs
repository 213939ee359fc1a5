use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use super::{Block, Storage, StorageError, check_block_size};

/// In-memory storage implementation for testing and ephemeral decoders
///
/// Blocks live in a `HashMap` behind Arc<Mutex<>> so clones share state. Uses
/// `lock().expect()`, which panics if the mutex is poisoned; acceptable for
/// test and simulation code.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryStorageInner>>,
}

#[derive(Default)]
struct MemoryStorageInner {
    /// Written blocks; absent means erased
    blocks: HashMap<u32, Vec<u8>>,

    /// Erase operations performed
    erase_count: usize,

    /// Write operations performed
    write_count: usize,
}

impl MemoryStorage {
    /// Create a new, fully erased `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blocks currently holding data.
    #[allow(clippy::expect_used)]
    pub fn written_block_count(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").blocks.len()
    }

    /// Total erase and write operations since creation.
    #[allow(clippy::expect_used)]
    pub fn operation_counts(&self) -> (usize, usize) {
        let inner = self.inner.lock().expect("Mutex poisoned");
        (inner.erase_count, inner.write_count)
    }
}

impl Storage for MemoryStorage {
    #[allow(clippy::expect_used)]
    fn erase_block(&self, block: Block) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().expect("Mutex poisoned");
        inner.erase_count += 1;
        inner.blocks.remove(&block.number());
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn write_block(&self, block: Block, data: &[u8]) -> Result<(), StorageError> {
        check_block_size(block, data)?;

        let mut inner = self.inner.lock().expect("Mutex poisoned");
        if inner.blocks.contains_key(&block.number()) {
            return Err(StorageError::NotErased { block: block.number() });
        }

        inner.write_count += 1;
        inner.blocks.insert(block.number(), data.to_vec());

        debug_assert_eq!(inner.blocks.get(&block.number()).map(Vec::len), Some(data.len()));
        Ok(())
    }

    #[allow(clippy::expect_used)]
    fn read_block(&self, block: Block) -> Result<Option<Vec<u8>>, StorageError> {
        Ok(self.inner.lock().expect("Mutex poisoned").blocks.get(&block.number()).cloned())
    }
}
