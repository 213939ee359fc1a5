//! Redb-backed durable block storage.
//!
//! Uses Redb's ACID transactions with Copy-on-Write for crash safety. Each
//! erase and each write is its own transaction, so a crash between the two
//! leaves the block erased, never half-written.

use std::{path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use skycast_core::storage::{Block, Storage, StorageError, check_block_size};

/// Table: blocks
/// Key: block number (subscription slot, or the replay cursor block)
/// Value: block contents; absent means erased
const BLOCKS: TableDefinition<u32, &[u8]> = TableDefinition::new("blocks");

/// Durable storage backed by Redb.
///
/// Thread-safe through Redb's internal locking. Clone is cheap (Arc).
#[derive(Clone)]
pub struct RedbStorage {
    db: Arc<Database>,
}

impl RedbStorage {
    /// Open or create a Redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the database cannot be opened or created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io)?;

        let txn = db.begin_write().map_err(io)?;
        {
            let _ = txn.open_table(BLOCKS).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(Self { db: Arc::new(db) })
    }
}

impl Storage for RedbStorage {
    fn erase_block(&self, block: Block) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(BLOCKS).map_err(io)?;
            table.remove(block.number()).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn write_block(&self, block: Block, data: &[u8]) -> Result<(), StorageError> {
        check_block_size(block, data)?;

        let txn = self.db.begin_write().map_err(io)?;
        {
            let mut table = txn.open_table(BLOCKS).map_err(io)?;

            let occupied = table.get(block.number()).map_err(io)?.is_some();
            if occupied {
                return Err(StorageError::NotErased { block: block.number() });
            }

            table.insert(block.number(), data).map_err(io)?;
        }
        txn.commit().map_err(io)?;

        Ok(())
    }

    fn read_block(&self, block: Block) -> Result<Option<Vec<u8>>, StorageError> {
        let txn = self.db.begin_read().map_err(io)?;
        let table = txn.open_table(BLOCKS).map_err(io)?;

        Ok(table.get(block.number()).map_err(io)?.map(|guard| guard.value().to_vec()))
    }
}

fn io(err: impl std::fmt::Display) -> StorageError {
    StorageError::Io(err.to_string())
}
