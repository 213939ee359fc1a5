//! Storage error types.
//!
//! - `NotErased`: write to a block that still holds data
//! - `BlockTooLarge`: write larger than one block
//! - `Io`: underlying storage system errors

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Block must be erased before it is written again
    #[error("block {block} written without a preceding erase")]
    NotErased {
        /// Block number
        block: u32,
    },

    /// Data does not fit in one block
    #[error("block {block}: {size} bytes exceeds block size {max}")]
    BlockTooLarge {
        /// Block number
        block: u32,
        /// Bytes offered
        size: usize,
        /// Block capacity
        max: usize,
    },

    /// I/O error (file system, database, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
