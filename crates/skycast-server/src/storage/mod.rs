//! Durable storage backends for the decoder binary.
//!
//! The [`Storage`] trait and the in-memory backends live in `skycast-core`;
//! this module adds the on-disk one.

mod redb;

pub use skycast_core::storage::{Block, MemoryStorage, Storage, StorageError};

pub use self::redb::RedbStorage;
