//! Replay protection.
//!
//! One cursor per channel holding the newest timestamp already delivered. A
//! frame is admitted only if its timestamp is strictly greater than the
//! cursor, or the channel has never delivered a frame. Cursors move only
//! after a frame has been fully verified, decrypted, and handed to the host.

use bytes::{Buf, BufMut};
use thiserror::Error;

use crate::store::SLOT_COUNT;

/// Cursor capacity: every subscription slot plus the broadcast channel
pub const MAX_CURSORS: usize = SLOT_COUNT + 1;

const ENTRY_SIZE: usize = 12;

/// Reasons a frame fails the ordering check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReplayError {
    /// Timestamp not newer than the last delivered frame
    #[error("channel {channel}: timestamp {timestamp} not after {last}")]
    NotNewer {
        /// Channel of the frame
        channel: u32,
        /// Frame timestamp
        timestamp: u64,
        /// Last delivered timestamp
        last: u64,
    },

    /// No free cursor for a channel seen for the first time
    ///
    /// Cursors are never released. Once [`MAX_CURSORS`] distinct channels
    /// have delivered a frame, any further channel is refused for good, even
    /// one whose subscription reuses a slot freed by a failed install or a
    /// discarded record.
    #[error("replay table full, no cursor for channel {channel}")]
    TableFull {
        /// Channel that needed a cursor
        channel: u32,
    },
}

/// Last delivered timestamp of one channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayCursor {
    /// Channel the cursor tracks
    pub channel: u32,
    /// Newest delivered timestamp
    pub last_accepted: u64,
}

/// Fixed-capacity per-channel cursor table.
///
/// A cursor is created on a channel's first delivered frame and kept for the
/// decoder's lifetime.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplayTable {
    cursors: Vec<ReplayCursor>,
}

impl ReplayTable {
    /// Table with no cursors set.
    pub fn new() -> Self {
        Self { cursors: Vec::with_capacity(MAX_CURSORS) }
    }

    /// Cursor for `channel`, if it has delivered a frame.
    pub fn cursor(&self, channel: u32) -> Option<ReplayCursor> {
        self.cursors.iter().copied().find(|cursor| cursor.channel == channel)
    }

    /// Whether a frame at `timestamp` on `channel` may be delivered.
    ///
    /// # Errors
    ///
    /// - `ReplayError::NotNewer` if the timestamp does not advance the cursor
    /// - `ReplayError::TableFull` if the channel has no cursor and none is free
    pub fn check(&self, channel: u32, timestamp: u64) -> Result<(), ReplayError> {
        match self.cursor(channel) {
            Some(cursor) if timestamp <= cursor.last_accepted => {
                Err(ReplayError::NotNewer { channel, timestamp, last: cursor.last_accepted })
            },
            Some(_) => Ok(()),
            None if self.cursors.len() >= MAX_CURSORS => Err(ReplayError::TableFull { channel }),
            None => Ok(()),
        }
    }

    /// Record delivery of `timestamp` on `channel`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::check`]; the table is unchanged on error.
    pub fn advance(&mut self, channel: u32, timestamp: u64) -> Result<(), ReplayError> {
        self.check(channel, timestamp)?;

        if let Some(cursor) = self.cursors.iter_mut().find(|cursor| cursor.channel == channel) {
            debug_assert!(timestamp > cursor.last_accepted);
            cursor.last_accepted = timestamp;
        } else {
            debug_assert!(self.cursors.len() < MAX_CURSORS);
            self.cursors.push(ReplayCursor { channel, last_accepted: timestamp });
        }

        Ok(())
    }

    /// All cursors in insertion order.
    pub fn cursors(&self) -> &[ReplayCursor] {
        &self.cursors
    }

    /// Serialize for the replay storage block.
    ///
    /// `[count: u8] + count × [channel: u32 LE][last_accepted: u64 LE]`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(1 + self.cursors.len() * ENTRY_SIZE);
        out.put_u8(self.cursors.len() as u8);
        for cursor in &self.cursors {
            out.put_u32_le(cursor.channel);
            out.put_u64_le(cursor.last_accepted);
        }
        out
    }

    /// Parse the replay storage block. `None` if the block is malformed.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let (&count, mut rest) = bytes.split_first()?;
        let count = usize::from(count);

        if count > MAX_CURSORS || rest.len() != count * ENTRY_SIZE {
            return None;
        }

        let mut table = Self::new();
        for _ in 0..count {
            let channel = rest.get_u32_le();
            let last_accepted = rest.get_u64_le();
            if table.cursor(channel).is_some() {
                return None;
            }
            table.cursors.push(ReplayCursor { channel, last_accepted });
        }

        Some(table)
    }

    /// Serialize for a replay cursor bank, tagged with its commit generation.
    ///
    /// `[generation: u64 LE] + table bytes`
    pub fn to_bank_bytes(&self, generation: u64) -> Vec<u8> {
        let table = self.to_bytes();
        let mut out = Vec::with_capacity(8 + table.len());
        out.put_u64_le(generation);
        out.extend_from_slice(&table);
        out
    }

    /// Parse a replay cursor bank into its generation and table.
    pub fn from_bank_bytes(bytes: &[u8]) -> Option<(u64, Self)> {
        let (generation, table) = bytes.split_first_chunk::<8>()?;
        Some((u64::from_le_bytes(*generation), Self::from_bytes(table)?))
    }
}
