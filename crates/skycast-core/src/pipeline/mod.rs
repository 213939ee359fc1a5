//! Request pipelines and the decoder context they run against.
//!
//! [`Decoder`] owns every piece of mutable decoder state: the subscription
//! store, the replay table, and the storage handle. It is created once at
//! start-up and driven by one request at a time, so no locking is needed.
//!
//! ```text
//! DECODE    → signature → channel → leaf key → AEAD open → replay check → AdmittedFrame
//!                                                                           │ (header acked)
//!                                                                           ▼
//!                                                        Decoder::commit → plaintext
//! SUBSCRIBE → signature → AEAD open → record validation → slot → erase + write
//! LIST      → empty body → store entries
//! ```

mod decode;
mod list;
mod subscribe;

pub use decode::AdmittedFrame;

use crate::{
    config::{DecoderConfig, ReplayPolicy},
    error::DecoderError,
    replay::ReplayTable,
    secrets::DecoderSecrets,
    storage::{Block, REPLAY_BANKS, Storage},
    store::SubscriptionStore,
};

/// Decoder context: secrets, subscriptions, replay cursors, storage.
#[derive(Debug)]
pub struct Decoder<S: Storage> {
    secrets: DecoderSecrets,
    config: DecoderConfig,
    store: SubscriptionStore,
    replay: ReplayTable,
    replay_generation: u64,
    storage: S,
}

impl<S: Storage> Decoder<S> {
    /// Create the decoder, restoring subscriptions (and, with
    /// [`ReplayPolicy::Persistent`], replay cursors) from `storage`.
    ///
    /// # Errors
    ///
    /// - `DecoderError::Storage` if a block cannot be read
    pub fn new(secrets: DecoderSecrets, config: DecoderConfig, storage: S) -> Result<Self, DecoderError> {
        let store = SubscriptionStore::restore(&storage)?;

        let (replay_generation, replay) = match config.replay {
            ReplayPolicy::Volatile => (0, ReplayTable::new()),
            ReplayPolicy::Persistent => restore_cursors(&storage)?,
        };

        tracing::info!(
            subscriptions = store.len(),
            cursors = replay.cursors().len(),
            replay_generation,
            replay_policy = ?config.replay,
            "Decoder state restored"
        );

        Ok(Self { secrets, config, store, replay, replay_generation, storage })
    }

    /// Installed subscriptions.
    pub fn store(&self) -> &SubscriptionStore {
        &self.store
    }

    /// Replay cursors.
    pub fn replay(&self) -> &ReplayTable {
        &self.replay
    }

    /// Active configuration.
    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Storage backend.
    pub fn storage(&self) -> &S {
        &self.storage
    }
}

/// Newest well-formed cursor table across the replay banks.
///
/// Generation 0 with an empty table if no bank holds one.
fn restore_cursors<S: Storage>(storage: &S) -> Result<(u64, ReplayTable), DecoderError> {
    let mut newest: Option<(u64, ReplayTable)> = None;

    for bank in 0..REPLAY_BANKS {
        let Some(bytes) = storage.read_block(Block::ReplayCursors(bank))? else {
            continue;
        };

        match ReplayTable::from_bank_bytes(&bytes) {
            Some((generation, table))
                if Block::replay_bank(generation) == Block::ReplayCursors(bank) =>
            {
                if newest.as_ref().is_none_or(|(newest, _)| generation > *newest) {
                    newest = Some((generation, table));
                }
            },
            _ => tracing::warn!(bank, len = bytes.len(), "Ignoring malformed replay cursor bank"),
        }
    }

    Ok(newest.unwrap_or_default())
}
