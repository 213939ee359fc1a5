//! DECODE: authenticate, authorize, decrypt, and order one broadcast frame.

use skycast_crypto::{FrameKey, derive_leaf_key};
use skycast_proto::{FrameEnvelope, SignedPacket};

use super::Decoder;
use crate::{
    config::ReplayPolicy,
    error::DecoderError,
    storage::{Block, Storage},
};

/// A frame that passed every check and may be delivered.
///
/// The replay cursor has not moved yet. Call [`Decoder::commit`] before any
/// byte of the plaintext leaves the decoder; dropping the frame instead leaves
/// the decoder exactly as it was.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an admitted frame must be delivered and committed"]
pub struct AdmittedFrame {
    /// Channel the frame was broadcast on
    pub channel: u32,
    /// Frame timestamp
    pub timestamp: u64,
    /// Decrypted frame
    pub payload: Vec<u8>,
}

impl<S: Storage> Decoder<S> {
    /// Run a complete DECODE request (header included) through the pipeline.
    ///
    /// Does not change decoder state.
    ///
    /// # Errors
    ///
    /// - `Malformed` if the request is too short or the frame too long
    /// - `SignatureInvalid` if the trailing signature does not verify
    /// - `NotSubscribed` or `OutsideSubscription` if the channel or timestamp
    ///   is not authorized
    /// - `DecryptionFailed` if the AEAD tag does not verify
    /// - `Replay` if the timestamp does not advance the channel's cursor
    pub fn decode(&self, wire: &[u8]) -> Result<AdmittedFrame, DecoderError> {
        let packet = SignedPacket::split(wire)?;
        skycast_crypto::verify(self.secrets.verifying_key(), packet.signed, packet.signature)
            .map_err(|_| DecoderError::SignatureInvalid)?;

        let envelope = FrameEnvelope::parse(packet.signed)?;
        let channel = envelope.aad.channel();
        let timestamp = envelope.aad.timestamp();

        let key = self.frame_key(channel, timestamp)?;

        let payload = skycast_crypto::open(
            &key,
            envelope.aad.nonce(),
            envelope.aad.bytes(),
            envelope.tag,
            envelope.ciphertext,
        )
        .map_err(|_| DecoderError::DecryptionFailed)?;

        self.replay.check(channel, timestamp)?;

        tracing::debug!(channel, timestamp, len = payload.len(), "Frame admitted");
        Ok(AdmittedFrame { channel, timestamp, payload })
    }

    /// Advance the replay cursor past a frame about to be released.
    ///
    /// With [`ReplayPolicy::Persistent`] the new table is written to the
    /// cursor bank not holding the current one, and memory changes only once
    /// that write lands. A failed commit leaves both memory and the newest
    /// stored table as they were.
    ///
    /// # Errors
    ///
    /// - `Replay` if another frame on the channel was committed in between
    /// - `Storage` if persisting the cursor table fails
    pub fn commit(&mut self, frame: &AdmittedFrame) -> Result<(), DecoderError> {
        let mut next = self.replay.clone();
        next.advance(frame.channel, frame.timestamp)?;

        if self.config.replay == ReplayPolicy::Persistent {
            let generation = self.replay_generation + 1;
            let block = Block::replay_bank(generation);
            let bytes = next.to_bank_bytes(generation);

            self.storage.erase_block(block)?;
            self.storage.write_block(block, &bytes)?;
            self.replay_generation = generation;
        }

        self.replay = next;
        Ok(())
    }

    /// Key for a frame on `channel` at `timestamp`.
    fn frame_key(&self, channel: u32, timestamp: u64) -> Result<FrameKey, DecoderError> {
        if channel == 0 {
            return Ok(self.secrets.broadcast_key().clone());
        }

        let record = self.store.lookup(channel).ok_or(DecoderError::NotSubscribed { channel })?;

        let node = record.find_covering_node(timestamp).ok_or(DecoderError::OutsideSubscription {
            channel,
            timestamp,
            start: record.start(),
            end: record.end(),
        })?;

        Ok(derive_leaf_key(node, timestamp)?)
    }
}
