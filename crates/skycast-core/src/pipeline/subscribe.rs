//! SUBSCRIBE: install or replace one channel's subscription.

use skycast_proto::{SignedPacket, SubscriptionEnvelope};

use super::Decoder;
use crate::{
    error::DecoderError, storage::Storage, store::SlotRef, subscription::SubscriptionRecord,
};

impl<S: Storage> Decoder<S> {
    /// Run a complete SUBSCRIBE request (header included) through the
    /// pipeline and install the record.
    ///
    /// Returns the slot the record now occupies.
    ///
    /// # Errors
    ///
    /// - `Malformed` if the request is too short
    /// - `SignatureInvalid` if the trailing signature does not verify
    /// - `DecryptionFailed` if the blob was not sealed for this device
    /// - `InvalidRecord` if the plaintext is not a valid record
    /// - `BroadcastSubscription` if the record names channel 0
    /// - `StoreFull` if the channel is new and every slot is taken
    /// - `Storage` if the erase or write fails
    pub fn subscribe(&mut self, wire: &[u8]) -> Result<SlotRef, DecoderError> {
        let packet = SignedPacket::split(wire)?;
        skycast_crypto::verify(self.secrets.verifying_key(), packet.signed, packet.signature)
            .map_err(|_| DecoderError::SignatureInvalid)?;

        let envelope = SubscriptionEnvelope::parse(packet.signed)?;
        let plaintext = skycast_crypto::open(
            self.secrets.subscription_key(),
            envelope.aad.nonce(),
            envelope.aad.bytes(),
            envelope.tag,
            envelope.ciphertext,
        )
        .map_err(|_| DecoderError::DecryptionFailed)?;

        let record = SubscriptionRecord::decode(&plaintext)?;
        let channel = record.channel();
        if channel == 0 {
            return Err(DecoderError::BroadcastSubscription);
        }

        let slot = self.store.find_slot_for_update(channel).ok_or(DecoderError::StoreFull { channel })?;

        let (start, end, nodes) = (record.start(), record.end(), record.nodes().len());
        self.store.install(&self.storage, slot, record).map_err(|e| {
            tracing::error!(channel, slot = slot.index(), error = %e, "Failed to persist subscription");
            e
        })?;

        tracing::info!(channel, slot = slot.index(), start, end, nodes, "Subscription installed");
        Ok(slot)
    }
}
