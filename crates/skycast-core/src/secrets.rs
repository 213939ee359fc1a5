//! Boot-time secrets held by the decoder.

use skycast_crypto::{FrameKey, VerifyingKey, derive_subscription_key};

/// Keys the decoder needs to serve requests.
///
/// Loaded once at start-up and never modified. [`FrameKey`] zeroizes itself
/// on drop; the verifying key is public.
#[derive(Debug, Clone)]
pub struct DecoderSecrets {
    verifying_key: VerifyingKey,
    broadcast_key: FrameKey,
    subscription_key: FrameKey,
}

impl DecoderSecrets {
    /// Assemble secrets from already-derived keys.
    pub fn new(verifying_key: VerifyingKey, broadcast_key: FrameKey, subscription_key: FrameKey) -> Self {
        Self { verifying_key, broadcast_key, subscription_key }
    }

    /// Derive the per-device subscription key from the shared root and
    /// assemble the secrets for device `decoder_id`.
    pub fn for_decoder(
        verifying_key: VerifyingKey,
        broadcast_key: FrameKey,
        shared_key_root: &[u8],
        decoder_id: u32,
    ) -> Self {
        Self::new(verifying_key, broadcast_key, derive_subscription_key(shared_key_root, decoder_id))
    }

    /// Public key of the uplink that signs every request.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Fixed key of channel 0.
    pub fn broadcast_key(&self) -> &FrameKey {
        &self.broadcast_key
    }

    /// Key sealing subscription blobs addressed to this device.
    pub fn subscription_key(&self) -> &FrameKey {
        &self.subscription_key
    }
}
