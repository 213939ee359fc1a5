//! Host-side encoder: subscriptions and frames as the uplink produces them.

use std::collections::BTreeMap;

use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use skycast_core::{DecoderSecrets, RecordError, SubscriptionRecord};
use skycast_crypto::{FrameKey, KEY_SIZE, TreeNode, derive_leaf_key, derive_subscription_key};
use skycast_proto::{
    Envelope, FrameAad, NONCE_SIZE, Opcode, PacketHeader, ProtocolError, SignedPacket,
    SubscriptionAad,
};
use skycast_server::DecoderSecretsFile;
use thiserror::Error;

/// Failures building uplink packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum UplinkError {
    /// Subscription range could not be issued
    #[error(transparent)]
    Record(#[from] RecordError),

    /// Packet would not fit the wire format
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

/// Deterministic uplink.
///
/// Channel root keys are drawn from the seeded RNG the first time a channel
/// is used. Nonces come from the same RNG, so two uplinks built from the same
/// seed emit byte-identical packets for the same call sequence.
pub struct Uplink {
    rng: ChaCha8Rng,
    signing_key: SigningKey,
    broadcast_key: [u8; KEY_SIZE],
    shared_key_root: [u8; 32],
    channel_roots: BTreeMap<u32, [u8; KEY_SIZE]>,
}

impl Uplink {
    /// Create an uplink whose keys derive from `seed`.
    pub fn from_seed(seed: u64) -> Self {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let signing_key = SigningKey::from_bytes(&rng.r#gen());
        let broadcast_key = rng.r#gen();
        let shared_key_root = rng.r#gen();

        Self { rng, signing_key, broadcast_key, shared_key_root, channel_roots: BTreeMap::new() }
    }

    /// Public key decoders verify requests with.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Tree root key of `channel` (the broadcast key for channel 0).
    pub fn root_key(&mut self, channel: u32) -> [u8; KEY_SIZE] {
        if channel == 0 {
            return self.broadcast_key;
        }

        let rng = &mut self.rng;
        *self.channel_roots.entry(channel).or_insert_with(|| rng.r#gen())
    }

    /// Boot secrets of decoder `decoder_id`.
    pub fn secrets_for(&self, decoder_id: u32) -> DecoderSecrets {
        DecoderSecrets::for_decoder(
            self.verifying_key(),
            FrameKey::from_bytes(self.broadcast_key),
            &self.shared_key_root,
            decoder_id,
        )
    }

    /// Secrets file for decoder `decoder_id`: public key, broadcast key, and
    /// its subscription key. Nothing else of the uplink's key material.
    pub fn provision(&self, decoder_id: u32) -> DecoderSecretsFile {
        DecoderSecretsFile::from_secrets(decoder_id, &self.secrets_for(decoder_id))
    }

    /// Subscription record for `[start, end]` on `channel`.
    pub fn issue(&mut self, channel: u32, start: u64, end: u64) -> Result<SubscriptionRecord, UplinkError> {
        let root = TreeNode::root(self.root_key(channel));
        Ok(SubscriptionRecord::issue(channel, &root, start, end)?)
    }

    /// Complete SUBSCRIBE request granting `[start, end]` on `channel` to
    /// decoder `decoder_id`.
    pub fn subscribe_packet(
        &mut self,
        decoder_id: u32,
        channel: u32,
        start: u64,
        end: u64,
    ) -> Result<Vec<u8>, UplinkError> {
        let record = self.issue(channel, start, end)?;
        self.seal_subscription(decoder_id, &record.to_bytes())
    }

    /// Complete SUBSCRIBE request carrying arbitrary `plaintext`.
    pub fn seal_subscription(&mut self, decoder_id: u32, plaintext: &[u8]) -> Result<Vec<u8>, UplinkError> {
        let key = derive_subscription_key(&self.shared_key_root, decoder_id);
        let nonce = self.nonce();

        let aad = SubscriptionAad::new(nonce, plaintext.len())?;
        let (ciphertext, tag) = skycast_crypto::seal(&key, &nonce, aad.bytes(), plaintext);

        Ok(self.sign(&Envelope::encode(&aad, &tag, &ciphertext)))
    }

    /// Complete DECODE request for `plaintext` on `channel` at `timestamp`.
    pub fn frame_packet(&mut self, channel: u32, timestamp: u64, plaintext: &[u8]) -> Result<Vec<u8>, UplinkError> {
        let key = self.frame_key(channel, timestamp);
        let nonce = self.nonce();

        let aad = FrameAad::new(channel, timestamp, nonce, plaintext.len())?;
        let (ciphertext, tag) = skycast_crypto::seal(&key, &nonce, aad.bytes(), plaintext);

        Ok(self.sign(&Envelope::encode(&aad, &tag, &ciphertext)))
    }

    /// Key of the frame on `channel` at `timestamp`.
    pub fn frame_key(&mut self, channel: u32, timestamp: u64) -> FrameKey {
        if channel == 0 {
            return FrameKey::from_bytes(self.broadcast_key);
        }

        let root = TreeNode::root(self.root_key(channel));
        let Ok(key) = derive_leaf_key(&root, timestamp) else {
            unreachable!("the root covers every timestamp");
        };
        key
    }

    /// Append the uplink signature over `signed`.
    pub fn sign(&self, signed: &[u8]) -> Vec<u8> {
        let signature = self.signing_key.sign(signed);
        SignedPacket::join(signed, &signature.to_bytes())
    }

    /// Zero-length LIST request.
    pub fn list_packet() -> Vec<u8> {
        PacketHeader::new(Opcode::List, 0).to_bytes().to_vec()
    }

    fn nonce(&mut self) -> [u8; NONCE_SIZE] {
        self.rng.r#gen()
    }
}
