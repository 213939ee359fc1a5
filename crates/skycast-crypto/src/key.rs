//! Symmetric key type shared by the tree and the AEAD.

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::CryptoError;

/// Size of every symmetric key in the system (AES-128)
pub const KEY_SIZE: usize = 16;

/// A 16-byte AES-128-GCM key.
///
/// Leaf keys from the tree, the broadcast key, and the subscription-update
/// key all share this type. The bytes are zeroized when the key is dropped.
#[derive(Clone, PartialEq, Eq)]
pub struct FrameKey([u8; KEY_SIZE]);

impl FrameKey {
    /// Wrap raw key bytes.
    #[must_use]
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy key bytes from a slice of exactly [`KEY_SIZE`] bytes.
    ///
    /// # Errors
    ///
    /// - `CryptoError::InvalidKeyLength` for any other length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array = <[u8; KEY_SIZE]>::try_from(bytes)
            .map_err(|_| CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() })?;
        Ok(Self(array))
    }

    /// Raw key bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Per-device key for subscription blobs.
///
/// `SHA-256(shared_key_root ‖ decoder_id as 4 big-endian bytes)`, truncated
/// to [`KEY_SIZE`]. The uplink computes the same value to address a
/// subscription to one device.
#[must_use]
pub fn derive_subscription_key(shared_key_root: &[u8], decoder_id: u32) -> FrameKey {
    let mut digest: [u8; 32] = Sha256::new()
        .chain_update(shared_key_root)
        .chain_update(decoder_id.to_be_bytes())
        .finalize()
        .into();

    let mut key = [0u8; KEY_SIZE];
    key.copy_from_slice(&digest[..KEY_SIZE]);
    digest.zeroize();

    FrameKey(key)
}

impl Drop for FrameKey {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl std::fmt::Debug for FrameKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FrameKey(<redacted>)")
    }
}
