//! AES-128-GCM with detached tags.
//!
//! Requests carry the tag ahead of the ciphertext, so both directions work on
//! a detached tag instead of the `ciphertext ‖ tag` layout of the combined
//! API. Callers supply nonces; this module never generates randomness.

use aes_gcm::{
    Aes128Gcm, Key, KeyInit, Nonce, Tag,
    aead::AeadInPlace,
};

use crate::{CryptoError, FrameKey};

/// GCM nonce size (12 bytes)
pub const NONCE_SIZE: usize = 12;

/// GCM tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Encrypt `plaintext`, returning the ciphertext and its detached tag.
///
/// # Security
///
/// A nonce must never repeat under the same key. Frame keys are unique per
/// timestamp, but the broadcast and subscription keys are long-lived, so the
/// caller must supply fresh random nonces for those.
pub fn seal(
    key: &FrameKey,
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    plaintext: &[u8],
) -> (Vec<u8>, [u8; TAG_SIZE]) {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key.as_bytes()));
    let mut buffer = plaintext.to_vec();

    let Ok(tag) = cipher.encrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer)
    else {
        unreachable!("AES-GCM encryption only fails for plaintexts over 64 GiB");
    };

    (buffer, tag.into())
}

/// Decrypt and authenticate `ciphertext` against `tag` and `aad`.
///
/// # Errors
///
/// - `CryptoError::AuthenticationFailed` if the key, nonce, aad, tag, or
///   ciphertext do not match. No plaintext is released in that case.
pub fn open(
    key: &FrameKey,
    nonce: &[u8; NONCE_SIZE],
    aad: &[u8],
    tag: &[u8; TAG_SIZE],
    ciphertext: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = Aes128Gcm::new(Key::<Aes128Gcm>::from_slice(key.as_bytes()));
    let mut buffer = ciphertext.to_vec();

    cipher
        .decrypt_in_place_detached(Nonce::from_slice(nonce), aad, &mut buffer, Tag::from_slice(tag))
        .map_err(|_| CryptoError::AuthenticationFailed)?;

    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> FrameKey {
        FrameKey::from_bytes([0x42; 16])
    }

    #[test]
    fn seal_then_open() {
        let (ciphertext, tag) = seal(&key(), &[1; NONCE_SIZE], b"aad", b"hello frame");
        assert_eq!(ciphertext.len(), 11);

        let plaintext = open(&key(), &[1; NONCE_SIZE], b"aad", &tag, &ciphertext).unwrap();
        assert_eq!(plaintext, b"hello frame");
    }

    #[test]
    fn empty_plaintext_still_authenticates() {
        let (ciphertext, tag) = seal(&key(), &[1; NONCE_SIZE], b"aad", b"");
        assert!(ciphertext.is_empty());
        assert!(open(&key(), &[1; NONCE_SIZE], b"aad", &tag, &ciphertext).is_ok());
        assert!(open(&key(), &[1; NONCE_SIZE], b"bad", &tag, &ciphertext).is_err());
    }

    #[test]
    fn tampering_is_detected() {
        let (mut ciphertext, tag) = seal(&key(), &[1; NONCE_SIZE], b"aad", b"payload");

        let wrong_key = FrameKey::from_bytes([0x43; 16]);
        assert_eq!(
            open(&wrong_key, &[1; NONCE_SIZE], b"aad", &tag, &ciphertext),
            Err(CryptoError::AuthenticationFailed)
        );
        assert!(open(&key(), &[2; NONCE_SIZE], b"aad", &tag, &ciphertext).is_err());
        assert!(open(&key(), &[1; NONCE_SIZE], b"aae", &tag, &ciphertext).is_err());

        let mut bad_tag = tag;
        bad_tag[0] ^= 1;
        assert!(open(&key(), &[1; NONCE_SIZE], b"aad", &bad_tag, &ciphertext).is_err());

        ciphertext[0] ^= 1;
        assert!(open(&key(), &[1; NONCE_SIZE], b"aad", &tag, &ciphertext).is_err());
    }
}
