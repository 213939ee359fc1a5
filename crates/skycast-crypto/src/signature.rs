//! Ed25519 verification of signed requests.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};

use crate::CryptoError;

/// Ed25519 signature size (64 bytes)
pub const SIGNATURE_SIZE: usize = 64;

/// Verify `signature` over `message` with the uplink's public key.
///
/// # Errors
///
/// - `CryptoError::SignatureInvalid` if the signature does not verify
pub fn verify(
    key: &VerifyingKey,
    message: &[u8],
    signature: &[u8; SIGNATURE_SIZE],
) -> Result<(), CryptoError> {
    let signature = Signature::from_bytes(signature);
    key.verify(message, &signature).map_err(|_| CryptoError::SignatureInvalid)
}
