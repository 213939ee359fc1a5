//! Runtime configuration and boot secrets.
//!
//! A decoder boots from its own secrets file (JSON), provisioned host-side
//! from the uplink's global secrets:
//!
//! ```json
//! {
//!   "decoder_id": 3735928559,
//!   "verifying_key": "<hex32>",
//!   "broadcast_key": "<hex16>",
//!   "subscription_key": "<hex16>"
//! }
//! ```
//!
//! The file never carries the uplink signing key or any channel tree root.
//! Unknown fields are refused, so a global secrets file passed by mistake
//! fails to load.

use std::path::{Path, PathBuf};

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use skycast_core::{DecoderConfig, DecoderSecrets};
use skycast_crypto::FrameKey;
use zeroize::{Zeroize, Zeroizing};

use crate::error::ServerError;

/// Server runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to (e.g., "127.0.0.1:2525")
    pub bind_address: String,
    /// Redb file; in-memory storage when `None`
    pub storage_path: Option<PathBuf>,
    /// Decoder behavior
    pub decoder: DecoderConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:2525".to_string(),
            storage_path: None,
            decoder: DecoderConfig::persistent(),
        }
    }
}

/// Boot secrets of one decoder.
#[derive(Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DecoderSecretsFile {
    /// Decoder the subscription key was derived for
    pub decoder_id: u32,
    /// Uplink Ed25519 public key, hex encoded
    pub verifying_key: String,
    /// Channel 0 key, hex encoded
    pub broadcast_key: String,
    /// Key sealing this decoder's subscriptions, hex encoded
    pub subscription_key: String,
}

impl std::fmt::Debug for DecoderSecretsFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderSecretsFile")
            .field("decoder_id", &self.decoder_id)
            .field("verifying_key", &self.verifying_key)
            .finish_non_exhaustive()
    }
}

impl Drop for DecoderSecretsFile {
    fn drop(&mut self) {
        self.broadcast_key.zeroize();
        self.subscription_key.zeroize();
    }
}

impl DecoderSecretsFile {
    /// Secrets file for `decoder_id` holding `secrets`.
    pub fn from_secrets(decoder_id: u32, secrets: &DecoderSecrets) -> Self {
        Self {
            decoder_id,
            verifying_key: hex::encode(secrets.verifying_key().as_bytes()),
            broadcast_key: hex::encode(secrets.broadcast_key().as_bytes()),
            subscription_key: hex::encode(secrets.subscription_key().as_bytes()),
        }
    }

    /// Parse the JSON secrets format.
    pub fn from_json(json: &str) -> Result<Self, ServerError> {
        serde_json::from_str(json).map_err(|e| ServerError::Config(format!("invalid secrets file: {e}")))
    }

    /// Read and parse a secrets file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let path = path.as_ref();
        let json = Zeroizing::new(std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read secrets file '{}': {e}", path.display()))
        })?);

        Self::from_json(&json)
    }

    /// Refuse a file provisioned for a different decoder.
    pub fn check_decoder_id(&self, expected: u32) -> Result<(), ServerError> {
        if self.decoder_id != expected {
            return Err(ServerError::Config(format!(
                "secrets file is for decoder {:#010x}, not {expected:#010x}",
                self.decoder_id
            )));
        }
        Ok(())
    }

    /// Decode the keys.
    ///
    /// # Errors
    ///
    /// - `ServerError::Config` if a key is not hex, has the wrong length, or
    ///   the verifying key is not a valid Ed25519 point
    pub fn decoder_secrets(&self) -> Result<DecoderSecrets, ServerError> {
        let public = decode_hex("verifying_key", &self.verifying_key)?;
        let public: &[u8; 32] = public.as_slice().try_into().map_err(|_| {
            ServerError::Config(format!("verifying_key must be 32 bytes, got {}", public.len()))
        })?;
        let verifying_key = VerifyingKey::from_bytes(public)
            .map_err(|e| ServerError::Config(format!("verifying_key: {e}")))?;

        let broadcast_key = frame_key("broadcast_key", &self.broadcast_key)?;
        let subscription_key = frame_key("subscription_key", &self.subscription_key)?;

        Ok(DecoderSecrets::new(verifying_key, broadcast_key, subscription_key))
    }
}

fn frame_key(field: &str, value: &str) -> Result<FrameKey, ServerError> {
    let bytes = decode_hex(field, value)?;
    FrameKey::from_slice(&bytes).map_err(|e| ServerError::Config(format!("{field}: {e}")))
}

fn decode_hex(field: &str, value: &str) -> Result<Zeroizing<Vec<u8>>, ServerError> {
    hex::decode(value)
        .map(Zeroizing::new)
        .map_err(|e| ServerError::Config(format!("{field} is not valid hex: {e}")))
}

/// Parse a decoder id: `0x`-prefixed hex, otherwise decimal.
pub fn parse_decoder_id(value: &str) -> Result<u32, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => value.parse(),
    };

    parsed.map_err(|e| format!("invalid decoder id '{value}': {e}"))
}
