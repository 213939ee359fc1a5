//! Skycast Cryptographic Primitives
//!
//! Pure functions over caller-supplied keys and nonces. Nothing here performs
//! I/O or draws randomness, so every operation is deterministic and testable.
//!
//! # Key Hierarchy
//!
//! ```text
//! channel root key (uplink only)
//!        │
//!        ▼
//! cover_range → subscription nodes (sent to the decoder)
//!        │
//!        ▼
//! derive_leaf_key → frame key for one timestamp
//!        │
//!        ▼
//! AES-128-GCM open → frame plaintext
//! ```
//!
//! Channel 0 skips the tree and uses a fixed broadcast key. Subscription blobs
//! are sealed under a per-device key from [`derive_subscription_key`].
//!
//! # Security
//!
//! Authorization:
//! - A subscription node only yields leaves inside its own range
//! - SHA-256 halves cannot be inverted to recover a parent or sibling key
//!
//! Authenticity:
//! - Every request is signed with Ed25519 over all of its bytes
//! - AEAD associated data binds channel, timestamp, and header to the payload
//!
//! Hygiene:
//! - [`FrameKey`] and [`TreeNode`] zeroize their key material on drop

pub mod aead;
mod error;
pub mod kdf;
mod key;
pub mod signature;

pub use aead::{open, seal};
pub use error::{CryptoError, KdfError};
pub use kdf::{
    Direction, LEAF_LEVEL, MAX_COVER_NODES, TreeNode, cover_range, derive_descendant,
    derive_leaf_key, node_range,
};
pub use key::{FrameKey, KEY_SIZE, derive_subscription_key};
pub use signature::verify;
pub use ed25519_dalek::VerifyingKey;
