//! Error types for key derivation and cryptographic operations

use thiserror::Error;

/// Errors from the key derivation tree.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KdfError {
    /// Node level beyond the leaf level
    #[error("tree level {level} exceeds leaf level 64")]
    LevelOutOfRange {
        /// Offending level
        level: u8,
    },

    /// Node index does not exist at its level
    #[error("index {index} does not exist at tree level {level}")]
    IndexOutOfRange {
        /// Node level
        level: u8,
        /// Offending index
        index: u64,
    },

    /// Timestamp not covered by the node being derived from
    #[error("timestamp {timestamp} outside node range [{start}, {end}]")]
    TimestampOutOfRange {
        /// Requested timestamp
        timestamp: u64,
        /// First timestamp covered by the node
        start: u64,
        /// Last timestamp covered by the node
        end: u64,
    },

    /// Target position is not below the starting node
    #[error("node ({level}, {index}) is not a descendant of ({ancestor_level}, {ancestor_index})")]
    NotDescendant {
        /// Target level
        level: u8,
        /// Target index
        index: u64,
        /// Starting node level
        ancestor_level: u8,
        /// Starting node index
        ancestor_index: u64,
    },

    /// Leaf nodes cannot be split further
    #[error("leaf node has no children")]
    LeafHasNoChildren,

    /// Range with start after end
    #[error("invalid range [{start}, {end}]")]
    InvalidRange {
        /// Range start
        start: u64,
        /// Range end
        end: u64,
    },
}

/// Errors from AEAD and signature primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD tag did not verify (wrong key, tampered data, or wrong aad)
    #[error("authentication tag mismatch")]
    AuthenticationFailed,

    /// Ed25519 signature did not verify
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Key material of the wrong length
    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength {
        /// Required length
        expected: usize,
        /// Provided length
        actual: usize,
    },
}
