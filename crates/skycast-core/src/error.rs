//! Decoder error types.
//!
//! Every request that fails produces the same zero-length ERROR response on
//! the wire, so the variants here exist for local logging and tests. Each one
//! maps onto an [`ErrorClass`] via [`DecoderError::class`].

use skycast_crypto::KdfError;
use skycast_proto::ProtocolError;
use thiserror::Error;

use crate::{replay::ReplayError, storage::StorageError, subscription::RecordError};

/// Coarse failure taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    /// Malformed or truncated bytes
    Framing,
    /// Signature or AEAD tag mismatch
    Authentication,
    /// Unknown channel or timestamp outside the subscription
    Authorization,
    /// Timestamp not newer than the last delivered frame
    Ordering,
    /// Store or cursor table full, or a malformed record
    Resource,
    /// Primitive or storage failure
    Internal,
}

/// Errors from the request pipelines.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecoderError {
    /// Request bytes do not parse
    #[error("malformed request: {0}")]
    Malformed(#[from] ProtocolError),

    /// Trailing signature does not verify
    #[error("signature verification failed")]
    SignatureInvalid,

    /// AEAD tag does not verify
    #[error("decryption failed: authentication tag mismatch")]
    DecryptionFailed,

    /// No subscription for the frame's channel
    #[error("not subscribed to channel {channel}")]
    NotSubscribed {
        /// Frame channel
        channel: u32,
    },

    /// Timestamp outside the channel's subscription
    #[error("channel {channel}: timestamp {timestamp} outside subscription [{start}, {end}]")]
    OutsideSubscription {
        /// Frame channel
        channel: u32,
        /// Frame timestamp
        timestamp: u64,
        /// Subscription start
        start: u64,
        /// Subscription end
        end: u64,
    },

    /// Frame fails the ordering check
    #[error(transparent)]
    Replay(#[from] ReplayError),

    /// Subscription for the broadcast channel
    #[error("channel 0 cannot be subscribed")]
    BroadcastSubscription,

    /// Subscription plaintext is not a valid record
    #[error("invalid subscription: {0}")]
    InvalidRecord(#[from] RecordError),

    /// No slot free for a new channel
    #[error("subscription store full, cannot add channel {channel}")]
    StoreFull {
        /// Channel that needed a slot
        channel: u32,
    },

    /// LIST request with a body
    #[error("list request must be empty, got {len} bytes")]
    UnexpectedBody {
        /// Body length received
        len: usize,
    },

    /// Key derivation failed for a node that should cover the timestamp
    #[error("key derivation failed: {0}")]
    Kdf(#[from] KdfError),

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl DecoderError {
    /// Taxonomy class of this error.
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::Malformed(_) | Self::UnexpectedBody { .. } => ErrorClass::Framing,
            Self::SignatureInvalid | Self::DecryptionFailed => ErrorClass::Authentication,
            Self::NotSubscribed { .. }
            | Self::OutsideSubscription { .. }
            | Self::BroadcastSubscription => ErrorClass::Authorization,
            Self::Replay(ReplayError::NotNewer { .. }) => ErrorClass::Ordering,
            Self::Replay(ReplayError::TableFull { .. })
            | Self::StoreFull { .. }
            | Self::InvalidRecord(_) => ErrorClass::Resource,
            Self::Kdf(_) | Self::Storage(_) => ErrorClass::Internal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes() {
        assert_eq!(DecoderError::SignatureInvalid.class(), ErrorClass::Authentication);
        assert_eq!(DecoderError::NotSubscribed { channel: 3 }.class(), ErrorClass::Authorization);
        assert_eq!(
            DecoderError::Replay(ReplayError::NotNewer { channel: 1, timestamp: 1, last: 1 })
                .class(),
            ErrorClass::Ordering
        );
        assert_eq!(DecoderError::StoreFull { channel: 9 }.class(), ErrorClass::Resource);
        assert_eq!(DecoderError::Storage(StorageError::Io("x".into())).class(), ErrorClass::Internal);
        assert_eq!(
            DecoderError::Malformed(ProtocolError::LengthUnderflow { len: 4, required: 64 }).class(),
            ErrorClass::Framing
        );
    }
}
