//! Server error types.

use std::fmt;

use skycast_core::{DecoderError, StorageError};

use crate::framer::FramingError;

/// Errors that can occur in the server.
#[derive(Debug)]
pub enum ServerError {
    /// Configuration error (unreadable secrets file, bad key encoding, etc.).
    ///
    /// Fatal at start-up. Fix configuration and restart.
    Config(String),

    /// Framing or transport failure that ends a session.
    ///
    /// The decoder context survives; the next connection starts clean.
    Framing(FramingError),

    /// Decoder start-up failure (state could not be restored).
    Decoder(DecoderError),

    /// Storage backend could not be opened.
    Storage(StorageError),

    /// Internal error (worker task panicked, etc.).
    ///
    /// Should never happen in correct implementation. Indicates a bug.
    Internal(String),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "configuration error: {msg}"),
            Self::Framing(err) => write!(f, "framing error: {err}"),
            Self::Decoder(err) => write!(f, "decoder error: {err}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Internal(msg) => write!(f, "internal error: {msg}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Framing(err) => Some(err),
            Self::Decoder(err) => Some(err),
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<FramingError> for ServerError {
    fn from(err: FramingError) -> Self {
        Self::Framing(err)
    }
}

impl From<DecoderError> for ServerError {
    fn from(err: DecoderError) -> Self {
        Self::Decoder(err)
    }
}

impl From<StorageError> for ServerError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(err: std::io::Error) -> Self {
        Self::Framing(FramingError::Transport(err.into()))
    }
}
