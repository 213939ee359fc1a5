//! Decoder configuration.

/// Where replay cursors live.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReplayPolicy {
    /// Cursors are kept in memory and reset on restart
    #[default]
    Volatile,
    /// Cursors are written to storage after every delivered frame and
    /// restored at start-up
    Persistent,
}

/// Behavioral knobs of a [`crate::Decoder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderConfig {
    /// Replay cursor persistence
    pub replay: ReplayPolicy,
}

impl DecoderConfig {
    /// Configuration with persisted replay cursors.
    pub fn persistent() -> Self {
        Self { replay: ReplayPolicy::Persistent }
    }
}
