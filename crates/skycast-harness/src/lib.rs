//! Deterministic test harness for skycast.
//!
//! - [`Uplink`]: the host side of the system. Owns the channel root keys and
//!   the signing key, issues subscriptions, and encrypts and signs frames.
//!   Seeded, so every run produces the same packets.
//! - [`SimHost`]: an in-process [`skycast_server::Transport`] that plays the
//!   host end of the framed protocol, acknowledging the decoder's responses
//!   according to an [`AckBehavior`].
//!
//! # Invariant Testing
//!
//! The `invariants` module checks decoder state after arbitrary operation
//! sequences. Use [`InvariantRegistry::standard()`] for the store and replay
//! invariants.

pub mod invariants;
pub mod sim_host;
pub mod uplink;

pub use invariants::{
    DecoderSnapshot, Invariant, InvariantRegistry, InvariantResult, NoBroadcastSlot,
    OneRecordPerChannel, ReplayWithinCapacity, StoreMatchesStorage, Violation,
};
pub use sim_host::{AckBehavior, HostResponse, SimHost};
pub use uplink::{Uplink, UplinkError};
