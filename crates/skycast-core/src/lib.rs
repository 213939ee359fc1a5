//! Skycast decoder core.
//!
//! Everything between a reassembled request packet and the response bytes:
//! subscription records and their store, replay cursors, block storage, and
//! the DECODE / SUBSCRIBE / LIST pipelines. Framing and transport live in
//! `skycast-server`; this crate performs no I/O beyond the [`Storage`] trait.
//!
//! # Security
//!
//! Every DECODE and SUBSCRIBE request is signature-checked before any other
//! field is trusted. A frame is delivered only if its channel is subscribed
//! (or is the broadcast channel 0), its timestamp lies inside the
//! subscription, its AEAD tag verifies under the tree-derived key, and its
//! timestamp is strictly newer than the last delivered frame on that channel.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod replay;
pub mod secrets;
pub mod storage;
pub mod store;
pub mod subscription;

pub use config::{DecoderConfig, ReplayPolicy};
pub use error::{DecoderError, ErrorClass};
pub use pipeline::{AdmittedFrame, Decoder};
pub use replay::{ReplayCursor, ReplayError, ReplayTable};
pub use secrets::DecoderSecrets;
pub use storage::{
    Block, ChaoticStorage, FaultTarget, MemoryStorage, REPLAY_BANKS, Storage, StorageError,
};
pub use store::{SLOT_COUNT, SlotRef, SubscriptionStore};
pub use subscription::{RecordError, SubscriptionRecord};
