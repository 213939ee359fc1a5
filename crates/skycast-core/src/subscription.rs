//! Subscription records.
//!
//! A record grants one channel the timestamps `[start, end]` by carrying the
//! key-tree nodes that tile that interval exactly. The same byte layout is
//! the plaintext of a SUBSCRIBE blob and the content of a storage block:
//!
//! ```text
//! [channel: u32][start: u64][end: u64][node_count: u8]
//!   node_count × [level: u8][index: u64][key: 16 bytes]
//! ```
//!
//! All integers are little-endian and the length must be exactly
//! `21 + 25 × node_count`.

use bytes::{Buf, BufMut};
use skycast_crypto::{KEY_SIZE, KdfError, MAX_COVER_NODES, TreeNode, cover_range};
use thiserror::Error;

/// Fixed prefix before the node list
pub const RECORD_HEADER_SIZE: usize = 21;

/// Encoded size of one node
pub const NODE_SIZE: usize = 25;

/// Largest node count a record may carry
pub const MAX_NODES: usize = MAX_COVER_NODES;

/// Largest encoded record
pub const MAX_RECORD_SIZE: usize = RECORD_HEADER_SIZE + MAX_NODES * NODE_SIZE;

/// Reasons a record fails to decode or validate.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// Shorter than the fixed prefix
    #[error("record too short: {actual} bytes, need at least {}", RECORD_HEADER_SIZE)]
    TooShort {
        /// Bytes available
        actual: usize,
    },

    /// Length disagrees with the node count
    #[error("record length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch {
        /// Length implied by the node count
        expected: usize,
        /// Length present
        actual: usize,
    },

    /// More nodes than any valid cover needs
    #[error("record carries {count} nodes, maximum is {}", MAX_NODES)]
    TooManyNodes {
        /// Declared node count
        count: usize,
    },

    /// Range start after range end
    #[error("inverted range [{start}, {end}]")]
    InvertedRange {
        /// Range start
        start: u64,
        /// Range end
        end: u64,
    },

    /// A node names a position that does not exist in the tree
    #[error("malformed node: {0}")]
    MalformedNode(#[from] KdfError),

    /// Nodes do not tile `[start, end]` contiguously
    #[error("nodes do not cover range: expected next timestamp {expected}, found {found}")]
    CoverageGap {
        /// Next timestamp that should have been covered
        expected: u128,
        /// Start of the node found instead (or one past the last node)
        found: u128,
    },
}

/// One channel's time-range grant.
///
/// # Invariants
///
/// - `start <= end`
/// - `1 <= nodes.len() <= MAX_NODES`
/// - Node ranges, sorted by start, are contiguous, begin at `start`, and end
///   at `end`; so every timestamp in `[start, end]` has exactly one covering
///   node and no timestamp outside does
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionRecord {
    channel: u32,
    start: u64,
    end: u64,
    nodes: Vec<TreeNode>,
}

impl SubscriptionRecord {
    /// Build a record, checking every invariant.
    pub fn new(channel: u32, start: u64, end: u64, nodes: Vec<TreeNode>) -> Result<Self, RecordError> {
        if nodes.len() > MAX_NODES {
            return Err(RecordError::TooManyNodes { count: nodes.len() });
        }

        if start > end {
            return Err(RecordError::InvertedRange { start, end });
        }

        validate_coverage(start, end, &nodes)?;

        Ok(Self { channel, start, end, nodes })
    }

    /// Issue a record for `[start, end]` from a channel's root key.
    ///
    /// Host-side operation: the uplink calls this to build the plaintext it
    /// seals into a SUBSCRIBE blob.
    pub fn issue(channel: u32, root: &TreeNode, start: u64, end: u64) -> Result<Self, RecordError> {
        let nodes = cover_range(root, start, end)?;
        Self::new(channel, start, end, nodes)
    }

    /// Subscribed channel.
    pub fn channel(&self) -> u32 {
        self.channel
    }

    /// First authorized timestamp.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last authorized timestamp.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Covering nodes in wire order.
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Whether `timestamp` lies in the authorized range.
    pub fn covers(&self, timestamp: u64) -> bool {
        (self.start..=self.end).contains(&timestamp)
    }

    /// First node whose range contains `timestamp`. `None` if outside the
    /// subscription.
    pub fn find_covering_node(&self, timestamp: u64) -> Option<&TreeNode> {
        self.nodes.iter().find(|node| node.covers(timestamp))
    }

    /// Encoded length of this record.
    pub fn encoded_len(&self) -> usize {
        RECORD_HEADER_SIZE + self.nodes.len() * NODE_SIZE
    }

    /// Encode into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        debug_assert!(self.nodes.len() <= MAX_NODES);

        dst.put_u32_le(self.channel);
        dst.put_u64_le(self.start);
        dst.put_u64_le(self.end);
        dst.put_u8(self.nodes.len() as u8);

        for node in &self.nodes {
            dst.put_u8(node.level());
            dst.put_u64_le(node.index());
            dst.put_slice(node.key());
        }
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_len());
        self.encode(&mut out);
        debug_assert_eq!(out.len(), self.encoded_len());
        out
    }

    /// Decode and validate a record.
    ///
    /// # Errors
    ///
    /// Any [`RecordError`]; validation is identical to [`Self::new`].
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < RECORD_HEADER_SIZE {
            return Err(RecordError::TooShort { actual: bytes.len() });
        }

        let mut buf = bytes;
        let channel = buf.get_u32_le();
        let start = buf.get_u64_le();
        let end = buf.get_u64_le();
        let count = usize::from(buf.get_u8());

        if count > MAX_NODES {
            return Err(RecordError::TooManyNodes { count });
        }

        let expected = count
            .checked_mul(NODE_SIZE)
            .and_then(|n| n.checked_add(RECORD_HEADER_SIZE))
            .ok_or(RecordError::TooManyNodes { count })?;

        if bytes.len() != expected {
            return Err(RecordError::LengthMismatch { expected, actual: bytes.len() });
        }

        let mut nodes = Vec::with_capacity(count);
        for _ in 0..count {
            let level = buf.get_u8();
            let index = buf.get_u64_le();
            let mut key = [0u8; KEY_SIZE];
            buf.copy_to_slice(&mut key);
            nodes.push(TreeNode::new(level, index, key)?);
        }

        debug_assert!(buf.is_empty());
        Self::new(channel, start, end, nodes)
    }
}

/// Check that `nodes` tile `[start, end]` with no gap or overlap.
///
/// Minimality is not checked: four sibling leaves are accepted where their
/// common ancestor would do. Such a record grants exactly the same
/// timestamps, since a node's key only derives keys inside its own range.
/// It costs node slots and nothing else.
fn validate_coverage(start: u64, end: u64, nodes: &[TreeNode]) -> Result<(), RecordError> {
    let mut ranges: Vec<(u128, u128)> = nodes
        .iter()
        .map(|node| (u128::from(*node.range().start()), u128::from(*node.range().end())))
        .collect();
    ranges.sort_unstable();

    let mut next = u128::from(start);
    for (node_start, node_end) in ranges {
        if node_start != next {
            return Err(RecordError::CoverageGap { expected: next, found: node_start });
        }
        next = node_end + 1;
    }

    let stop = u128::from(end) + 1;
    if next != stop {
        return Err(RecordError::CoverageGap { expected: stop, found: next });
    }

    Ok(())
}
