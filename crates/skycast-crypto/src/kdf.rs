//! Time-partitioned key derivation tree.
//!
//! The tree is a complete binary tree of depth 64 over the `u64` timestamp
//! space. A node at `level` with `index` covers the closed range
//!
//! ```text
//! [index << (64 - level), ((index + 1) << (64 - level)) - 1]
//! ```
//!
//! so the root (level 0, index 0) covers every timestamp and each leaf
//! (level 64) covers exactly one. Every node carries 16 bytes of key
//! material. A child's key is one half of `SHA-256(parent key)`: bytes
//! `0..16` for the left child, bytes `16..32` for the right child.
//!
//! ```text
//!                     root (0, 0)
//!                 SHA-256(k) = L ‖ R
//!               /                    \
//!          (1, 0) key=L           (1, 1) key=R
//!             ...                     ...
//!    leaf (64, t) key = frame key for timestamp t
//! ```
//!
//! Hashing only flows downwards, so holding a node grants every leaf below it
//! and nothing else. A subscription for `[start, end]` is the minimal set of
//! nodes whose ranges tile that interval exactly ([`cover_range`]).
//!
//! Range arithmetic is done in `u128` so the level-0 shift by 64 never
//! overflows.

use std::ops::RangeInclusive;

use sha2::{Digest, Sha256};
use zeroize::Zeroize;

use crate::{FrameKey, KEY_SIZE, KdfError};

/// Depth of the tree; leaves live at this level.
pub const LEAF_LEVEL: u8 = 64;

/// Most nodes needed to tile any `u64` range (two per level below the root).
pub const MAX_COVER_NODES: usize = 126;

/// Which half of a node's range a child covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Lower half, key = first half of the digest
    Left,
    /// Upper half, key = second half of the digest
    Right,
}

/// A node of the key tree with its key material.
///
/// Construction validates the position, so every `TreeNode` value names a
/// real node and [`TreeNode::range`] cannot overflow.
#[derive(Clone, PartialEq, Eq)]
pub struct TreeNode {
    level: u8,
    index: u64,
    key: [u8; KEY_SIZE],
}

impl TreeNode {
    /// Create a node after checking that `(level, index)` exists.
    ///
    /// # Errors
    ///
    /// - `KdfError::LevelOutOfRange` if `level > 64`
    /// - `KdfError::IndexOutOfRange` if `index >= 2^level`
    pub fn new(level: u8, index: u64, key: [u8; KEY_SIZE]) -> Result<Self, KdfError> {
        validate_position(level, index)?;
        Ok(Self { level, index, key })
    }

    /// The root node (level 0), covering every timestamp.
    #[must_use]
    pub fn root(key: [u8; KEY_SIZE]) -> Self {
        Self { level: 0, index: 0, key }
    }

    /// Depth of this node (0 = root, 64 = leaf).
    #[must_use]
    pub fn level(&self) -> u8 {
        self.level
    }

    /// Position of this node within its level.
    #[must_use]
    pub fn index(&self) -> u64 {
        self.index
    }

    /// Key material held by this node.
    #[must_use]
    pub fn key(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Whether this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.level == LEAF_LEVEL
    }

    /// Closed timestamp range covered by this node.
    #[must_use]
    pub fn range(&self) -> RangeInclusive<u64> {
        let (start, end) = span(self.level, self.index);
        start..=end
    }

    /// Whether `timestamp` falls inside this node's range.
    #[must_use]
    pub fn covers(&self, timestamp: u64) -> bool {
        self.range().contains(&timestamp)
    }

    /// Derive the child node in `direction`.
    ///
    /// # Errors
    ///
    /// - `KdfError::LeafHasNoChildren` if this node is a leaf
    pub fn child(&self, direction: Direction) -> Result<Self, KdfError> {
        if self.is_leaf() {
            return Err(KdfError::LeafHasNoChildren);
        }

        let mut digest: [u8; 32] = Sha256::digest(self.key).into();
        let (half, index) = match direction {
            Direction::Left => (&digest[..KEY_SIZE], self.index << 1),
            Direction::Right => (&digest[KEY_SIZE..], (self.index << 1) | 1),
        };

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(half);
        digest.zeroize();

        Ok(Self { level: self.level + 1, index, key })
    }
}

impl Drop for TreeNode {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

impl std::fmt::Debug for TreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeNode")
            .field("level", &self.level)
            .field("index", &self.index)
            .field("range", &self.range())
            .finish_non_exhaustive()
    }
}

/// Closed range covered by `(level, index)`.
///
/// # Errors
///
/// - `KdfError::LevelOutOfRange` or `KdfError::IndexOutOfRange` if the
///   position does not exist
pub fn node_range(level: u8, index: u64) -> Result<RangeInclusive<u64>, KdfError> {
    validate_position(level, index)?;
    let (start, end) = span(level, index);
    Ok(start..=end)
}

/// Derive the frame key for `timestamp` from a node that covers it.
///
/// Walks from `node` down to level 64. At each step, with `[start, end]` the
/// current node's range, the walk goes left if
/// `timestamp - start < end - timestamp` and right otherwise.
///
/// # Errors
///
/// - `KdfError::TimestampOutOfRange` if `node` does not cover `timestamp`
pub fn derive_leaf_key(node: &TreeNode, timestamp: u64) -> Result<FrameKey, KdfError> {
    let (start, end) = span(node.level, node.index);
    if !(start..=end).contains(&timestamp) {
        return Err(KdfError::TimestampOutOfRange { timestamp, start, end });
    }

    let mut current = node.clone();
    while !current.is_leaf() {
        let (start, end) = span(current.level, current.index);
        let direction =
            if timestamp - start < end - timestamp { Direction::Left } else { Direction::Right };
        current = current.child(direction)?;
    }

    debug_assert_eq!(current.index, timestamp);
    Ok(FrameKey::from_bytes(current.key))
}

/// Derive the node at `(level, index)` from one of its ancestors.
///
/// # Errors
///
/// - `KdfError::LevelOutOfRange` or `KdfError::IndexOutOfRange` if the target
///   position does not exist
/// - `KdfError::NotDescendant` if the target is not below `ancestor`
pub fn derive_descendant(ancestor: &TreeNode, level: u8, index: u64) -> Result<TreeNode, KdfError> {
    validate_position(level, index)?;

    let not_descendant = KdfError::NotDescendant {
        level,
        index,
        ancestor_level: ancestor.level,
        ancestor_index: ancestor.index,
    };

    if level < ancestor.level {
        return Err(not_descendant);
    }

    let depth = u32::from(level - ancestor.level);
    if u128::from(index) >> depth != u128::from(ancestor.index) {
        return Err(not_descendant);
    }

    let mut current = ancestor.clone();
    for remaining in (0..depth).rev() {
        let direction =
            if (u128::from(index) >> remaining) & 1 == 0 { Direction::Left } else { Direction::Right };
        current = current.child(direction)?;
    }

    debug_assert_eq!((current.level, current.index), (level, index));
    Ok(current)
}

/// Minimal set of nodes below `ancestor` that tile `[start, end]` exactly.
///
/// Nodes are returned in ascending range order, each derived from
/// `ancestor`. From the root this never exceeds [`MAX_COVER_NODES`].
///
/// # Errors
///
/// - `KdfError::InvalidRange` if `start > end`
/// - `KdfError::TimestampOutOfRange` if the range leaves `ancestor`'s range
pub fn cover_range(ancestor: &TreeNode, start: u64, end: u64) -> Result<Vec<TreeNode>, KdfError> {
    if start > end {
        return Err(KdfError::InvalidRange { start, end });
    }

    let (outer_start, outer_end) = span(ancestor.level, ancestor.index);
    for timestamp in [start, end] {
        if !(outer_start..=outer_end).contains(&timestamp) {
            return Err(KdfError::TimestampOutOfRange {
                timestamp,
                start: outer_start,
                end: outer_end,
            });
        }
    }

    let max_width = u32::from(LEAF_LEVEL - ancestor.level);
    let stop = u128::from(end) + 1;
    let mut cursor = u128::from(start);
    let mut nodes = Vec::new();

    while cursor < stop {
        // Widest aligned block starting at `cursor` that fits before `stop`.
        let mut width = cursor.trailing_zeros().min(max_width);
        while (1u128 << width) > stop - cursor {
            width -= 1;
        }

        let level = LEAF_LEVEL - width as u8;
        let index = (cursor >> width) as u64;
        nodes.push(derive_descendant(ancestor, level, index)?);

        cursor += 1u128 << width;
    }

    debug_assert!(nodes.len() <= MAX_COVER_NODES);
    Ok(nodes)
}

fn validate_position(level: u8, index: u64) -> Result<(), KdfError> {
    if level > LEAF_LEVEL {
        return Err(KdfError::LevelOutOfRange { level });
    }

    if u128::from(index) >= 1u128 << level {
        return Err(KdfError::IndexOutOfRange { level, index });
    }

    Ok(())
}

/// Range of a validated position.
fn span(level: u8, index: u64) -> (u64, u64) {
    debug_assert!(validate_position(level, index).is_ok());

    let width = u32::from(LEAF_LEVEL - level);
    let start = u128::from(index) << width;
    let end = start + (1u128 << width) - 1;

    (start as u64, end as u64)
}
