//! LIST response body.
//!
//! ```text
//! [count: u32 LE] + count × [channel: u32 LE][start: u64 LE][end: u64 LE]
//! ```

use bytes::{Buf, BufMut};

use crate::errors::{ProtocolError, Result};

/// One installed subscription as reported by LIST.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListEntry {
    /// Subscribed channel
    pub channel: u32,
    /// First authorized timestamp (inclusive)
    pub start: u64,
    /// Last authorized timestamp (inclusive)
    pub end: u64,
}

impl ListEntry {
    /// Serialized size of one entry
    pub const SIZE: usize = 20;
}

/// Body of a LIST response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListResponse {
    /// Entries in slot order
    pub entries: Vec<ListEntry>,
}

impl ListResponse {
    /// Size of the count prefix
    pub const COUNT_SIZE: usize = 4;

    /// Encode into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        let count = u32::try_from(self.entries.len()).map_err(|_| {
            ProtocolError::PayloadTooLarge { size: self.entries.len(), max: u32::MAX as usize }
        })?;

        dst.put_u32_le(count);
        for entry in &self.entries {
            dst.put_u32_le(entry.channel);
            dst.put_u64_le(entry.start);
            dst.put_u64_le(entry.end);
        }

        Ok(())
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(Self::COUNT_SIZE + self.entries.len() * ListEntry::SIZE);
        self.encode(&mut out)?;
        Ok(out)
    }

    /// Decode a LIST response body. The length must match the count exactly.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::FrameTooShort` if the count prefix is missing
    /// - `ProtocolError::LengthMismatch` if the body length disagrees with
    ///   the count
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::COUNT_SIZE {
            return Err(ProtocolError::FrameTooShort {
                expected: Self::COUNT_SIZE,
                actual: bytes.len(),
            });
        }

        let mut buf = bytes;
        let count = buf.get_u32_le() as usize;

        let expected = count
            .checked_mul(ListEntry::SIZE)
            .and_then(|n| n.checked_add(Self::COUNT_SIZE))
            .ok_or(ProtocolError::LengthMismatch { expected: usize::MAX, actual: bytes.len() })?;

        if expected != bytes.len() {
            return Err(ProtocolError::LengthMismatch { expected, actual: bytes.len() });
        }

        let entries = (0..count)
            .map(|_| ListEntry {
                channel: buf.get_u32_le(),
                start: buf.get_u64_le(),
                end: buf.get_u64_le(),
            })
            .collect();

        Ok(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn single_entry_layout() {
        let response =
            ListResponse { entries: vec![ListEntry { channel: 5, start: 100, end: 199 }] };
        insta::assert_snapshot!(
            hex::encode(response.to_bytes().unwrap()),
            @"01000000050000006400000000000000c700000000000000"
        );
    }

    #[test]
    fn empty_list_is_zero_count() {
        let bytes = ListResponse::default().to_bytes().unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0]);
        assert_eq!(ListResponse::decode(&bytes).unwrap(), ListResponse::default());
    }

    #[test]
    fn reject_count_mismatch() {
        let mut bytes = vec![2, 0, 0, 0];
        bytes.extend_from_slice(&[0u8; ListEntry::SIZE]);
        assert_eq!(
            ListResponse::decode(&bytes),
            Err(ProtocolError::LengthMismatch { expected: 44, actual: 24 })
        );
    }

    #[test]
    fn reject_missing_count() {
        assert!(matches!(ListResponse::decode(&[1, 0]), Err(ProtocolError::FrameTooShort { .. })));
    }

    proptest! {
        #[test]
        fn decode_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..128)) {
            let _ = ListResponse::decode(&bytes);
        }
    }
}
