//! Request envelopes for DECODE and SUBSCRIBE.
//!
//! Both requests share the same outer shape: the full packet (header
//! included) is signed, and the trailing 64 bytes carry the signature. Inside
//! the signed region sits an AEAD envelope whose associated data starts with
//! the packet header itself.
//!
//! ```text
//! DECODE:    [header][channel u32][timestamp u64][nonce 12] [tag 16][ciphertext ≤64] [signature 64]
//! SUBSCRIBE: [header][nonce 12]                             [tag 16][ciphertext]      [signature 64]
//!            |<------------------ aad ------------------->|
//! ```
//!
//! All integers are little-endian. Parsing borrows from the input buffer and
//! every offset is computed with checked arithmetic.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::{
    Opcode, PacketHeader,
    errors::{ProtocolError, Result},
};

/// Ed25519 signature length
pub const SIGNATURE_SIZE: usize = 64;

/// AES-GCM nonce length
pub const NONCE_SIZE: usize = 12;

/// AES-GCM tag length
pub const TAG_SIZE: usize = 16;

/// Largest frame plaintext carried by a DECODE request
pub const MAX_FRAME_SIZE: usize = 64;

/// Largest complete packet (header plus maximum body)
pub const MAX_PACKET_SIZE: usize = PacketHeader::SIZE + PacketHeader::MAX_BODY_SIZE;

/// A complete request split into its signed region and trailing signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignedPacket<'a> {
    /// Every byte before the signature, header included
    pub signed: &'a [u8],
    /// Trailing Ed25519 signature
    pub signature: &'a [u8; SIGNATURE_SIZE],
}

impl<'a> SignedPacket<'a> {
    /// Split a full wire packet into signed bytes and signature.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::LengthUnderflow` if shorter than the signature
    /// - `ProtocolError::PayloadTooLarge` if longer than [`MAX_PACKET_SIZE`]
    pub fn split(wire: &'a [u8]) -> Result<Self> {
        if wire.len() > MAX_PACKET_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: wire.len(), max: MAX_PACKET_SIZE });
        }

        let split_at = wire
            .len()
            .checked_sub(SIGNATURE_SIZE)
            .ok_or(ProtocolError::LengthUnderflow { len: wire.len(), required: SIGNATURE_SIZE })?;

        let (signed, signature) = wire.split_at(split_at);
        let signature = <&[u8; SIGNATURE_SIZE]>::try_from(signature)
            .map_err(|_| ProtocolError::LengthMismatch { expected: SIGNATURE_SIZE, actual: signature.len() })?;

        Ok(Self { signed, signature })
    }

    /// Append `signature` to `signed`, producing the wire packet.
    #[must_use]
    pub fn join(signed: &[u8], signature: &[u8; SIGNATURE_SIZE]) -> Vec<u8> {
        let mut wire = Vec::with_capacity(signed.len() + SIGNATURE_SIZE);
        wire.extend_from_slice(signed);
        wire.extend_from_slice(signature);
        wire
    }
}

/// Associated data of a DECODE request (28 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct FrameAad {
    header: [u8; PacketHeader::SIZE],
    channel: [u8; 4],
    timestamp: [u8; 8],
    nonce: [u8; NONCE_SIZE],
}

impl FrameAad {
    /// Serialized size
    pub const SIZE: usize = 28;

    /// Build the associated data for a frame whose ciphertext is
    /// `ciphertext_len` bytes. The embedded header announces the body length
    /// of the complete signed request.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the ciphertext exceeds
    ///   [`MAX_FRAME_SIZE`]
    pub fn new(
        channel: u32,
        timestamp: u64,
        nonce: [u8; NONCE_SIZE],
        ciphertext_len: usize,
    ) -> Result<Self> {
        if ciphertext_len > MAX_FRAME_SIZE {
            return Err(ProtocolError::PayloadTooLarge { size: ciphertext_len, max: MAX_FRAME_SIZE });
        }

        let length = body_length(Self::SIZE, ciphertext_len)?;

        Ok(Self {
            header: PacketHeader::new(Opcode::Decode, length).to_bytes(),
            channel: channel.to_le_bytes(),
            timestamp: timestamp.to_le_bytes(),
            nonce,
        })
    }

    /// Channel the frame was broadcast on.
    #[must_use]
    pub fn channel(&self) -> u32 {
        u32::from_le_bytes(self.channel)
    }

    /// Frame timestamp.
    #[must_use]
    pub fn timestamp(&self) -> u64 {
        u64::from_le_bytes(self.timestamp)
    }

    /// AEAD nonce.
    #[must_use]
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Raw associated data bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Associated data of a SUBSCRIBE request (16 bytes).
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable)]
pub struct SubscriptionAad {
    header: [u8; PacketHeader::SIZE],
    nonce: [u8; NONCE_SIZE],
}

impl SubscriptionAad {
    /// Serialized size
    pub const SIZE: usize = 16;

    /// Build the associated data for a subscription blob of `ciphertext_len`
    /// bytes.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::PayloadTooLarge` if the signed request would not fit
    ///   in a packet body
    pub fn new(nonce: [u8; NONCE_SIZE], ciphertext_len: usize) -> Result<Self> {
        let length = body_length(Self::SIZE, ciphertext_len)?;
        Ok(Self { header: PacketHeader::new(Opcode::Subscribe, length).to_bytes(), nonce })
    }

    /// AEAD nonce.
    #[must_use]
    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Raw associated data bytes.
    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        self.as_bytes()
    }
}

/// Parsed AEAD envelope, borrowing from the signed region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope<'a, A> {
    /// Associated data (header first)
    pub aad: &'a A,
    /// Authentication tag
    pub tag: &'a [u8; TAG_SIZE],
    /// Encrypted payload
    pub ciphertext: &'a [u8],
}

/// Envelope of a DECODE request.
pub type FrameEnvelope<'a> = Envelope<'a, FrameAad>;

/// Envelope of a SUBSCRIBE request.
pub type SubscriptionEnvelope<'a> = Envelope<'a, SubscriptionAad>;

impl<'a> FrameEnvelope<'a> {
    /// Parse the signed region of a DECODE request.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::LengthUnderflow` if shorter than aad plus tag
    /// - `ProtocolError::PayloadTooLarge` if the ciphertext exceeds
    ///   [`MAX_FRAME_SIZE`]
    pub fn parse(signed: &'a [u8]) -> Result<Self> {
        let envelope = parse_envelope::<FrameAad>(signed)?;

        if envelope.ciphertext.len() > MAX_FRAME_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                size: envelope.ciphertext.len(),
                max: MAX_FRAME_SIZE,
            });
        }

        Ok(envelope)
    }
}

impl<'a> SubscriptionEnvelope<'a> {
    /// Parse the signed region of a SUBSCRIBE request.
    ///
    /// # Errors
    ///
    /// - `ProtocolError::LengthUnderflow` if shorter than aad plus tag
    pub fn parse(signed: &'a [u8]) -> Result<Self> {
        parse_envelope::<SubscriptionAad>(signed)
    }
}

impl<A: IntoBytes + Immutable> Envelope<'_, A> {
    /// Concatenate `aad | tag | ciphertext` (the signed region).
    #[must_use]
    pub fn encode(aad: &A, tag: &[u8; TAG_SIZE], ciphertext: &[u8]) -> Vec<u8> {
        let aad = aad.as_bytes();
        let mut out = Vec::with_capacity(aad.len() + TAG_SIZE + ciphertext.len());
        out.extend_from_slice(aad);
        out.extend_from_slice(tag);
        out.extend_from_slice(ciphertext);
        out
    }
}

fn parse_envelope<A>(signed: &[u8]) -> Result<Envelope<'_, A>>
where
    A: FromBytes + KnownLayout + Immutable,
{
    let required = size_of::<A>() + TAG_SIZE;
    if signed.len() < required {
        return Err(ProtocolError::LengthUnderflow { len: signed.len(), required });
    }

    let (aad, rest) = A::ref_from_prefix(signed)
        .map_err(|_| ProtocolError::LengthUnderflow { len: signed.len(), required })?;
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);
    let tag = <&[u8; TAG_SIZE]>::try_from(tag)
        .map_err(|_| ProtocolError::LengthMismatch { expected: TAG_SIZE, actual: tag.len() })?;

    Ok(Envelope { aad, tag, ciphertext })
}

/// Body length announced by the header of a signed request.
fn body_length(aad_size: usize, ciphertext_len: usize) -> Result<u16> {
    let body = (aad_size - PacketHeader::SIZE)
        .checked_add(TAG_SIZE)
        .and_then(|n| n.checked_add(ciphertext_len))
        .and_then(|n| n.checked_add(SIGNATURE_SIZE))
        .ok_or(ProtocolError::PayloadTooLarge { size: ciphertext_len, max: PacketHeader::MAX_BODY_SIZE })?;

    if body > PacketHeader::MAX_BODY_SIZE {
        return Err(ProtocolError::PayloadTooLarge { size: body, max: PacketHeader::MAX_BODY_SIZE });
    }

    u16::try_from(body)
        .map_err(|_| ProtocolError::PayloadTooLarge { size: body, max: PacketHeader::MAX_BODY_SIZE })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn aad_sizes() {
        assert_eq!(size_of::<FrameAad>(), FrameAad::SIZE);
        assert_eq!(size_of::<SubscriptionAad>(), SubscriptionAad::SIZE);
    }

    #[test]
    fn frame_aad_layout() {
        let aad = FrameAad::new(5, 0x0102, [0xAA; NONCE_SIZE], 8).unwrap();
        // body = 24 + 16 + 8 + 64 = 112 = 0x70
        insta::assert_snapshot!(
            hex::encode(aad.bytes()),
            @"25447000050000000201000000000000aaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn frame_envelope_parse() {
        let aad = FrameAad::new(7, 1000, [1; NONCE_SIZE], 3).unwrap();
        let signed = FrameEnvelope::encode(&aad, &[2; TAG_SIZE], &[9, 9, 9]);

        let envelope = FrameEnvelope::parse(&signed).unwrap();
        assert_eq!(envelope.aad.channel(), 7);
        assert_eq!(envelope.aad.timestamp(), 1000);
        assert_eq!(envelope.aad.nonce(), &[1; NONCE_SIZE]);
        assert_eq!(envelope.tag, &[2; TAG_SIZE]);
        assert_eq!(envelope.ciphertext, &[9, 9, 9]);
    }

    #[test]
    fn frame_envelope_allows_empty_ciphertext() {
        let aad = FrameAad::new(1, 1, [0; NONCE_SIZE], 0).unwrap();
        let signed = FrameEnvelope::encode(&aad, &[0; TAG_SIZE], &[]);
        assert!(FrameEnvelope::parse(&signed).unwrap().ciphertext.is_empty());
    }

    #[test]
    fn frame_envelope_rejects_large_ciphertext() {
        let mut signed = vec![0u8; FrameAad::SIZE + TAG_SIZE];
        signed.extend_from_slice(&[0u8; MAX_FRAME_SIZE + 1]);
        assert_eq!(
            FrameEnvelope::parse(&signed),
            Err(ProtocolError::PayloadTooLarge { size: 65, max: 64 })
        );
        assert!(FrameAad::new(1, 1, [0; NONCE_SIZE], 65).is_err());
    }

    #[test]
    fn envelope_underflow() {
        let short = [0u8; FrameAad::SIZE + TAG_SIZE - 1];
        assert_eq!(
            FrameEnvelope::parse(&short),
            Err(ProtocolError::LengthUnderflow { len: 43, required: 44 })
        );
        assert_eq!(
            SubscriptionEnvelope::parse(&[0u8; 31]),
            Err(ProtocolError::LengthUnderflow { len: 31, required: 32 })
        );
    }

    #[test]
    fn split_rejects_short_packet() {
        let result = SignedPacket::split(&[0x25, 0x44, 0x00, 0x00]);
        assert_eq!(result, Err(ProtocolError::LengthUnderflow { len: 4, required: 64 }));
    }

    #[test]
    fn split_and_join() {
        let signed = [1u8, 2, 3];
        let wire = SignedPacket::join(&signed, &[7; SIGNATURE_SIZE]);
        let split = SignedPacket::split(&wire).unwrap();
        assert_eq!(split.signed, &signed);
        assert_eq!(split.signature, &[7; SIGNATURE_SIZE]);
    }

    #[test]
    fn split_rejects_oversized_packet() {
        let wire = vec![0u8; MAX_PACKET_SIZE + 1];
        assert!(matches!(SignedPacket::split(&wire), Err(ProtocolError::PayloadTooLarge { .. })));
    }

    #[test]
    fn subscription_header_announces_body() {
        let aad = SubscriptionAad::new([0; NONCE_SIZE], 46).unwrap();
        let header = PacketHeader::from_bytes(aad.bytes()).unwrap();
        assert_eq!(header.opcode_enum(), Some(Opcode::Subscribe));
        assert_eq!(header.length(), 12 + 16 + 46 + 64);
    }

    proptest! {
        #[test]
        fn parse_never_panics(bytes in prop::collection::vec(any::<u8>(), 0..200)) {
            if let Ok(split) = SignedPacket::split(&bytes) {
                let _ = FrameEnvelope::parse(split.signed);
                let _ = SubscriptionEnvelope::parse(split.signed);
            }
        }
    }
}
