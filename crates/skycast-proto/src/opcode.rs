//! Operation codes carried in the packet header.

/// Operation code (second header byte).
///
/// The numeric values are the ASCII initials of each operation, which keeps
/// raw captures of the serial stream readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// Decrypt a broadcast frame (`'D'`)
    Decode = 0x44,
    /// Install or replace a channel subscription (`'S'`)
    Subscribe = 0x53,
    /// Enumerate installed subscriptions (`'L'`)
    List = 0x4C,
    /// Flow-control acknowledgment, zero-length (`'A'`)
    Ack = 0x41,
    /// Generic failure response, zero-length (`'E'`)
    Error = 0x45,
}

impl Opcode {
    /// Parse a raw opcode byte. `None` if unrecognized.
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0x44 => Some(Self::Decode),
            0x53 => Some(Self::Subscribe),
            0x4C => Some(Self::List),
            0x41 => Some(Self::Ack),
            0x45 => Some(Self::Error),
            _ => None,
        }
    }

    /// Raw opcode byte.
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Opcodes a peer may only receive, never send as a request.
    pub fn is_response_only(self) -> bool {
        matches!(self, Self::Ack | Self::Error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_opcodes() {
        for opcode in [Opcode::Decode, Opcode::Subscribe, Opcode::List, Opcode::Ack, Opcode::Error]
        {
            assert_eq!(Opcode::from_u8(opcode.to_u8()), Some(opcode));
        }
    }

    #[test]
    fn unknown_opcode_is_none() {
        assert_eq!(Opcode::from_u8(0x47), None);
        assert_eq!(Opcode::from_u8(0x00), None);
    }

    #[test]
    fn response_only_opcodes() {
        assert!(Opcode::Ack.is_response_only());
        assert!(Opcode::Error.is_response_only());
        assert!(!Opcode::Decode.is_response_only());
    }
}
