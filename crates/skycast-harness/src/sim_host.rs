//! Simulated host end of the framed protocol.
//!
//! Requests are queued up front. While the decoder runs, `SimHost` watches
//! every byte it writes, reassembles the responses, and queues the host's
//! acknowledgments exactly where the flow-control rules call for them: after
//! each response header, after every 256 body bytes, and after the last body
//! byte. Those acknowledgments are read back before any queued request
//! bytes. When both queues are empty the stream reports closed, which ends
//! the decoder's session.

use std::collections::VecDeque;

use skycast_core::{Decoder, Storage};
use skycast_proto::{Opcode, PacketHeader};
use skycast_server::{ACK_INTERVAL, Framer, ServerError, SessionStats, Transport, TransportError};

/// How the host answers response headers and body chunks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AckBehavior {
    /// Send a proper ACK
    #[default]
    Acknowledge,
    /// Send an ERROR header instead of an ACK
    Refuse,
    /// Acknowledge headers and chunks, but answer each response's final ACK
    /// with an ERROR header
    RefuseFinal,
}

/// A response the decoder sent to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResponse {
    /// Raw opcode byte
    pub opcode: u8,
    /// Response body
    pub body: Vec<u8>,
}

impl HostResponse {
    /// Opcode as enum.
    pub fn opcode_enum(&self) -> Option<Opcode> {
        Opcode::from_u8(self.opcode)
    }

    /// Whether the decoder rejected the request.
    pub fn is_error(&self) -> bool {
        self.opcode_enum() == Some(Opcode::Error)
    }
}

enum Incoming {
    Header(Vec<u8>),
    Body { opcode: u8, length: usize, body: Vec<u8> },
}

/// Host side of one session.
pub struct SimHost {
    behavior: AckBehavior,
    requests: VecDeque<u8>,
    replies: VecDeque<u8>,
    incoming: Incoming,
    responses: Vec<HostResponse>,
    acks_received: usize,
}

impl Default for SimHost {
    fn default() -> Self {
        Self::new()
    }
}

impl SimHost {
    /// Host that acknowledges everything.
    pub fn new() -> Self {
        Self::with_behavior(AckBehavior::Acknowledge)
    }

    /// Host with the given acknowledgment behavior.
    pub fn with_behavior(behavior: AckBehavior) -> Self {
        Self {
            behavior,
            requests: VecDeque::new(),
            replies: VecDeque::new(),
            incoming: Incoming::Header(Vec::with_capacity(PacketHeader::SIZE)),
            responses: Vec::new(),
            acks_received: 0,
        }
    }

    /// Queue raw request bytes.
    pub fn send(&mut self, wire: &[u8]) {
        self.requests.extend(wire);
    }

    /// Queue several requests in order.
    pub fn send_all<'a>(&mut self, wires: impl IntoIterator<Item = &'a [u8]>) {
        for wire in wires {
            self.send(wire);
        }
    }

    /// Responses received so far, in order.
    pub fn responses(&self) -> &[HostResponse] {
        &self.responses
    }

    /// ACKs the decoder sent for request headers and body chunks.
    pub fn acks_received(&self) -> usize {
        self.acks_received
    }

    /// Request bytes the decoder has not read.
    pub fn unread(&self) -> usize {
        self.requests.len()
    }

    /// Run one decoder session against the queued requests.
    pub fn serve<S: Storage>(self, decoder: &mut Decoder<S>) -> Result<(Self, SessionStats), ServerError> {
        let mut framer = Framer::new(self);
        let stats = skycast_server::serve(decoder, &mut framer)?;
        Ok((framer.into_inner(), stats))
    }

    fn reply(&mut self, is_final: bool) {
        let refuse = match self.behavior {
            AckBehavior::Acknowledge => false,
            AckBehavior::Refuse => true,
            AckBehavior::RefuseFinal => is_final,
        };
        let reply = if refuse { PacketHeader::new(Opcode::Error, 0) } else { PacketHeader::ack() };
        self.replies.extend(reply.to_bytes());
    }

    fn observe(&mut self, byte: u8) {
        match &mut self.incoming {
            Incoming::Header(header) => {
                header.push(byte);
                if header.len() < PacketHeader::SIZE {
                    return;
                }

                let raw = std::mem::take(header);
                if raw == PacketHeader::ack().to_bytes() {
                    self.acks_received += 1;
                    return;
                }

                let opcode = raw[1];
                let length = usize::from(u16::from_le_bytes([raw[2], raw[3]]));
                self.reply(false);

                // A refused header is never followed by its body
                if length == 0 || self.behavior == AckBehavior::Refuse {
                    self.responses.push(HostResponse { opcode, body: Vec::new() });
                } else {
                    self.incoming = Incoming::Body { opcode, length, body: Vec::with_capacity(length) };
                }
            },
            Incoming::Body { opcode, length, body } => {
                body.push(byte);
                if body.len() == *length {
                    let response = HostResponse { opcode: *opcode, body: std::mem::take(body) };
                    self.incoming = Incoming::Header(Vec::with_capacity(PacketHeader::SIZE));
                    self.responses.push(response);
                    self.reply(true);
                } else if body.len() % ACK_INTERVAL == 0 {
                    self.reply(false);
                }
            },
        }
    }
}

impl Transport for SimHost {
    fn read_byte(&mut self) -> Result<u8, TransportError> {
        self.replies.pop_front().or_else(|| self.requests.pop_front()).ok_or(TransportError::Closed)
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.observe(byte);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acks_response_header_chunks_and_end() {
        let mut host = SimHost::new();

        host.write_all(&PacketHeader::new(Opcode::List, 600).to_bytes()).unwrap();
        assert_eq!(host.replies.len(), 4);

        host.write_all(&[0; 256]).unwrap();
        assert_eq!(host.replies.len(), 8);

        host.write_all(&[0; 344]).unwrap();
        assert_eq!(host.replies.len(), 16);
        assert_eq!(host.responses().len(), 1);
        assert_eq!(host.responses()[0].body.len(), 600);
    }

    #[test]
    fn refuse_final_answers_only_the_last_ack() {
        let mut host = SimHost::with_behavior(AckBehavior::RefuseFinal);
        let ack = PacketHeader::ack().to_bytes();
        let error = PacketHeader::new(Opcode::Error, 0).to_bytes();

        host.write_all(&PacketHeader::new(Opcode::Decode, 300).to_bytes()).unwrap();
        host.write_all(&[0; 300]).unwrap();

        let replies: Vec<u8> = host.replies.iter().copied().collect();
        assert_eq!(replies, [ack, ack, error].concat());
        assert_eq!(host.responses()[0].body.len(), 300);
    }

    #[test]
    fn decoder_acks_are_counted_not_answered() {
        let mut host = SimHost::new();
        host.write_all(&PacketHeader::ack().to_bytes()).unwrap();

        assert_eq!(host.acks_received(), 1);
        assert!(host.replies.is_empty());
        assert!(host.responses().is_empty());
    }

    #[test]
    fn replies_are_read_before_requests() {
        let mut host = SimHost::with_behavior(AckBehavior::Refuse);
        host.send(&[9]);
        host.write_all(&PacketHeader::new(Opcode::Error, 0).to_bytes()).unwrap();

        let mut read = [0u8; 5];
        host.read_exact(&mut read).unwrap();
        assert_eq!(read, [0x25, 0x45, 0, 0, 9]);
        assert!(matches!(host.read_byte(), Err(TransportError::Closed)));
    }
}
