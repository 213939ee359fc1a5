//! Request loop: read a packet, run its pipeline, send the response.
//!
//! One session serves one connected host until the stream closes. Rejections
//! are answered with a bare ERROR header; the reason is only logged. A
//! DECODE response commits the replay cursor once the host acknowledges its
//! header and before the first plaintext byte is written. If the commit
//! fails the plaintext is withheld and ERROR is sent in its place.

use skycast_core::{Decoder, DecoderError, ErrorClass, Storage};
use skycast_proto::{Opcode, Packet, PacketHeader};

use crate::{
    error::ServerError,
    framer::{Delivery, Framer, FramingError},
    transport::Transport,
};

/// Per-session counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Packets dispatched to a pipeline
    pub requests: usize,
    /// Frames committed and released
    pub frames_delivered: usize,
    /// Requests answered with ERROR
    pub rejected: usize,
    /// Headers rejected by the framer
    pub framing_errors: usize,
}

/// What happened to one dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Response body released; for DECODE the cursor has moved
    Served,
    /// Response header refused; nothing released, cursor unchanged
    Undelivered,
    /// ERROR sent
    Rejected(Option<ErrorClass>),
}

/// Serve requests until the host closes the stream.
///
/// # Errors
///
/// - `ServerError::Framing` on transport failure other than a clean close
pub fn serve<S, T>(decoder: &mut Decoder<S>, framer: &mut Framer<T>) -> Result<SessionStats, ServerError>
where
    S: Storage,
    T: Transport,
{
    let mut stats = SessionStats::default();

    loop {
        let packet = match framer.read_packet() {
            Ok(packet) => packet,
            Err(e) if e.is_closed() => break,
            Err(e) if e.is_recoverable() => {
                stats.framing_errors += 1;
                continue;
            },
            Err(e) => return Err(e.into()),
        };

        stats.requests += 1;
        match handle_packet(decoder, framer, &packet) {
            Ok(Outcome::Served) if packet.opcode() == Some(Opcode::Decode) => {
                stats.frames_delivered += 1;
            },
            Ok(Outcome::Served | Outcome::Undelivered) => {},
            Ok(Outcome::Rejected(_)) => stats.rejected += 1,
            Err(e) if e.is_closed() => break,
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        requests = stats.requests,
        frames = stats.frames_delivered,
        rejected = stats.rejected,
        framing_errors = stats.framing_errors,
        "Session closed"
    );

    Ok(stats)
}

/// Dispatch one packet and send its response.
pub fn handle_packet<S, T>(
    decoder: &mut Decoder<S>,
    framer: &mut Framer<T>,
    packet: &Packet,
) -> Result<Outcome, FramingError>
where
    S: Storage,
    T: Transport,
{
    match packet.opcode() {
        Some(Opcode::Decode) => handle_decode(decoder, framer, &wire(packet)),
        Some(Opcode::Subscribe) => match decoder.subscribe(&wire(packet)) {
            Ok(_) => delivered(framer.send_packet(Opcode::Subscribe, &[])?),
            Err(e) => reject(framer, Opcode::Subscribe, &e),
        },
        Some(Opcode::List) => {
            let body = match decoder.list(&packet.body) {
                Ok(response) => response.to_bytes(),
                Err(e) => return reject(framer, Opcode::List, &e),
            };

            match body {
                Ok(body) => delivered(framer.send_packet(Opcode::List, &body)?),
                Err(e) => reject(framer, Opcode::List, &DecoderError::Malformed(e)),
            }
        },
        Some(opcode @ (Opcode::Ack | Opcode::Error)) => {
            tracing::warn!(?opcode, "Response-only opcode received as request");
            framer.send_error()?;
            Ok(Outcome::Rejected(None))
        },
        None => {
            tracing::warn!(opcode = packet.header.opcode(), "Unknown opcode");
            framer.send_error()?;
            Ok(Outcome::Rejected(None))
        },
    }
}

fn handle_decode<S, T>(
    decoder: &mut Decoder<S>,
    framer: &mut Framer<T>,
    wire: &[u8],
) -> Result<Outcome, FramingError>
where
    S: Storage,
    T: Transport,
{
    let frame = match decoder.decode(wire) {
        Ok(frame) => frame,
        Err(e) => return reject(framer, Opcode::Decode, &e),
    };

    let mut commit_error = None;
    let delivery = framer.send_packet_gated(Opcode::Decode, &frame.payload, || {
        match decoder.commit(&frame) {
            Ok(()) => true,
            Err(e) => {
                commit_error = Some(e);
                false
            },
        }
    })?;

    match delivery {
        Delivery::Acknowledged => Ok(Outcome::Served),
        Delivery::Incomplete => {
            tracing::warn!(
                channel = frame.channel,
                timestamp = frame.timestamp,
                "Frame released but not fully acknowledged; replay cursor committed"
            );
            Ok(Outcome::Served)
        },
        Delivery::Refused => {
            tracing::warn!(
                channel = frame.channel,
                timestamp = frame.timestamp,
                "Frame header refused; replay cursor unchanged"
            );
            Ok(Outcome::Undelivered)
        },
        Delivery::Withheld => {
            let class = commit_error.as_ref().map(DecoderError::class);
            tracing::error!(
                channel = frame.channel,
                timestamp = frame.timestamp,
                error = ?commit_error,
                "Failed to commit replay cursor; frame withheld"
            );
            Ok(Outcome::Rejected(class))
        },
    }
}

fn delivered(delivery: Delivery) -> Result<Outcome, FramingError> {
    Ok(if delivery.released_body() { Outcome::Served } else { Outcome::Undelivered })
}

fn reject<T: Transport>(
    framer: &mut Framer<T>,
    opcode: Opcode,
    error: &DecoderError,
) -> Result<Outcome, FramingError> {
    let class = error.class();
    match class {
        ErrorClass::Internal => tracing::error!(?opcode, ?class, error = %error, "Request failed"),
        _ => tracing::warn!(?opcode, ?class, error = %error, "Request rejected"),
    }

    framer.send_error()?;
    Ok(Outcome::Rejected(Some(class)))
}

/// Header and body as they arrived; the signed bytes of DECODE and SUBSCRIBE.
fn wire(packet: &Packet) -> Vec<u8> {
    let mut wire = Vec::with_capacity(PacketHeader::SIZE + packet.body.len());
    wire.extend_from_slice(&packet.header.to_bytes());
    wire.extend_from_slice(&packet.body);
    wire
}
