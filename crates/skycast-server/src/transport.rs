//! Byte transport underneath the framer.
//!
//! The protocol was designed for a serial line: one byte at a time, blocking
//! in both directions, no timeouts. [`Transport`] keeps that shape so the
//! framer can be driven by a TCP socket in production and by a scripted host
//! in tests.

use std::io::{self, BufReader, Read, Write};

use thiserror::Error;

/// Transport failures.
#[derive(Error, Debug)]
pub enum TransportError {
    /// Peer closed the stream
    #[error("transport closed by peer")]
    Closed,

    /// Underlying I/O failure
    #[error("transport I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Blocking byte transport.
pub trait Transport {
    /// Read one byte, blocking until it arrives.
    fn read_byte(&mut self) -> Result<u8, TransportError>;

    /// Queue one byte for sending.
    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError>;

    /// Push queued bytes to the peer.
    fn flush(&mut self) -> Result<(), TransportError>;

    /// Fill `buf` completely.
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), TransportError> {
        for byte in buf.iter_mut() {
            *byte = self.read_byte()?;
        }
        Ok(())
    }

    /// Queue every byte of `bytes`.
    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        for &byte in bytes {
            self.write_byte(byte)?;
        }
        Ok(())
    }
}

/// [`Transport`] over any blocking `Read + Write` stream.
///
/// Reads are buffered. Writes are collected until [`Transport::flush`], and
/// also flushed automatically before a read would block, so a peer waiting
/// on our bytes is never starved.
pub struct StreamTransport<S: Read + Write> {
    reader: BufReader<S>,
    pending: Vec<u8>,
}

impl<S: Read + Write> StreamTransport<S> {
    /// Wrap a connected stream.
    pub fn new(stream: S) -> Self {
        Self { reader: BufReader::new(stream), pending: Vec::new() }
    }

    /// Unwrap the stream, discarding unread buffered input.
    pub fn into_inner(self) -> S {
        self.reader.into_inner()
    }
}

impl<S: Read + Write> Transport for StreamTransport<S> {
    fn read_byte(&mut self) -> Result<u8, TransportError> {
        if self.reader.buffer().is_empty() {
            self.flush()?;
        }

        let mut byte = [0u8; 1];
        match self.reader.read(&mut byte)? {
            0 => Err(TransportError::Closed),
            _ => Ok(byte[0]),
        }
    }

    fn write_byte(&mut self, byte: u8) -> Result<(), TransportError> {
        self.pending.push(byte);
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<(), TransportError> {
        self.pending.extend_from_slice(bytes);
        Ok(())
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        if self.pending.is_empty() {
            return Ok(());
        }

        let stream = self.reader.get_mut();
        stream.write_all(&self.pending)?;
        stream.flush()?;
        self.pending.clear();
        Ok(())
    }
}
