//! Skycast decoder service.
//!
//! Wraps [`skycast_core`]'s pipelines with real I/O: a byte [`Transport`], the
//! flow-controlled [`Framer`], the request [`driver`], and durable
//! [`RedbStorage`].
//!
//! # Architecture
//!
//! The protocol is strictly one request at a time, and every pipeline takes
//! `&mut Decoder`. [`Server`] therefore overlaps only connection acceptance:
//! each accepted TCP stream is switched to blocking mode and served to
//! completion on a blocking worker that owns the decoder, which is handed
//! back when the session ends.

pub mod config;
pub mod driver;
mod error;
pub mod framer;
pub mod storage;
pub mod transport;

use std::{future::Future, net::SocketAddr};

pub use config::{DecoderSecretsFile, ServerConfig, parse_decoder_id};
pub use driver::{Outcome, SessionStats, serve};
pub use error::ServerError;
pub use framer::{ACK_INTERVAL, Delivery, Framer, FramingError};
use skycast_core::{Decoder, Storage};
pub use storage::RedbStorage;
use tokio::net::TcpListener;
pub use transport::{StreamTransport, Transport, TransportError};

/// TCP front end of one decoder.
pub struct Server<S: Storage> {
    listener: TcpListener,
    decoder: Decoder<S>,
}

impl<S: Storage> Server<S> {
    /// Bind the listener.
    pub async fn bind(address: &str, decoder: Decoder<S>) -> Result<Self, ServerError> {
        let addr: SocketAddr = address
            .parse()
            .map_err(|e| ServerError::Config(format!("invalid bind address '{address}': {e}")))?;

        let listener = TcpListener::bind(addr).await?;
        tracing::info!("Decoder bound to {}", addr);

        Ok(Self { listener, decoder })
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve connections one after another until `shutdown` resolves.
    ///
    /// Shutdown is observed between sessions. Returns the decoder so callers
    /// can inspect its final state.
    pub async fn run(self, shutdown: impl Future<Output = ()>) -> Result<Decoder<S>, ServerError> {
        let Self { listener, mut decoder } = self;
        tokio::pin!(shutdown);

        loop {
            let (stream, peer) = tokio::select! {
                accepted = listener.accept() => accepted?,
                () = &mut shutdown => break,
            };

            tracing::info!(%peer, "Session opened");

            let stream = stream.into_std()?;
            stream.set_nonblocking(false)?;

            let session = tokio::task::spawn_blocking(move || {
                let mut framer = Framer::new(StreamTransport::new(stream));
                let result = driver::serve(&mut decoder, &mut framer);
                (decoder, result)
            });

            let (returned, result) =
                session.await.map_err(|e| ServerError::Internal(format!("session task failed: {e}")))?;
            decoder = returned;

            if let Err(e) = result {
                tracing::warn!(%peer, error = %e, "Session ended with error");
            }
        }

        tracing::info!("Decoder shutting down");
        Ok(decoder)
    }
}
