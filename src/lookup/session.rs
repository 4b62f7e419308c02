//! Transport sessions: one connect → send → receive → close cycle per lookup.
//!
//! [`Connector`] opens sessions and [`Session`] is the byte-stream seam the
//! framing strategies read from. [`TcpConnector`] is the production
//! implementation; tests substitute scripted fakes.

use std::io;
use std::mem::MaybeUninit;
use std::time::Duration;

use async_trait::async_trait;
use socket2::SockRef;
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::config::ServerAddr;

/// Which part of the exchange a timeout interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Connect,
    Response,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Connect => "connect",
            Phase::Response => "response",
        }
    }
}

/// Connect, write and read failures. All of them mean the server is unavailable.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The server could not be reached.
    #[error("failed to connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    /// Sending the request failed.
    #[error("failed to send request: {0}")]
    Write(#[source] io::Error),

    /// Reading the response failed (reset, aborted, ...).
    #[error("failed to read response: {0}")]
    Read(#[source] io::Error),

    /// The peer did not answer within the configured limit.
    #[error("{} timed out after {}ms", .phase.as_str(), .after.as_millis())]
    TimedOut { phase: Phase, after: Duration },
}

/// A single-use byte-stream connection to the lookup server.
///
/// `close` is idempotent and must be safe after any earlier failure.
#[async_trait]
pub trait Session: Send {
    /// Write the whole buffer and flush it.
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()>;

    /// Block until at least one byte arrives or the peer closes (`Ok(0)`).
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Whether unread bytes are already queued locally, without blocking.
    fn data_available(&mut self) -> io::Result<bool>;

    /// Release the connection.
    async fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Opens a fresh [`Session`] for every request. Sessions are never pooled.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self, addr: &ServerAddr) -> io::Result<Box<dyn Session>>;
}

/// Plain TCP connector.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpConnector;

#[async_trait]
impl Connector for TcpConnector {
    async fn open(&self, addr: &ServerAddr) -> io::Result<Box<dyn Session>> {
        let stream = TcpStream::connect((addr.host.as_str(), addr.port)).await?;
        stream.set_nodelay(true)?;

        tracing::debug!(
            peer = %stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| addr.to_string()),
            "session opened"
        );

        Ok(Box::new(TcpSession::new(stream)))
    }
}

/// TCP-backed session. Dropping it also closes the socket.
#[derive(Debug)]
pub struct TcpSession {
    stream: Option<TcpStream>,
}

impl TcpSession {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream: Some(stream),
        }
    }

    fn stream(&mut self) -> io::Result<&mut TcpStream> {
        self.stream
            .as_mut()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "session already closed"))
    }
}

#[async_trait]
impl Session for TcpSession {
    async fn send(&mut self, bytes: &[u8]) -> io::Result<()> {
        let stream = self.stream()?;
        stream.write_all(bytes).await?;
        stream.flush().await
    }

    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream()?.read(buf).await
    }

    /// Peeks one byte on the non-blocking socket. A closed peer reports `false`.
    fn data_available(&mut self) -> io::Result<bool> {
        let stream = self.stream()?;
        let mut probe = [MaybeUninit::<u8>::uninit(); 1];

        match SockRef::from(&*stream).peek(&mut probe) {
            Ok(n) => Ok(n > 0),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(false),
            Err(e) if e.kind() == io::ErrorKind::Interrupted => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            // The peer usually closed first; shutdown errors carry no information.
            if let Err(e) = stream.shutdown().await {
                tracing::debug!(error = %e, "shutdown on close failed");
            }
            tracing::debug!("session closed");
        }
    }

    fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}
