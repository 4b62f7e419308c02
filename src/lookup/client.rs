//! Lookup client composing session, framing and codec.
//!
//! `LookupClient` opens a fresh connection per lookup, sends the identifier,
//! drains the response with the configured framing strategy and decodes it.
//! The session is closed before `lookup` returns on every path.

use std::future::{self, Future};
use std::sync::Arc;

use thiserror::Error;
use tokio::time::timeout;
use tracing::Instrument;

use super::codec::{self, DecodeError};
use super::framing::{FramingError, FramingStrategy};
use super::session::{Connector, Phase, Session, TcpConnector, TransportError};
use crate::config::ClientConfig;
use crate::models::{Identifier, LookupResult};

/// Classified lookup failures.
///
/// Raw socket and parser errors never escape the client; they arrive wrapped
/// in one of these kinds.
#[derive(Debug, Error)]
pub enum LookupError {
    /// Server down, unreachable, reset, or too slow.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[from] TransportError),

    /// Response bytes are not the expected JSON shape.
    #[error("malformed response: {0}")]
    Decode(#[from] DecodeError),

    /// Aborted by the caller before completion.
    #[error("lookup cancelled")]
    Cancelled,
}

impl LookupError {
    /// Stable identifier for logs and verbose output.
    pub fn kind(&self) -> &'static str {
        match self {
            LookupError::TransportUnavailable(_) => "transport_unavailable",
            LookupError::Decode(_) => "decode_error",
            LookupError::Cancelled => "cancelled",
        }
    }
}

impl From<FramingError> for LookupError {
    fn from(err: FramingError) -> Self {
        match err {
            FramingError::Io(source) => TransportError::Read(source).into(),
            other => DecodeError::Framing(other.to_string()).into(),
        }
    }
}

/// Client for the employee project lookup protocol.
///
/// # Example
///
/// ```ignore
/// use project_lookup::{ClientConfig, Identifier, LookupClient};
///
/// let client = LookupClient::new(ClientConfig::default());
/// let projects = client.lookup(Identifier::new(7)).await?;
/// for p in &projects {
///     println!("{} {:?}", p.project_id, p.title);
/// }
/// ```
#[derive(Clone)]
pub struct LookupClient {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    framing: Arc<dyn FramingStrategy>,
}

impl std::fmt::Debug for LookupClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupClient")
            .field("config", &self.config)
            .field("framing", &self.framing)
            .finish_non_exhaustive()
    }
}

impl LookupClient {
    /// TCP client using the framing selected in `config`.
    pub fn new(config: ClientConfig) -> Self {
        Self::with_connector(config, Arc::new(TcpConnector))
    }

    /// Client over a custom transport.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        let framing = config.framing.strategy(config.chunk_size);
        Self {
            config,
            connector,
            framing,
        }
    }

    /// Replace the framing strategy chosen by the config.
    pub fn with_framing(mut self, framing: Arc<dyn FramingStrategy>) -> Self {
        self.framing = framing;
        self
    }

    /// Look up the projects assigned to `id`.
    pub async fn lookup(&self, id: Identifier) -> Result<LookupResult, LookupError> {
        self.lookup_until(id, future::pending::<()>()).await
    }

    /// Like [`lookup`](Self::lookup), but gives up with
    /// [`LookupError::Cancelled`] as soon as `cancel` completes. The session
    /// is force-closed in that case too.
    pub async fn lookup_until<F>(&self, id: Identifier, cancel: F) -> Result<LookupResult, LookupError>
    where
        F: Future<Output = ()>,
    {
        let span = tracing::debug_span!(
            "lookup",
            employee_id = %id,
            server = %self.config.addr,
            framing = %self.framing.kind()
        );

        let result = self.run(id, cancel).instrument(span).await;

        match &result {
            Ok(projects) => {
                tracing::debug!(employee_id = %id, records = projects.len(), "lookup succeeded");
            }
            Err(err @ LookupError::Decode(_)) => {
                tracing::warn!(employee_id = %id, kind = err.kind(), error = %err, "protocol mismatch");
            }
            Err(err) => {
                tracing::warn!(employee_id = %id, kind = err.kind(), error = %err, "lookup failed");
            }
        }

        result
    }

    async fn run<F>(&self, id: Identifier, cancel: F) -> Result<LookupResult, LookupError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(cancel);

        let mut session = tokio::select! {
            biased;
            _ = &mut cancel => return Err(LookupError::Cancelled),
            opened = self.open_session() => opened?,
        };

        let exchanged = tokio::select! {
            biased;
            _ = &mut cancel => Err(LookupError::Cancelled),
            body = self.exchange(session.as_mut(), id) => body,
        };

        // Unconditional release, whatever the exchange produced.
        session.close().await;

        let body = exchanged?;
        tracing::debug!(bytes = body.len(), "response received");
        Ok(codec::decode(&body)?)
    }

    async fn open_session(&self) -> Result<Box<dyn Session>, LookupError> {
        let addr = &self.config.addr;
        let connect = self.connector.open(addr);

        let opened = match self.config.connect_timeout {
            Some(limit) => timeout(limit, connect)
                .await
                .map_err(|_| TransportError::TimedOut {
                    phase: Phase::Connect,
                    after: limit,
                })?,
            None => connect.await,
        };

        opened.map_err(|source| {
            TransportError::Connect {
                addr: addr.to_string(),
                source,
            }
            .into()
        })
    }

    /// Send the request and drain one response (with timeout).
    async fn exchange(
        &self,
        session: &mut dyn Session,
        id: Identifier,
    ) -> Result<Vec<u8>, LookupError> {
        let request = self.framing.frame_request(&codec::encode_identifier(id));
        let framing = &self.framing;

        let io = async move {
            session
                .send(&request)
                .await
                .map_err(TransportError::Write)?;
            tracing::debug!(bytes = request.len(), "request sent");

            framing.read_message(session).await.map_err(LookupError::from)
        };

        match self.config.response_timeout {
            Some(limit) => timeout(limit, io)
                .await
                .map_err(|_| TransportError::TimedOut {
                    phase: Phase::Response,
                    after: limit,
                })?,
            None => io.await,
        }
    }
}
