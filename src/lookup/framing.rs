//! Message framing strategies for the lookup byte stream.
//!
//! The lookup protocol has no explicit framing: the server writes a JSON
//! array and closes the socket. [`AvailabilityHeuristic`] reproduces how the
//! legacy clients decide the message is complete. It reads a chunk, then
//! stops as soon as nothing more is queued locally. That is a heuristic. A
//! response split across TCP segments with a delay in between is silently
//! truncated.
//!
//! The other strategies are exact and can be swapped in through
//! [`FramingStrategy`] without touching the rest of the client:
//!
//! | kind             | request                        | response ends when        |
//! |------------------|--------------------------------|---------------------------|
//! | `heuristic`      | raw                            | no bytes queued / EOF     |
//! | `until-close`    | raw                            | EOF                       |
//! | `content-length` | `Content-Length: N\r\n\r\n...` | N body bytes read         |
//! | `newline`        | payload + `\n`                 | first `\n`                |

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::session::Session;

/// Maximum accumulated response size (16MB) to bound memory on a runaway peer.
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Read buffer size used by the legacy clients.
pub const DEFAULT_CHUNK_SIZE: usize = 1024;

/// Failures while delimiting a response.
#[derive(Debug, Error)]
pub enum FramingError {
    /// The underlying read failed.
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes violate the framing rules.
    #[error("{0}")]
    Protocol(String),

    /// The response grew past [`MAX_MESSAGE_SIZE`] (or the configured limit).
    #[error("message exceeds maximum of {limit} bytes")]
    TooLarge { limit: usize },
}

/// Decides how a request is framed and where the response ends.
#[async_trait]
pub trait FramingStrategy: Send + Sync + fmt::Debug {
    /// Which strategy this is, for logs.
    fn kind(&self) -> FramingKind;

    /// Wrap the encoded request for the wire.
    fn frame_request(&self, payload: &[u8]) -> Vec<u8>;

    /// Drain one response body from the session.
    async fn read_message(&self, session: &mut dyn Session) -> Result<Vec<u8>, FramingError>;
}

/// Selectable framing strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FramingKind {
    /// Availability polling, as the legacy clients do.
    #[default]
    Heuristic,
    UntilClose,
    ContentLength,
    Newline,
}

impl FramingKind {
    pub const ALL: [FramingKind; 4] = [
        FramingKind::Heuristic,
        FramingKind::UntilClose,
        FramingKind::ContentLength,
        FramingKind::Newline,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FramingKind::Heuristic => "heuristic",
            FramingKind::UntilClose => "until-close",
            FramingKind::ContentLength => "content-length",
            FramingKind::Newline => "newline",
        }
    }

    /// Build the strategy with the given read chunk size.
    pub fn strategy(self, chunk_size: usize) -> Arc<dyn FramingStrategy> {
        let chunk_size = chunk_size.max(1);
        match self {
            FramingKind::Heuristic => Arc::new(AvailabilityHeuristic::new(chunk_size)),
            FramingKind::UntilClose => Arc::new(UntilClose::new(chunk_size)),
            FramingKind::ContentLength => Arc::new(ContentLength::new(chunk_size)),
            FramingKind::Newline => Arc::new(NewlineDelimited::new(chunk_size)),
        }
    }
}

impl fmt::Display for FramingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FramingKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        FramingKind::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| {
                let known: Vec<&str> = FramingKind::ALL.iter().map(|k| k.as_str()).collect();
                format!("expected one of {}", known.join(", "))
            })
    }
}

/// Appends one chunk read from `session` to `acc`, enforcing `limit`.
/// Returns the number of bytes read; `0` means the peer closed.
async fn read_chunk(
    session: &mut dyn Session,
    buf: &mut [u8],
    acc: &mut Vec<u8>,
    limit: usize,
) -> Result<usize, FramingError> {
    let n = session.read(buf).await?;
    if acc.len() + n > limit {
        return Err(FramingError::TooLarge { limit });
    }
    acc.extend_from_slice(&buf[..n]);
    Ok(n)
}

/// Legacy availability-polling reader.
///
/// Blocks for the first chunk, then keeps reading only while the transport
/// says more bytes are immediately available.
#[derive(Debug, Clone)]
pub struct AvailabilityHeuristic {
    chunk_size: usize,
    max_size: usize,
}

impl AvailabilityHeuristic {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            max_size: MAX_MESSAGE_SIZE,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }
}

#[async_trait]
impl FramingStrategy for AvailabilityHeuristic {
    fn kind(&self) -> FramingKind {
        FramingKind::Heuristic
    }

    fn frame_request(&self, payload: &[u8]) -> Vec<u8> {
        payload.to_vec()
    }

    async fn read_message(&self, session: &mut dyn Session) -> Result<Vec<u8>, FramingError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut acc = Vec::new();

        loop {
            if read_chunk(session, &mut buf, &mut acc, self.max_size).await? == 0 {
                break;
            }
            if !session.data_available()? {
                break;
            }
        }

        tracing::trace!(bytes = acc.len(), "heuristic drain finished");
        Ok(acc)
    }
}

/// Reads until the peer closes its side.
#[derive(Debug, Clone)]
pub struct UntilClose {
    chunk_size: usize,
    max_size: usize,
}

impl UntilClose {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            max_size: MAX_MESSAGE_SIZE,
        }
    }
}

#[async_trait]
impl FramingStrategy for UntilClose {
    fn kind(&self) -> FramingKind {
        FramingKind::UntilClose
    }

    fn frame_request(&self, payload: &[u8]) -> Vec<u8> {
        payload.to_vec()
    }

    async fn read_message(&self, session: &mut dyn Session) -> Result<Vec<u8>, FramingError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut acc = Vec::new();

        while read_chunk(session, &mut buf, &mut acc, self.max_size).await? > 0 {}

        Ok(acc)
    }
}

/// HTTP/LSP-style `Content-Length` framing.
///
/// ```text
/// Content-Length: <length>\r\n
/// \r\n
/// <message-body>
/// ```
///
/// Header names are case-insensitive, CRLF and LF line endings are both
/// accepted, and unknown headers are ignored.
#[derive(Debug, Clone)]
pub struct ContentLength {
    chunk_size: usize,
    max_size: usize,
}

impl ContentLength {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            max_size: MAX_MESSAGE_SIZE,
        }
    }

    /// Headers are limited separately so a peer can't stream an endless header block.
    const MAX_HEADER_SIZE: usize = 8 * 1024;
}

/// Position just past the blank line ending the header block, if present.
fn header_end(buf: &[u8]) -> Option<usize> {
    let mut line_start = 0;
    for (i, &byte) in buf.iter().enumerate() {
        if byte != b'\n' {
            continue;
        }
        let line = &buf[line_start..i];
        if line.is_empty() || line == b"\r" {
            return Some(i + 1);
        }
        line_start = i + 1;
    }
    None
}

fn parse_content_length(headers: &[u8]) -> Result<usize, FramingError> {
    let text = std::str::from_utf8(headers)
        .map_err(|_| FramingError::Protocol("header block is not valid UTF-8".to_string()))?;

    let mut content_length = None;
    for line in text.lines() {
        let trimmed = line.trim();
        if let Some((key, value)) = trimmed.split_once(':') {
            if key.trim().eq_ignore_ascii_case("Content-Length") {
                let value = value.trim();
                content_length = Some(value.parse().map_err(|_| {
                    FramingError::Protocol(format!("Invalid Content-Length value: {}", value))
                })?);
            }
        }
    }

    content_length.ok_or_else(|| FramingError::Protocol("Missing Content-Length header".to_string()))
}

#[async_trait]
impl FramingStrategy for ContentLength {
    fn kind(&self) -> FramingKind {
        FramingKind::ContentLength
    }

    fn frame_request(&self, payload: &[u8]) -> Vec<u8> {
        let mut framed = format!("Content-Length: {}\r\n\r\n", payload.len()).into_bytes();
        framed.extend_from_slice(payload);
        framed
    }

    async fn read_message(&self, session: &mut dyn Session) -> Result<Vec<u8>, FramingError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut acc = Vec::new();
        let header_limit = Self::MAX_HEADER_SIZE + self.chunk_size;

        let body_start = loop {
            if let Some(end) = header_end(&acc) {
                break end;
            }
            if read_chunk(session, &mut buf, &mut acc, header_limit).await? == 0 {
                // Nothing at all means "no payload", same as the raw protocol.
                if acc.is_empty() {
                    return Ok(acc);
                }
                return Err(FramingError::Protocol(
                    "Connection closed inside header block".to_string(),
                ));
            }
        };

        let size = parse_content_length(&acc[..body_start])?;
        if size > self.max_size {
            return Err(FramingError::TooLarge {
                limit: self.max_size,
            });
        }

        let mut body = acc.split_off(body_start);
        while body.len() < size {
            let n = session.read(&mut buf).await?;
            if n == 0 {
                return Err(FramingError::Protocol(format!(
                    "Connection closed after {} of {} body bytes",
                    body.len(),
                    size
                )));
            }
            body.extend_from_slice(&buf[..n]);
        }
        // One request per connection: anything past the body is ignored.
        body.truncate(size);

        Ok(body)
    }
}

/// Newline-terminated messages in both directions.
#[derive(Debug, Clone)]
pub struct NewlineDelimited {
    chunk_size: usize,
    max_size: usize,
}

impl NewlineDelimited {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size,
            max_size: MAX_MESSAGE_SIZE,
        }
    }
}

#[async_trait]
impl FramingStrategy for NewlineDelimited {
    fn kind(&self) -> FramingKind {
        FramingKind::Newline
    }

    fn frame_request(&self, payload: &[u8]) -> Vec<u8> {
        let mut framed = Vec::with_capacity(payload.len() + 1);
        framed.extend_from_slice(payload);
        framed.push(b'\n');
        framed
    }

    async fn read_message(&self, session: &mut dyn Session) -> Result<Vec<u8>, FramingError> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut acc = Vec::new();
        let mut scanned = 0;

        loop {
            if let Some(pos) = acc[scanned..].iter().position(|&b| b == b'\n') {
                let mut line_end = scanned + pos;
                if line_end > 0 && acc[line_end - 1] == b'\r' {
                    line_end -= 1;
                }
                acc.truncate(line_end);
                return Ok(acc);
            }
            scanned = acc.len();

            if read_chunk(session, &mut buf, &mut acc, self.max_size).await? == 0 {
                if acc.is_empty() {
                    return Ok(acc);
                }
                return Err(FramingError::Protocol(format!(
                    "Connection closed after {} bytes without a line terminator",
                    acc.len()
                )));
            }
        }
    }
}
