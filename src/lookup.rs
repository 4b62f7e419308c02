//! Employee project lookup over a plain TCP byte stream.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     one TCP connection per lookup     ┌─────────────────┐
//! │  LookupClient   │  ────────── "7" ───────────────────►  │  lookup server  │
//! │                 │  ◄───────── [{"Id":10,...}] ───────   │                 │
//! └─────────────────┘                                       └─────────────────┘
//!   session  → connect / send / read / close
//!   framing  → where does the response end?
//!   codec    → identifier text out, JSON array in
//! ```
//!
//! # Protocol
//!
//! The request is the identifier as decimal text, with no prefix and no
//! terminator. The response is a UTF-8 JSON array of assignment objects.
//! The server closes the connection after writing it. An empty array and an
//! empty stream both mean "no assignments".
//!
//! # Usage
//!
//! ```ignore
//! use project_lookup::{ClientConfig, Identifier, LookupClient};
//!
//! let client = LookupClient::new(ClientConfig::default());
//! let projects = client.lookup(Identifier::new(7)).await?;
//! ```

mod client;
mod codec;
mod framing;
mod session;
#[cfg(test)]
pub(crate) mod testing;

pub use client::{LookupClient, LookupError};
pub use codec::{decode, encode_identifier, encode_records, DecodeError};
pub use framing::{
    AvailabilityHeuristic, ContentLength, FramingError, FramingKind, FramingStrategy,
    NewlineDelimited, UntilClose, DEFAULT_CHUNK_SIZE, MAX_MESSAGE_SIZE,
};
pub use session::{Connector, Phase, Session, TcpConnector, TcpSession, TransportError};
