//! Request encoding and response decoding.

use thiserror::Error;

use crate::models::{AssociationRecord, Identifier, LookupResult};

/// The response could not be interpreted as a list of assignments.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("framing violation: {0}")]
    Framing(String),
}

/// Decimal UTF-8 text, with no terminator and no length prefix.
pub fn encode_identifier(id: Identifier) -> Vec<u8> {
    id.to_string().into_bytes()
}

/// Decode a response body into an immutable [`LookupResult`].
///
/// An empty or blank body, and a literal JSON `null`, mean "no assignments".
/// Any malformed record fails the whole decode.
pub fn decode(bytes: &[u8]) -> Result<LookupResult, DecodeError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(LookupResult::empty());
    }

    let records: Option<Vec<AssociationRecord>> = serde_json::from_slice(bytes)?;
    Ok(records.map(LookupResult::from).unwrap_or_default())
}

/// Encode records the way the companion server does.
pub fn encode_records(records: &[AssociationRecord]) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec(records)
}
