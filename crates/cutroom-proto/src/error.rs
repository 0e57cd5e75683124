//! Codec errors.

use thiserror::Error;

/// Errors produced while encoding or decoding wire payloads.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtoError {
    /// Frame is not a valid `{event, data}` envelope.
    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    /// Envelope names a known event but its payload does not match.
    #[error("invalid payload for event {event}: {reason}")]
    InvalidPayload {
        /// Event name from the envelope
        event: String,
        /// Underlying deserialization failure
        reason: String,
    },

    /// Serialization failed.
    #[error("encode failed: {0}")]
    Encode(String),
}
