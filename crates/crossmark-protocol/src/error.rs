//! Error types for the protocol layer.

use crate::Opcode;

/// Errors that can occur while encoding or decoding wire messages.
///
/// Everything here is a `ProtocolError` in the taxonomy: the bytes never
/// reached game logic, so no match state can have changed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (Rust value → bytes).
    #[cfg(feature = "json")]
    #[error("encode failed: {0}")]
    Encode(serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, or an
    /// unknown tag.
    #[cfg(feature = "json")]
    #[error("decode failed: {0}")]
    Decode(serde_json::Error),

    /// A client sent an opcode only the server may send.
    #[error("opcode {0} is not accepted from clients")]
    UnexpectedOpcode(Opcode),

    /// The message parsed but breaks a protocol rule (bad handshake,
    /// wrong first message, and so on).
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
