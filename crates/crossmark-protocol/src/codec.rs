//! Codec trait and implementations for serializing/deserializing messages.
//!
//! The server never touches `serde_json` directly: it goes through a
//! [`Codec`], so a binary format can replace JSON without changing the
//! handler code.

use serde::{de::DeserializeOwned, Serialize};

use crate::{Envelope, Payload, ProtocolError};

/// Encodes Rust values to bytes and decodes them back.
///
/// `Send + Sync + 'static` because one codec is shared by every connection
/// task for the lifetime of the server.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if the value cannot be represented.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or do not
    /// match `T`.
    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError>;
}

/// Decodes one frame received from a client.
///
/// This is the single decode step in front of all business logic: the
/// result is a fully typed [`Envelope`], and an opcode that only the server
/// may emit (`STATE`, `ERROR`, `MATCH_FOUND`) is rejected here with
/// [`ProtocolError::UnexpectedOpcode`].
pub fn decode_inbound<C: Codec>(
    codec: &C,
    data: &[u8],
) -> Result<Envelope, ProtocolError> {
    let envelope: Envelope = codec.decode(data)?;
    if let Payload::Op(msg) = &envelope.payload {
        let opcode = msg.opcode();
        if !opcode.is_client_bound() {
            return Err(ProtocolError::UnexpectedOpcode(opcode));
        }
    }
    Ok(envelope)
}

// ---------------------------------------------------------------------------
// JsonCodec
// ---------------------------------------------------------------------------

/// A [`Codec`] backed by `serde_json`.
///
/// ## Example
///
/// ```rust
/// use crossmark_protocol::{Codec, Envelope, JsonCodec, SystemMessage};
///
/// let codec = JsonCodec;
/// let envelope = Envelope::system(1, 5000, SystemMessage::Heartbeat { client_time: 5000 });
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[cfg(feature = "json")]
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

#[cfg(feature = "json")]
impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
